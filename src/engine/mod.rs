mod availability;
mod booking;
mod error;
mod mutations;
mod queries;
mod selection;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{FloorGrouping, group_by_floor, unavailable_ids};
pub use booking::BookingState;
pub use error::{EngineError, StoreError};
pub use mutations::pick_random_rooms;
pub use selection::{best_block, travel_time};
pub use store::{RoomStore, WalRoomStore};

use std::sync::Arc;

/// Booking logic over an injected room store.
///
/// Holds no room state of its own; every operation reads the store fresh, so
/// one `Engine` can be shared across all connections.
pub struct Engine {
    store: Arc<dyn RoomStore>,
}

impl Engine {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }
}
