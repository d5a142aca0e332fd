use tracing::{debug, warn};

use crate::limits::{MAX_ROOMS_PER_BOOKING, MIN_ROOMS_PER_BOOKING};
use crate::model::*;

use super::availability::{group_by_floor, unavailable_ids};
use super::selection::best_block;
use super::{Engine, EngineError, StoreError};

/// Where a single booking request stands.
///
/// `Pending → Selecting → Revalidating → Committed` on success. Validation and
/// empty selections end in `Rejected`; losing a race after selection ends in
/// `Conflict`; store faults end in `Failed`.
#[derive(Debug)]
pub enum BookingState {
    Pending { num_rooms: i64 },
    Selecting { num_rooms: usize },
    Revalidating { block: Block },
    Committed { rooms: Vec<Room> },
    Rejected(EngineError),
    /// Room numbers taken by someone else before we could commit.
    Conflict { rooms: Vec<u32> },
    Failed(StoreError),
}

impl BookingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingState::Committed { .. }
                | BookingState::Rejected(_)
                | BookingState::Conflict { .. }
                | BookingState::Failed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingState::Pending { .. } => "pending",
            BookingState::Selecting { .. } => "selecting",
            BookingState::Revalidating { .. } => "revalidating",
            BookingState::Committed { .. } => "committed",
            BookingState::Rejected(_) => "rejected",
            BookingState::Conflict { .. } => "conflict",
            BookingState::Failed(_) => "failed",
        }
    }

    fn into_result(self) -> Result<Vec<Room>, EngineError> {
        match self {
            BookingState::Committed { rooms } => Ok(rooms),
            BookingState::Rejected(e) => Err(e),
            BookingState::Conflict { rooms } => Err(EngineError::Conflict(rooms)),
            BookingState::Failed(e) => Err(EngineError::Store(e)),
            other => unreachable!("booking stopped in non-terminal state {}", other.label()),
        }
    }
}

impl Engine {
    /// Book the cheapest contiguous block of `num_rooms` rooms on one floor.
    ///
    /// The chosen rooms are re-read right before commit and written with the
    /// store's conditional commit, so a booking that raced ours surfaces as
    /// `EngineError::Conflict` and nothing is partially booked.
    pub async fn book_rooms(&self, num_rooms: i64) -> Result<Vec<Room>, EngineError> {
        let mut state = BookingState::Pending { num_rooms };
        while !state.is_terminal() {
            let from = state.label();
            state = self.advance(state).await;
            debug!("booking {from} -> {}", state.label());
        }

        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "outcome" => state.label())
            .increment(1);
        state.into_result()
    }

    async fn advance(&self, state: BookingState) -> BookingState {
        match state {
            BookingState::Pending { num_rooms } => {
                if (MIN_ROOMS_PER_BOOKING..=MAX_ROOMS_PER_BOOKING).contains(&num_rooms) {
                    BookingState::Selecting {
                        num_rooms: num_rooms as usize,
                    }
                } else {
                    BookingState::Rejected(EngineError::InvalidRoomCount(Some(num_rooms)))
                }
            }
            BookingState::Selecting { num_rooms } => {
                let rooms = match self.store.list_all().await {
                    Ok(rooms) => rooms,
                    Err(e) => return BookingState::Failed(e),
                };
                let floors = group_by_floor(&rooms);
                match best_block(&floors, num_rooms) {
                    Some(block) => BookingState::Revalidating { block },
                    None => BookingState::Rejected(EngineError::NoAvailability {
                        requested: num_rooms,
                    }),
                }
            }
            BookingState::Revalidating { block } => self.revalidate_and_commit(block).await,
            terminal => terminal,
        }
    }

    async fn revalidate_and_commit(&self, block: Block) -> BookingState {
        let ids = block.ids();
        let current = match self.store.list_all().await {
            Ok(rooms) => rooms,
            Err(e) => return BookingState::Failed(e),
        };
        let taken = unavailable_ids(&current, &ids);
        if !taken.is_empty() {
            return conflict(&block, &taken);
        }

        match self.store.book_if_available(&ids).await {
            Ok(CommitOutcome::Committed) => {
                let rooms = block
                    .rooms
                    .into_iter()
                    .map(|room| Room {
                        is_booked: true,
                        ..room
                    })
                    .collect();
                BookingState::Committed { rooms }
            }
            Ok(CommitOutcome::Conflict(taken)) => conflict(&block, &taken),
            Err(e) => BookingState::Failed(e),
        }
    }
}

fn conflict(block: &Block, taken: &[RoomId]) -> BookingState {
    let rooms: Vec<u32> = block
        .rooms
        .iter()
        .filter(|r| taken.contains(&r.id))
        .map(|r| r.room_number)
        .collect();
    warn!("booking conflict on floor {}: rooms {rooms:?} taken", block.floor);
    BookingState::Conflict { rooms }
}
