use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Every room, ordered by room number.
    pub async fn rooms(&self) -> Result<Vec<Room>, EngineError> {
        let mut rooms = self.store.list_all().await?;
        rooms.sort_by_key(|r| r.room_number);
        Ok(rooms)
    }

    /// Booked rooms, ordered by room number.
    pub async fn booked_rooms(&self) -> Result<Vec<Room>, EngineError> {
        let mut rooms = self.rooms().await?;
        rooms.retain(|r| r.is_booked);
        Ok(rooms)
    }
}
