use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::limits::RANDOM_OCCUPANCY_CAP;
use crate::model::*;

use super::{Engine, EngineError};

/// Pick between one and `RANDOM_OCCUPANCY_CAP` rooms uniformly at random.
///
/// The count is uniform over `1..=min(cap, rooms.len())` and the rooms are a
/// Fisher-Yates shuffle prefix. Empty input picks nothing.
pub fn pick_random_rooms<R: Rng>(mut rooms: Vec<Room>, rng: &mut R) -> Vec<Room> {
    if rooms.is_empty() {
        return rooms;
    }
    let count = rng.gen_range(1..=rooms.len().min(RANDOM_OCCUPANCY_CAP));
    rooms.shuffle(rng);
    rooms.truncate(count);
    rooms
}

impl Engine {
    /// Clear every booking. Issues no write when nothing is booked.
    pub async fn reset_bookings(&self) -> Result<usize, EngineError> {
        let booked: Vec<RoomId> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.is_booked)
            .map(|r| r.id)
            .collect();
        if !booked.is_empty() {
            self.store.set_booked_status(&booked, false).await?;
        }
        info!("cleared {} bookings", booked.len());
        Ok(booked.len())
    }

    /// Clear all bookings, then book a random subset of the rooms that were free
    /// beforehand. Writes nothing when no room is free. Demo/test traffic only.
    pub async fn random_occupancy(&self) -> Result<OccupancyReport, EngineError> {
        let mut rng = StdRng::from_entropy();
        self.random_occupancy_with(&mut rng).await
    }

    pub async fn random_occupancy_with<R: Rng + Send>(
        &self,
        rng: &mut R,
    ) -> Result<OccupancyReport, EngineError> {
        let (booked, unbooked): (Vec<Room>, Vec<Room>) = self
            .store
            .list_all()
            .await?
            .into_iter()
            .partition(|r| r.is_booked);
        if unbooked.is_empty() {
            return Ok(OccupancyReport {
                message: "No available rooms to book.".into(),
                booked_rooms: None,
            });
        }

        let booked: Vec<RoomId> = booked.iter().map(|r| r.id).collect();
        if !booked.is_empty() {
            self.store.set_booked_status(&booked, false).await?;
        }

        let chosen = pick_random_rooms(unbooked, rng);
        let ids: Vec<RoomId> = chosen.iter().map(|r| r.id).collect();
        self.store.set_booked_status(&ids, true).await?;

        info!("random occupancy booked {} rooms", chosen.len());
        Ok(OccupancyReport {
            message: format!("Randomly booked {} rooms.", chosen.len()),
            booked_rooms: Some(
                chosen
                    .into_iter()
                    .map(|room| Room {
                        is_booked: true,
                        ..room
                    })
                    .collect(),
            ),
        })
    }

    /// Replace the whole room set, e.g. with `seed::default_layout()`.
    pub async fn reseed(&self, rooms: Vec<Room>) -> Result<usize, EngineError> {
        let count = rooms.len();
        self.store.replace_all(rooms).await?;
        info!("seeded {count} rooms");
        Ok(count)
    }
}
