use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Store-assigned room identity.
pub type RoomId = Ulid;

/// A single hotel room.
///
/// `room_number` encodes the floor in its hundreds digit (305 is floor 3, unit 5;
/// floor 10 uses 1001..). The store does not enforce that `floor_number` agrees
/// with that encoding; seeding establishes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub room_number: u32,
    pub floor_number: u32,
    pub is_booked: bool,
}

impl Room {
    pub fn new(room_number: u32, floor_number: u32) -> Self {
        Self {
            id: Ulid::new(),
            room_number,
            floor_number,
            is_booked: false,
        }
    }

    /// Position along the corridor, counted from the staircase/lift.
    pub fn unit(&self) -> u32 {
        self.room_number % 100
    }
}

/// A contiguous run of rooms on one floor, chosen for a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub floor: u32,
    pub rooms: Vec<Room>,
    pub travel_time: u64,
}

impl Block {
    pub fn ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|r| r.id).collect()
    }
}

/// Result of a conditional commit against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Ids that were missing or already booked; nothing was written.
    Conflict(Vec<RoomId>),
}

/// The WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Replaces the whole room set (seeding, compaction snapshot).
    RoomsSeeded { rooms: Vec<Room> },
    BookingStatusSet { ids: Vec<RoomId>, booked: bool },
}

// ── HTTP response bodies ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub message: String,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub booked_rooms: Option<Vec<Room>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
