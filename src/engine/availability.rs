use std::collections::{BTreeMap, HashMap};

use crate::model::*;

/// Unbooked rooms per floor, each floor sorted by room number.
pub type FloorGrouping = BTreeMap<u32, Vec<Room>>;

// ── Availability grouping ────────────────────────────────────────

/// Partition the unbooked rooms by floor. Every unbooked room lands in exactly
/// one bucket; booked rooms are left out. Floors iterate in ascending order.
pub fn group_by_floor(rooms: &[Room]) -> FloorGrouping {
    let mut floors: FloorGrouping = BTreeMap::new();
    for room in rooms.iter().filter(|r| !r.is_booked) {
        floors.entry(room.floor_number).or_default().push(room.clone());
    }
    for bucket in floors.values_mut() {
        bucket.sort_by_key(|r| r.room_number);
    }
    floors
}

/// Ids from `wanted` that are missing from `rooms` or already booked, in the
/// order they were asked for.
pub fn unavailable_ids(rooms: &[Room], wanted: &[RoomId]) -> Vec<RoomId> {
    let current: HashMap<RoomId, bool> = rooms.iter().map(|r| (r.id, r.is_booked)).collect();
    wanted
        .iter()
        .copied()
        .filter(|id| current.get(id).copied().unwrap_or(true))
        .collect()
}
