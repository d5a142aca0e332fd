use crate::model::*;

use super::availability::FloorGrouping;

/// Travel-time units per floor above the first.
const FLOOR_COST: u64 = 2;

/// Synthetic travel time for a set of rooms.
///
/// Each room costs its unit number (horizontal distance from the staircase/lift)
/// plus two units per floor above the ground floor. The sum ignores order.
pub fn travel_time<'a>(rooms: impl IntoIterator<Item = &'a Room>) -> u64 {
    rooms
        .into_iter()
        .map(|r| u64::from(r.unit()) + u64::from(r.floor_number.saturating_sub(1)) * FLOOR_COST)
        .sum()
}

/// Cheapest contiguous block of `num_rooms` on a single floor.
///
/// Scores every window on every floor with enough free rooms. Floors hold at
/// most a couple dozen rooms, so the exhaustive scan is at most a few hundred
/// windows. Ties keep the first window seen (ascending floor, then offset).
/// Returns `None` when no floor has `num_rooms` free rooms.
pub fn best_block(floors: &FloorGrouping, num_rooms: usize) -> Option<Block> {
    if num_rooms == 0 {
        return None;
    }
    let mut best: Option<Block> = None;

    for (&floor, rooms) in floors {
        if rooms.len() < num_rooms {
            continue;
        }
        for window in rooms.windows(num_rooms) {
            let cost = travel_time(window);
            if best.as_ref().is_none_or(|b| cost < b.travel_time) {
                best = Some(Block {
                    floor,
                    rooms: window.to_vec(),
                    travel_time: cost,
                });
            }
        }
    }

    best
}
