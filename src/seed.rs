use crate::model::Room;

/// Floors 1-9 with ten rooms each.
const STANDARD_FLOORS: u32 = 9;
const ROOMS_PER_STANDARD_FLOOR: u32 = 10;
/// The top floor is shorter.
const TOP_FLOOR: u32 = 10;
const ROOMS_ON_TOP_FLOOR: u32 = 7;

/// The hotel's room layout with fresh ids and nothing booked: 101..110 through
/// 901..910, then 1001..1007. 97 rooms.
pub fn default_layout() -> Vec<Room> {
    let standard = (1..=STANDARD_FLOORS).flat_map(|floor| {
        (1..=ROOMS_PER_STANDARD_FLOOR).map(move |unit| Room::new(floor * 100 + unit, floor))
    });
    let top = (1..=ROOMS_ON_TOP_FLOOR).map(|unit| Room::new(TOP_FLOOR * 100 + unit, TOP_FLOOR));
    standard.chain(top).collect()
}
