/// Smallest block a single booking request may ask for.
pub const MIN_ROOMS_PER_BOOKING: i64 = 1;
/// Largest block a single booking request may ask for.
pub const MAX_ROOMS_PER_BOOKING: i64 = 5;
/// Upper bound on rooms booked by one random-occupancy run.
pub const RANDOM_OCCUPANCY_CAP: usize = 97;

/// Max bytes in a request line plus headers.
pub const MAX_HEAD_LEN: usize = 8 * 1024;
/// Max header lines per request.
pub const MAX_HEADERS: usize = 64;
/// Max request body size.
pub const MAX_BODY_LEN: usize = 64 * 1024;
