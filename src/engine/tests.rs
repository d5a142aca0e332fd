use super::*;
use crate::limits::*;
use crate::model::*;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Notify;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomd_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn floor_rooms(floor: u32, units: std::ops::RangeInclusive<u32>) -> Vec<Room> {
    units.map(|u| Room::new(floor * 100 + u, floor)).collect()
}

fn booked(mut room: Room) -> Room {
    room.is_booked = true;
    room
}

async fn wal_store(name: &str, rooms: Vec<Room>) -> Arc<WalRoomStore> {
    let store = Arc::new(WalRoomStore::open(test_wal_path(name)).unwrap());
    store.replace_all(rooms).await.unwrap();
    store
}

fn numbers(rooms: &[Room]) -> Vec<u32> {
    rooms.iter().map(|r| r.room_number).collect()
}

// ── Test stores ──────────────────────────────────────────

/// Parks the `gate_at`-th `list_all` call until `release` is notified.
struct GatedStore {
    inner: Arc<WalRoomStore>,
    calls: AtomicUsize,
    gate_at: usize,
    parked: Notify,
    release: Notify,
}

#[async_trait]
impl RoomStore for GatedStore {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.gate_at {
            self.parked.notify_one();
            self.release.notified().await;
        }
        self.inner.list_all().await
    }

    async fn set_booked_status(&self, ids: &[RoomId], booked: bool) -> Result<(), StoreError> {
        self.inner.set_booked_status(ids, booked).await
    }

    async fn replace_all(&self, rooms: Vec<Room>) -> Result<(), StoreError> {
        self.inner.replace_all(rooms).await
    }
}

/// Books the first requested room behind the caller's back right before the
/// conditional commit runs.
struct SnipingStore {
    inner: Arc<WalRoomStore>,
}

#[async_trait]
impl RoomStore for SnipingStore {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError> {
        self.inner.list_all().await
    }

    async fn set_booked_status(&self, ids: &[RoomId], booked: bool) -> Result<(), StoreError> {
        self.inner.set_booked_status(ids, booked).await
    }

    async fn replace_all(&self, rooms: Vec<Room>) -> Result<(), StoreError> {
        self.inner.replace_all(rooms).await
    }

    async fn book_if_available(&self, ids: &[RoomId]) -> Result<CommitOutcome, StoreError> {
        self.inner.set_booked_status(&ids[..1], true).await?;
        self.inner.book_if_available(ids).await
    }
}

/// Counts writes.
struct CountingStore {
    inner: Arc<WalRoomStore>,
    writes: AtomicUsize,
}

impl CountingStore {
    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomStore for CountingStore {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError> {
        self.inner.list_all().await
    }

    async fn set_booked_status(&self, ids: &[RoomId], booked: bool) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_booked_status(ids, booked).await
    }

    async fn replace_all(&self, rooms: Vec<Room>) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_all(rooms).await
    }
}

struct BrokenStore;

#[async_trait]
impl RoomStore for BrokenStore {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError> {
        Err(StoreError::WalError("disk unavailable".into()))
    }

    async fn set_booked_status(&self, _: &[RoomId], _: bool) -> Result<(), StoreError> {
        Err(StoreError::WalError("disk unavailable".into()))
    }

    async fn replace_all(&self, _: Vec<Room>) -> Result<(), StoreError> {
        Err(StoreError::WalError("disk unavailable".into()))
    }
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn books_lowest_window_on_single_floor() {
    let store = wal_store("lowest_window.wal", floor_rooms(3, 1..=10)).await;
    let engine = Engine::new(store);

    let rooms = engine.book_rooms(3).await.unwrap();
    assert_eq!(numbers(&rooms), vec![301, 302, 303]);
    assert!(rooms.iter().all(|r| r.is_booked));
    assert_eq!(travel_time(&rooms), 18);

    let stored = engine.booked_rooms().await.unwrap();
    assert_eq!(numbers(&stored), vec![301, 302, 303]);
}

#[tokio::test]
async fn prefers_lower_floor_and_skips_booked_rooms() {
    let mut rooms = floor_rooms(1, 1..=4);
    rooms[1] = booked(rooms[1].clone()); // 102
    rooms.extend(floor_rooms(2, 1..=4));
    let engine = Engine::new(wal_store("skip_booked.wal", rooms).await);

    // Floor 1 has 101, 103, 104 free; the window {101, 103} costs 1+3+0+0 = 4.
    let first = engine.book_rooms(2).await.unwrap();
    assert_eq!(numbers(&first), vec![101, 103]);

    // Floor 1 now has only 104 free.
    let second = engine.book_rooms(2).await.unwrap();
    assert_eq!(numbers(&second), vec![201, 202]);
}

#[tokio::test]
async fn whole_seeded_hotel_books_up_front() {
    let engine = Engine::new(wal_store("seeded.wal", crate::seed::default_layout()).await);
    let rooms = engine.book_rooms(5).await.unwrap();
    assert_eq!(numbers(&rooms), vec![101, 102, 103, 104, 105]);
}

#[tokio::test]
async fn fully_booked_hotel_has_no_availability() {
    let rooms = floor_rooms(1, 1..=3).into_iter().map(booked).collect();
    let engine = Engine::new(wal_store("fully_booked.wal", rooms).await);

    let err = engine.book_rooms(1).await.unwrap_err();
    assert!(matches!(err, EngineError::NoAvailability { requested: 1 }));
    assert!(err.is_client_error());
    assert_eq!(err.to_string(), "No suitable rooms available.");
}

#[tokio::test]
async fn block_larger_than_any_floor_is_unavailable() {
    let mut rooms = floor_rooms(1, 1..=2);
    rooms.extend(floor_rooms(2, 1..=2));
    let engine = Engine::new(wal_store("too_wide.wal", rooms).await);

    let err = engine.book_rooms(3).await.unwrap_err();
    assert!(matches!(err, EngineError::NoAvailability { requested: 3 }));
    assert!(engine.booked_rooms().await.unwrap().is_empty());
}

#[tokio::test]
async fn room_count_out_of_range_is_rejected_before_touching_the_store() {
    let store = Arc::new(CountingStore {
        inner: wal_store("out_of_range.wal", floor_rooms(1, 1..=10)).await,
        writes: AtomicUsize::new(0),
    });
    let engine = Engine::new(store.clone());

    for n in [MAX_ROOMS_PER_BOOKING + 1, MIN_ROOMS_PER_BOOKING - 1, -3] {
        let err = engine.book_rooms(n).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRoomCount(Some(got)) if got == n));
        assert_eq!(
            err.to_string(),
            "Invalid number of rooms. Must be between 1 and 5."
        );
    }
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn concurrent_overlapping_requests_one_commits_one_conflicts() {
    let inner = wal_store("race.wal", floor_rooms(1, 1..=5)).await;
    let store = Arc::new(GatedStore {
        inner,
        calls: AtomicUsize::new(0),
        gate_at: 2,
        parked: Notify::new(),
        release: Notify::new(),
    });
    let engine = Arc::new(Engine::new(store.clone()));

    // A selects 101-102 and parks before revalidating.
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.book_rooms(2).await })
    };
    store.parked.notified().await;

    // B selects the same block and commits.
    let b = engine.book_rooms(2).await.unwrap();
    assert_eq!(numbers(&b), vec![101, 102]);

    store.release.notify_one();
    let err = a.await.unwrap().unwrap_err();
    match &err {
        EngineError::Conflict(rooms) => assert_eq!(rooms, &vec![101, 102]),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(err.is_client_error());
    assert_eq!(
        err.to_string(),
        "Selected rooms were just booked by another request. Please retry."
    );

    let stored = engine.booked_rooms().await.unwrap();
    assert_eq!(numbers(&stored), vec![101, 102]);
}

#[tokio::test]
async fn conditional_commit_catches_race_after_revalidation() {
    let inner = wal_store("snipe.wal", floor_rooms(1, 1..=5)).await;
    let engine = Engine::new(Arc::new(SnipingStore {
        inner: inner.clone(),
    }));

    let err = engine.book_rooms(3).await.unwrap_err();
    match err {
        EngineError::Conflict(rooms) => assert_eq!(rooms, vec![101]),
        other => panic!("expected conflict, got {other:?}"),
    }

    // Only the sniped room is booked; 102 and 103 were left alone.
    let booked: Vec<u32> = inner
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.is_booked)
        .map(|r| r.room_number)
        .collect();
    assert_eq!(booked, vec![101]);
}

#[tokio::test]
async fn store_failure_surfaces_as_server_error() {
    let engine = Engine::new(Arc::new(BrokenStore));

    let err = engine.book_rooms(2).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::WalError(_))));
    assert!(!err.is_client_error());
    assert!(std::error::Error::source(&err).is_some());

    assert!(engine.reset_bookings().await.is_err());
    assert!(engine.random_occupancy().await.is_err());
}

#[test]
fn terminal_states() {
    assert!(!BookingState::Pending { num_rooms: 1 }.is_terminal());
    assert!(!BookingState::Selecting { num_rooms: 1 }.is_terminal());
    assert!(BookingState::Committed { rooms: Vec::new() }.is_terminal());
    assert!(BookingState::Conflict { rooms: vec![101] }.is_terminal());
    assert!(BookingState::Rejected(EngineError::InvalidRoomCount(None)).is_terminal());
    assert_eq!(BookingState::Failed(StoreError::WalError("x".into())).label(), "failed");
}

// ── Queries and resets ───────────────────────────────────

#[tokio::test]
async fn booked_rooms_ordered_by_room_number() {
    let mut rooms = floor_rooms(2, 1..=3);
    rooms.extend(floor_rooms(1, 1..=3));
    rooms = rooms
        .into_iter()
        .map(|r| if r.unit() != 2 { booked(r) } else { r })
        .collect();
    let engine = Engine::new(wal_store("ordered.wal", rooms).await);

    let stored = engine.booked_rooms().await.unwrap();
    assert_eq!(numbers(&stored), vec![101, 103, 201, 203]);
    assert_eq!(engine.rooms().await.unwrap().len(), 6);
}

#[tokio::test]
async fn reset_clears_everything_and_is_idempotent() {
    let store = Arc::new(CountingStore {
        inner: wal_store("reset.wal", floor_rooms(1, 1..=5)).await,
        writes: AtomicUsize::new(0),
    });
    let engine = Engine::new(store.clone());
    engine.book_rooms(3).await.unwrap();
    let after_booking = store.writes();

    assert_eq!(engine.reset_bookings().await.unwrap(), 3);
    assert!(engine.booked_rooms().await.unwrap().is_empty());
    assert_eq!(store.writes(), after_booking + 1);

    assert_eq!(engine.reset_bookings().await.unwrap(), 0);
    assert_eq!(store.writes(), after_booking + 1);
}

#[tokio::test]
async fn reseed_replaces_room_set() {
    let engine = Engine::new(wal_store("reseed.wal", floor_rooms(1, 1..=2)).await);
    engine.book_rooms(1).await.unwrap();

    let count = engine.reseed(crate::seed::default_layout()).await.unwrap();
    assert_eq!(count, 97);
    assert_eq!(engine.rooms().await.unwrap().len(), 97);
    assert!(engine.booked_rooms().await.unwrap().is_empty());
}

// ── Random occupancy ─────────────────────────────────────

#[tokio::test]
async fn random_occupancy_replaces_previous_bookings() {
    let engine = Engine::new(wal_store("random.wal", crate::seed::default_layout()).await);
    engine.book_rooms(5).await.unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let report = engine.random_occupancy_with(&mut rng).await.unwrap();
    let chosen = report.booked_rooms.expect("rooms were booked");

    assert!((1..=RANDOM_OCCUPANCY_CAP).contains(&chosen.len()));
    assert_eq!(report.message, format!("Randomly booked {} rooms.", chosen.len()));
    assert!(chosen.iter().all(|r| r.is_booked));
    // Rooms booked beforehand are released, not re-picked.
    assert!(chosen.iter().all(|r| r.room_number > 105 || r.floor_number > 1));

    let mut expected = numbers(&chosen);
    expected.sort_unstable();
    expected.dedup();
    assert_eq!(expected.len(), chosen.len());

    let stored = engine.booked_rooms().await.unwrap();
    assert_eq!(numbers(&stored), expected);
}

#[tokio::test]
async fn random_occupancy_on_empty_hotel_writes_nothing() {
    let store = Arc::new(CountingStore {
        inner: Arc::new(WalRoomStore::open(test_wal_path("random_empty.wal")).unwrap()),
        writes: AtomicUsize::new(0),
    });
    let engine = Engine::new(store.clone());

    let report = engine.random_occupancy().await.unwrap();
    assert_eq!(report.message, "No available rooms to book.");
    assert!(report.booked_rooms.is_none());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn random_occupancy_on_fully_booked_hotel_writes_nothing() {
    let rooms = floor_rooms(1, 1..=3).into_iter().map(booked).collect();
    let store = Arc::new(CountingStore {
        inner: wal_store("random_full.wal", rooms).await,
        writes: AtomicUsize::new(0),
    });
    let engine = Engine::new(store.clone());

    let report = engine.random_occupancy().await.unwrap();
    assert_eq!(report.message, "No available rooms to book.");
    assert!(report.booked_rooms.is_none());
    assert_eq!(store.writes(), 0);
    assert_eq!(numbers(&engine.booked_rooms().await.unwrap()), vec![101, 102, 103]);
}

#[test]
fn random_pick_respects_bounds() {
    let many: Vec<Room> = (1..=3)
        .flat_map(|floor| floor_rooms(floor, 1..=60))
        .collect();
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let picked = pick_random_rooms(many.clone(), &mut rng);
        assert!((1..=RANDOM_OCCUPANCY_CAP).contains(&picked.len()));
    }

    let one = floor_rooms(1, 1..=1);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(pick_random_rooms(one.clone(), &mut rng), one);
    assert!(pick_random_rooms(Vec::new(), &mut rng).is_empty());
}

#[test]
fn random_pick_reaches_every_room() {
    let rooms = floor_rooms(1, 1..=5);
    let mut seen = std::collections::BTreeSet::new();
    for seed in 0..200 {
        let mut rng = StdRng::seed_from_u64(seed);
        seen.extend(numbers(&pick_random_rooms(rooms.clone(), &mut rng)));
    }
    assert_eq!(seen.len(), 5);
}
