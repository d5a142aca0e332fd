use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::*;
use crate::wal::Wal;

use super::StoreError;
use super::availability::unavailable_ids;

/// Persistence seam for room records.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError>;

    /// Flip `is_booked` on every id as one batch. An unknown id fails the whole batch.
    async fn set_booked_status(&self, ids: &[RoomId], booked: bool) -> Result<(), StoreError>;

    /// Drop every room and install `rooms` in their place.
    async fn replace_all(&self, rooms: Vec<Room>) -> Result<(), StoreError>;

    /// Book `ids` only if every one of them exists and is unbooked.
    ///
    /// This default checks and writes in two steps, so a concurrent writer can
    /// still slip in between. Stores with a transactional primitive override it.
    async fn book_if_available(&self, ids: &[RoomId]) -> Result<CommitOutcome, StoreError> {
        let rooms = self.list_all().await?;
        let taken = unavailable_ids(&rooms, ids);
        if !taken.is_empty() {
            return Ok(CommitOutcome::Conflict(taken));
        }
        self.set_booked_status(ids, true).await?;
        Ok(CommitOutcome::Committed)
    }
}

// ── WAL writer channel ───────────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL and runs commands in arrival order. Mutations hold the table's
/// write lock until their append is acknowledged, so at most one append is in
/// flight and each is fsynced on its own.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let started = std::time::Instant::now();
                let result = wal.append(&event);
                metrics::histogram!(crate::observability::WAL_APPEND_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                if let Err(e) = &result {
                    tracing::error!("WAL append failed: {e}");
                }
                let _ = response.send(result);
            }
            WalCommand::Compact { events, response } => {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(wal.appends_since_compact());
            }
        }
    }
}

/// Apply an event to the in-memory room table. Caller holds the write lock.
fn apply_event(rooms: &mut BTreeMap<RoomId, Room>, event: &Event) {
    match event {
        Event::RoomsSeeded { rooms: seeded } => {
            rooms.clear();
            rooms.extend(seeded.iter().map(|r| (r.id, r.clone())));
        }
        Event::BookingStatusSet { ids, booked } => {
            for id in ids {
                if let Some(room) = rooms.get_mut(id) {
                    room.is_booked = *booked;
                }
            }
        }
    }
}

/// Room table kept in memory and made durable through the WAL.
///
/// Every mutation holds the write lock across its WAL append, so a batch is
/// either fully visible and durable or not applied at all.
pub struct WalRoomStore {
    rooms: RwLock<BTreeMap<RoomId, Room>>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalRoomStore {
    /// Replay the WAL at `path` and start its writer task. Needs a tokio runtime.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&path)?;
        let wal = Wal::open(&path)?;

        let mut rooms = BTreeMap::new();
        for event in &events {
            apply_event(&mut rooms, event);
        }
        tracing::debug!(
            "replayed {} events from {}, {} rooms",
            events.len(),
            path.display(),
            rooms.len()
        );
        record_booked_gauge(&rooms);

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            rooms: RwLock::new(rooms),
            wal_tx,
        })
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    async fn persist_and_apply(
        &self,
        rooms: &mut BTreeMap<RoomId, Room>,
        event: &Event,
    ) -> Result<(), StoreError> {
        self.wal_append(event).await?;
        apply_event(rooms, event);
        record_booked_gauge(rooms);
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> Result<u64, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))
    }

    /// Rewrite the WAL as a single snapshot of the current room table.
    pub async fn compact(&self) -> Result<(), StoreError> {
        // The read guard keeps writers out until the snapshot has replaced the log.
        let guard = self.rooms.read().await;
        let snapshot = Event::RoomsSeeded {
            rooms: guard.values().cloned().collect(),
        };
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events: vec![snapshot],
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }
}

fn record_booked_gauge(rooms: &BTreeMap<RoomId, Room>) {
    let booked = rooms.values().filter(|r| r.is_booked).count();
    metrics::gauge!(crate::observability::ROOMS_BOOKED).set(booked as f64);
}

fn first_unknown(rooms: &BTreeMap<RoomId, Room>, ids: &[RoomId]) -> Option<RoomId> {
    ids.iter().copied().find(|id| !rooms.contains_key(id))
}

#[async_trait]
impl RoomStore for WalRoomStore {
    async fn list_all(&self) -> Result<Vec<Room>, StoreError> {
        let guard = self.rooms.read().await;
        let mut rooms: Vec<Room> = guard.values().cloned().collect();
        rooms.sort_by_key(|r| r.room_number);
        Ok(rooms)
    }

    async fn set_booked_status(&self, ids: &[RoomId], booked: bool) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut guard = self.rooms.write().await;
        if let Some(id) = first_unknown(&guard, ids) {
            return Err(StoreError::UnknownRoom(id));
        }
        let event = Event::BookingStatusSet {
            ids: ids.to_vec(),
            booked,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    async fn replace_all(&self, rooms: Vec<Room>) -> Result<(), StoreError> {
        let mut guard = self.rooms.write().await;
        let event = Event::RoomsSeeded { rooms };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Check and write under one write lock: no other mutation can interleave.
    async fn book_if_available(&self, ids: &[RoomId]) -> Result<CommitOutcome, StoreError> {
        let mut guard = self.rooms.write().await;
        let taken: Vec<RoomId> = ids
            .iter()
            .copied()
            .filter(|id| guard.get(id).is_none_or(|r| r.is_booked))
            .collect();
        if !taken.is_empty() {
            return Ok(CommitOutcome::Conflict(taken));
        }
        if ids.is_empty() {
            return Ok(CommitOutcome::Committed);
        }
        let event = Event::BookingStatusSet {
            ids: ids.to_vec(),
            booked: true,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(CommitOutcome::Committed)
    }
}
