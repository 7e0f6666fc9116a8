use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use huddle_core::protocol::{ServerEvent, encode_server_event};
use huddle_core::room::is_valid_room_key;

/// Per-connection sender for outbound WebSocket text frames. Bounded so a
/// slow client cannot exhaust memory; `Utf8Bytes` clones are cheap when
/// broadcasting.
pub type ClientSender = mpsc::Sender<Utf8Bytes>;

/// Process-unique id for one WebSocket connection.
pub type ConnId = u64;

/// Lifecycle hooks a room state must provide to the store.
pub trait RoomLife {
    /// Whether the room has no live participants. Vacant rooms are the
    /// only ones the reaper may remove.
    fn is_vacant(&self) -> bool;
}

pub struct RoomEntry<S> {
    pub state: S,
    connections: HashMap<ConnId, ClientSender>,
    last_activity: Instant,
}

/// Keyed collection of rooms for one tool. Each tool gets its own store;
/// the same key in two stores addresses two independent rooms. The store
/// is owned by its engine and handed in at construction, never reached
/// through a global.
pub struct RoomStore<S> {
    rooms: HashMap<String, RoomEntry<S>>,
}

impl<S> Default for RoomStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RoomStore<S> {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&S> {
        self.rooms.get(key).map(|entry| &entry.state)
    }

    /// Iterate every room's key and state, read-only.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &S)> {
        self.rooms.iter().map(|(key, entry)| (key.as_str(), &entry.state))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut S> {
        let entry = self.rooms.get_mut(key)?;
        entry.last_activity = Instant::now();
        Some(&mut entry.state)
    }

    /// Register a connection's outbound channel with a room.
    pub fn attach(&mut self, key: &str, conn: ConnId, sender: ClientSender) {
        if let Some(entry) = self.rooms.get_mut(key) {
            entry.connections.insert(conn, sender);
            entry.last_activity = Instant::now();
        }
    }

    /// Drop a connection from a room. The room itself stays; vacant rooms
    /// are only removed by the reaper so board state survives everyone
    /// stepping out.
    pub fn detach(&mut self, key: &str, conn: ConnId) {
        if let Some(entry) = self.rooms.get_mut(key) {
            entry.connections.remove(&conn);
            entry.last_activity = Instant::now();
        }
    }

    /// Send an event to one connection in a room.
    pub fn send_to(&self, key: &str, conn: ConnId, event: &ServerEvent) {
        let Some(entry) = self.rooms.get(key) else {
            return;
        };
        let Some(sender) = entry.connections.get(&conn) else {
            return;
        };
        match encode_server_event(event) {
            Ok(text) => {
                if let Err(e) = sender.try_send(Utf8Bytes::from(text)) {
                    tracing::debug!(conn, room = key, error = %e, "Failed to send to client");
                }
            },
            Err(e) => tracing::warn!(room = key, error = %e, "Failed to encode event"),
        }
    }

    /// Broadcast an event to every connection in a room. Encodes once and
    /// skips slow clients rather than blocking the caller.
    pub fn broadcast(&self, key: &str, event: &ServerEvent) {
        self.broadcast_filtered(key, None, event);
    }

    /// Broadcast to every connection in a room except one.
    pub fn broadcast_except(&self, key: &str, exclude: ConnId, event: &ServerEvent) {
        self.broadcast_filtered(key, Some(exclude), event);
    }

    fn broadcast_filtered(&self, key: &str, exclude: Option<ConnId>, event: &ServerEvent) {
        let Some(entry) = self.rooms.get(key) else {
            return;
        };
        let text = match encode_server_event(event) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::warn!(room = key, error = %e, "Failed to encode event");
                return;
            },
        };
        for (&conn, sender) in &entry.connections {
            if Some(conn) == exclude {
                continue;
            }
            if let Err(e) = sender.try_send(text.clone()) {
                tracing::debug!(conn, room = key, error = %e, "Skipping broadcast to slow client");
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<S> {
        self.rooms.remove(key).map(|entry| entry.state)
    }
}

impl<S: RoomLife + Default> RoomStore<S> {
    /// Return the room for `key`, lazily creating it. Rejects malformed
    /// keys so a hostile client cannot mint unbounded garbage rooms.
    pub fn get_or_create(&mut self, key: &str) -> Option<&mut S> {
        if !is_valid_room_key(key) {
            tracing::debug!(room = key, "Rejected invalid room key");
            return None;
        }
        let entry = self
            .rooms
            .entry(key.to_string())
            .or_insert_with(|| RoomEntry {
                state: S::default(),
                connections: HashMap::new(),
                last_activity: Instant::now(),
            });
        entry.last_activity = Instant::now();
        Some(&mut entry.state)
    }
}

impl<S: RoomLife> RoomStore<S> {
    /// Remove rooms that are vacant and have been idle past `retention`.
    /// Occupied rooms are never reaped, regardless of age. Returns the
    /// number removed.
    pub fn reap_idle(&mut self, retention: Duration) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms.retain(|_, entry| {
            !entry.connections.is_empty()
                || !entry.state.is_vacant()
                || now.duration_since(entry.last_activity) < retention
        });
        before - self.rooms.len()
    }
}
