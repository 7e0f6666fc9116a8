use uuid::Uuid;

use huddle_core::estimation::{Avatar, Participant, Vote};
use huddle_core::protocol::ServerEvent;

use crate::registry::{ClientSender, ConnId, RoomLife, RoomStore};

/// One pointing-poker room: participants in join order, keyed by session.
#[derive(Default)]
pub struct EstimationRoom {
    participants: Vec<Participant>,
}

impl EstimationRoom {
    fn find_mut(&mut self, session_id: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.session_id == session_id)
    }
}

impl RoomLife for EstimationRoom {
    fn is_vacant(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Estimation engine: owns its room store and broadcasts after every
/// mutation. Unknown sessions and rooms are silent no-ops throughout.
#[derive(Default)]
pub struct EstimationEngine {
    rooms: RoomStore<EstimationRoom>,
}

impl EstimationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room, reusing the supplied session id when the client
    /// reconnects with one. Returns the session id in effect, or `None`
    /// when the room key is rejected.
    pub fn join(
        &mut self,
        room: &str,
        conn: ConnId,
        sender: ClientSender,
        name: &str,
        avatar: Avatar,
        session_id: Option<String>,
    ) -> Option<String> {
        let supplied = session_id.filter(|s| !s.is_empty());
        let generated = supplied.is_none();
        let session_id = supplied.unwrap_or_else(|| Uuid::new_v4().to_string());

        // A session lives in at most one room. A reconnecting id may still
        // be listed elsewhere (second tab, stale connection); evict it
        // there before inserting here.
        if !generated {
            self.evict_session_elsewhere(room, &session_id);
        }

        let state = self.rooms.get_or_create(room)?;
        // Rejoining with a known session overwrites the entry in place,
        // with the vote cleared
        if let Some(existing) = state.find_mut(&session_id) {
            existing.name = name.to_string();
            existing.avatar = avatar;
            existing.vote = None;
            existing.has_voted = false;
        } else {
            state
                .participants
                .push(Participant::new(session_id.clone(), name.to_string(), avatar));
        }

        self.rooms.attach(room, conn, sender);
        // Clients that reconnect with a stored id already know it
        if generated {
            self.rooms.send_to(
                room,
                conn,
                &ServerEvent::SessionCreated {
                    session_id: session_id.clone(),
                },
            );
        }
        self.broadcast_participants(room, |participants| ServerEvent::UpdateParticipants {
            participants,
        });
        tracing::info!(room, name, "Participant joined estimation room");
        Some(session_id)
    }

    /// Record a vote, coercing anything outside the approved set to the
    /// sentinel. Voting from an unknown session never creates state.
    pub fn cast_vote(&mut self, room: &str, session_id: &str, raw: &serde_json::Value) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        let Some(participant) = state.find_mut(session_id) else {
            tracing::debug!(room, session_id, "Vote from unknown session ignored");
            return;
        };
        participant.vote = Some(Vote::coerce(raw));
        participant.has_voted = true;
        self.broadcast_participants(room, |participants| ServerEvent::UpdateVotes {
            participants,
        });
    }

    /// Signal clients to display stored votes. No server-side aggregation;
    /// averages are a client concern.
    pub fn reveal(&mut self, room: &str) {
        if self.rooms.get_mut(room).is_none() {
            return;
        }
        self.broadcast_participants(room, |participants| ServerEvent::VotesRevealed {
            participants,
        });
    }

    pub fn reset_votes(&mut self, room: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        for participant in &mut state.participants {
            participant.vote = None;
            participant.has_voted = false;
        }
        self.broadcast_participants(room, |participants| ServerEvent::VotesReset {
            participants,
        });
    }

    /// Remove a session from a room, on explicit leave or disconnect. The
    /// vacated room stays behind for the reaper.
    pub fn leave(&mut self, room: &str, conn: ConnId, session_id: &str) {
        self.rooms.detach(room, conn);
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        let before = state.participants.len();
        state.participants.retain(|p| p.session_id != session_id);
        if state.participants.len() != before {
            self.broadcast_participants(room, |participants| ServerEvent::UpdateParticipants {
                participants,
            });
        }
    }

    pub fn reap_idle(&mut self, retention: std::time::Duration) -> usize {
        self.rooms.reap_idle(retention)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop a session id from every room except `room`, announcing the
    /// shrunken roster to each affected room's listeners.
    fn evict_session_elsewhere(&mut self, room: &str, session_id: &str) {
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|(key, state)| {
                *key != room && state.participants.iter().any(|p| p.session_id == session_id)
            })
            .map(|(key, _)| key.to_string())
            .collect();
        for other in stale {
            if let Some(state) = self.rooms.get_mut(&other) {
                state.participants.retain(|p| p.session_id != session_id);
            }
            self.broadcast_participants(&other, |participants| ServerEvent::UpdateParticipants {
                participants,
            });
            tracing::debug!(room = other, session_id, "Session moved to another room");
        }
    }

    fn broadcast_participants<F>(&self, room: &str, make: F)
    where
        F: FnOnce(Vec<Participant>) -> ServerEvent,
    {
        if let Some(state) = self.rooms.get(room) {
            self.rooms.broadcast(room, &make(state.participants.clone()));
        }
    }

    #[cfg(test)]
    fn participants(&self, room: &str) -> Vec<Participant> {
        self.rooms
            .get(room)
            .map(|s| s.participants.clone())
            .unwrap_or_default()
    }
}
