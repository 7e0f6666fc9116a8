use huddle_core::protocol::ServerEvent;
use huddle_core::retro::{Card, CardDraft, Column, group_similar};

use crate::registry::{ClientSender, ConnId, RoomLife, RoomStore};

/// One retrospective board: cards plus a roster of display names. Cards
/// survive everyone leaving; the roster does not.
#[derive(Default)]
pub struct RetroRoom {
    cards: Vec<Card>,
    participants: Vec<String>,
}

impl RetroRoom {
    fn find_card(&mut self, card_id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == card_id)
    }
}

impl RoomLife for RetroRoom {
    fn is_vacant(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Retrospective board engine. Every mutation rebroadcasts the full card
/// list; stale card ids are silent no-ops.
#[derive(Default)]
pub struct RetroEngine {
    rooms: RoomStore<RetroRoom>,
}

impl RetroEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a board: the newcomer gets the current card list, everyone
    /// hears who arrived. Returns false when the room key is rejected.
    pub fn join(&mut self, room: &str, conn: ConnId, sender: ClientSender, name: &str) -> bool {
        let Some(state) = self.rooms.get_or_create(room) else {
            return false;
        };
        if !state.participants.iter().any(|n| n == name) {
            state.participants.push(name.to_string());
        }
        let cards = state.cards.clone();

        self.rooms.attach(room, conn, sender);
        self.rooms.send_to(room, conn, &ServerEvent::LoadCards { cards });
        self.rooms.broadcast(
            room,
            &ServerEvent::ParticipantJoined {
                name: name.to_string(),
            },
        );
        tracing::info!(room, name, "Participant joined retro board");
        true
    }

    pub fn leave(&mut self, room: &str, conn: ConnId, name: &str) {
        self.rooms.detach(room, conn);
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        let before = state.participants.len();
        state.participants.retain(|n| n != name);
        if state.participants.len() != before {
            self.rooms.broadcast(
                room,
                &ServerEvent::ParticipantLeft {
                    name: name.to_string(),
                },
            );
        }
    }

    /// Add a draft card. Vote state from the wire is discarded.
    pub fn add_card(&mut self, room: &str, draft: CardDraft) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        state.cards.push(Card::draft(draft));
        self.broadcast_cards(room);
    }

    /// Finalize a draft's content and open it up to voting and moving.
    pub fn submit_card(&mut self, room: &str, card_id: &str, content: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if let Some(card) = state.find_card(card_id) {
            card.content = content.to_string();
            card.is_submitted = true;
        }
        self.broadcast_cards(room);
    }

    pub fn delete_card(&mut self, room: &str, card_id: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        state.cards.retain(|c| c.id != card_id);
        self.broadcast_cards(room);
    }

    /// Toggle a voter on a submitted card. A second toggle by the same
    /// voter retracts the vote. Drafts are untouchable.
    pub fn vote_card(&mut self, room: &str, card_id: &str, voter: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if let Some(card) = state.find_card(card_id)
            && card.is_submitted
        {
            if let Some(pos) = card.voters.iter().position(|v| v == voter) {
                card.voters.remove(pos);
            } else {
                card.voters.push(voter.to_string());
            }
            card.votes = card.voters.len() as u32;
        }
        self.broadcast_cards(room);
    }

    pub fn move_card(&mut self, room: &str, card_id: &str, new_column: Column) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        if let Some(card) = state.find_card(card_id)
            && card.is_submitted
        {
            card.column = new_column;
        }
        self.broadcast_cards(room);
    }

    /// Clear the board. The roster stays so the session can start over.
    pub fn reset(&mut self, room: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        state.cards.clear();
        self.rooms.broadcast(room, &ServerEvent::RetroReset);
        self.broadcast_cards(room);
    }

    /// Run the similarity merge over submitted cards.
    pub fn group_similar_cards(&mut self, room: &str) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        group_similar(&mut state.cards);
        self.broadcast_cards(room);
    }

    pub fn reap_idle(&mut self, retention: std::time::Duration) -> usize {
        self.rooms.reap_idle(retention)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn broadcast_cards(&self, room: &str) {
        if let Some(state) = self.rooms.get(room) {
            self.rooms.broadcast(
                room,
                &ServerEvent::UpdateCards {
                    cards: state.cards.clone(),
                },
            );
        }
    }

    #[cfg(test)]
    fn cards(&self, room: &str) -> Vec<Card> {
        self.rooms
            .get(room)
            .map(|s| s.cards.clone())
            .unwrap_or_default()
    }
}
