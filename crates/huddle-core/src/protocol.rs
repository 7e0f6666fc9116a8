use serde::{Deserialize, Serialize};

use crate::PlayerId;
use crate::estimation::{Avatar, Participant};
use crate::retro::{Card, CardDraft, Column};

/// Maximum inbound message size in bytes. Custom avatars travel inside the
/// join payload as data URLs, so this is deliberately generous.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Every event a client may send, tagged by name. Unknown names or shapes
/// fail here and never reach an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    // Estimation
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room: String,
        name: String,
        #[serde(flatten)]
        avatar: Avatar,
        #[serde(default)]
        session_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room: String, session_id: String },
    #[serde(rename_all = "camelCase")]
    Vote {
        room: String,
        session_id: String,
        vote: serde_json::Value,
    },
    RevealVotes { room: String },
    ResetVotes { room: String },

    // Retrospective board
    JoinRetro { room: String, name: String },
    LeaveRetro { room: String, name: String },
    AddCard { room: String, card: CardDraft },
    #[serde(rename_all = "camelCase")]
    SubmitCard {
        room: String,
        card_id: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    DeleteCard { room: String, card_id: String },
    #[serde(rename_all = "camelCase")]
    VoteCard {
        room: String,
        card_id: String,
        voter: String,
    },
    #[serde(rename_all = "camelCase")]
    MoveCard {
        room: String,
        card_id: String,
        new_column: Column,
    },
    ResetRetro { room: String },
    GroupSimilarCards { room: String },

    // Breakout
    #[serde(rename_all = "camelCase")]
    JoinBreakout { room_id: String, player_name: String },
    #[serde(rename_all = "camelCase")]
    StartBreakout { room_id: String },
    #[serde(rename_all = "camelCase")]
    ResetBreakout { room_id: String },
    #[serde(rename_all = "camelCase")]
    PauseBreakout { room_id: String },
    #[serde(rename_all = "camelCase")]
    PaddleMove {
        room_id: String,
        player_id: PlayerId,
        x: f32,
    },
}

/// Every event the server may emit. Breakout snapshots travel as an opaque
/// JSON value; the shape is owned by the simulation crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    // Estimation
    #[serde(rename_all = "camelCase")]
    SessionCreated { session_id: String },
    UpdateParticipants { participants: Vec<Participant> },
    UpdateVotes { participants: Vec<Participant> },
    VotesRevealed { participants: Vec<Participant> },
    VotesReset { participants: Vec<Participant> },

    // Retrospective board
    LoadCards { cards: Vec<Card> },
    UpdateCards { cards: Vec<Card> },
    ParticipantJoined { name: String },
    ParticipantLeft { name: String },
    RetroReset,

    // Breakout
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        game_state: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    GameStateUpdate { game_state: serde_json::Value },
    GameStarted,
    #[serde(rename_all = "camelCase")]
    GameReset { game_state: serde_json::Value },
    GamePaused { paused: bool },
    GameWon,
    GameOver,
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },
}

/// Encode a server event to a JSON text frame.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Encode a client event to a JSON text frame (used by tests and clients).
pub fn encode_client_event(event: &ClientEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::SerializeError(e.to_string()))
}

/// Decode an inbound text frame into a client event.
pub fn decode_client_event(raw: &str) -> Result<ClientEvent, ProtocolError> {
    if raw.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(raw.len()));
    }
    serde_json::from_str(raw).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a text frame into a server event (used by tests and clients).
pub fn decode_server_event(raw: &str) -> Result<ServerEvent, ProtocolError> {
    if raw.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(raw).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip_join_room() {
        let event = ClientEvent::JoinRoom {
            room: "ABC123".into(),
            name: "Alice".into(),
            avatar: Avatar::Emoji("🎯".into()),
            session_id: Some("s-1".into()),
        };
        let encoded = encode_client_event(&event).unwrap();
        assert_eq!(decode_client_event(&encoded).unwrap(), event);
    }

    #[test]
    fn join_room_wire_shape_matches_clients() {
        let raw = r#"{
            "type": "joinRoom",
            "room": "ABC123",
            "name": "Alice",
            "avatar": "🎯",
            "avatarType": "emoji",
            "sessionId": "s-1"
        }"#;
        let event = decode_client_event(raw).unwrap();
        assert!(matches!(event, ClientEvent::JoinRoom { ref name, .. } if name == "Alice"));
    }

    #[test]
    fn join_room_session_id_optional() {
        let raw = json!({
            "type": "joinRoom",
            "room": "ABC123",
            "name": "Bob",
            "avatar": "🐸",
            "avatarType": "emoji"
        })
        .to_string();
        match decode_client_event(&raw).unwrap() {
            ClientEvent::JoinRoom { session_id, .. } => assert!(session_id.is_none()),
            other => panic!("expected JoinRoom, got {other:?}"),
        }
    }

    #[test]
    fn vote_carries_raw_value() {
        let raw = json!({
            "type": "vote",
            "room": "ABC123",
            "sessionId": "s-1",
            "vote": 999
        })
        .to_string();
        match decode_client_event(&raw).unwrap() {
            ClientEvent::Vote { vote, .. } => assert_eq!(vote, json!(999)),
            other => panic!("expected Vote, got {other:?}"),
        }
    }

    #[test]
    fn roundtrip_paddle_move() {
        let event = ClientEvent::PaddleMove {
            room_id: "game-1".into(),
            player_id: 7,
            x: 142.5,
        };
        let encoded = encode_client_event(&event).unwrap();
        assert_eq!(decode_client_event(&encoded).unwrap(), event);
        assert!(encoded.contains("\"paddleMove\""));
        assert!(encoded.contains("\"roomId\""));
    }

    #[test]
    fn move_card_rejects_unknown_column() {
        let raw = json!({
            "type": "moveCard",
            "room": "r",
            "cardId": "1",
            "newColumn": "parking-lot"
        })
        .to_string();
        assert!(decode_client_event(&raw).is_err());
    }

    #[test]
    fn unknown_event_name_rejected() {
        assert!(decode_client_event(r#"{"type": "dropTables", "room": "r"}"#).is_err());
    }

    #[test]
    fn empty_and_oversized_rejected() {
        assert!(matches!(
            decode_client_event(""),
            Err(ProtocolError::EmptyMessage)
        ));
        let huge = format!(
            r#"{{"type": "joinRetro", "room": "r", "name": "{}"}}"#,
            "n".repeat(MAX_MESSAGE_SIZE)
        );
        assert!(matches!(
            decode_client_event(&huge),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn roundtrip_server_events() {
        let events = vec![
            ServerEvent::SessionCreated {
                session_id: "s-9".into(),
            },
            ServerEvent::UpdateParticipants {
                participants: vec![],
            },
            ServerEvent::RetroReset,
            ServerEvent::GamePaused { paused: true },
            ServerEvent::GameWon,
            ServerEvent::PlayerLeft { player_id: 3 },
            ServerEvent::GameStateUpdate {
                game_state: json!({"score": 120, "gameRunning": true}),
            },
        ];
        for event in events {
            let encoded = encode_server_event(&event).unwrap();
            assert_eq!(decode_server_event(&encoded).unwrap(), event, "{encoded}");
        }
    }

    #[test]
    fn server_event_tag_names_match_clients() {
        let encoded = encode_server_event(&ServerEvent::VotesRevealed {
            participants: vec![],
        })
        .unwrap();
        assert!(encoded.contains("\"type\":\"votesRevealed\""));
        let encoded = encode_server_event(&ServerEvent::GameOver).unwrap();
        assert_eq!(encoded, r#"{"type":"gameOver"}"#);
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::EmptyMessage), "empty message");
        assert!(format!("{}", ProtocolError::PayloadTooLarge(999_999)).contains("999999"));
        assert!(format!("{}", ProtocolError::DeserializeError("oops".into())).contains("oops"));
    }
}
