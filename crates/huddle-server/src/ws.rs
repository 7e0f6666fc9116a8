use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use huddle_core::PlayerId;
use huddle_core::protocol::{ClientEvent, ProtocolError, decode_client_event};

use crate::registry::ConnId;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

/// Rooms this connection has joined, one per tool. Used both for routing
/// and for cleanup on disconnect.
#[derive(Default)]
struct ConnMembership {
    estimation: Option<(String, String)>,
    retro: Option<(String, String)>,
    breakout: Option<(String, PlayerId)>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn = state.alloc_conn_id();
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.client_message_buffer);
    spawn_writer(ws_sender, rx);

    let mut membership = ConnMembership::default();
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(conn, "Rate limited");
            continue;
        }

        let event = match decode_client_event(text.as_str()) {
            Ok(event) => event,
            Err(ProtocolError::EmptyMessage) => continue,
            Err(e) => {
                tracing::debug!(conn, error = %e, "Dropping malformed client event");
                continue;
            },
        };

        dispatch(&state, conn, &tx, &mut membership, event).await;
    }

    disconnect(&state, conn, membership).await;
    tracing::info!(conn, "Client disconnected");
}

async fn dispatch(
    state: &AppState,
    conn: ConnId,
    tx: &mpsc::Sender<Utf8Bytes>,
    membership: &mut ConnMembership,
    event: ClientEvent,
) {
    match event {
        // Estimation
        ClientEvent::JoinRoom {
            room,
            name,
            avatar,
            session_id,
        } => {
            let mut estimation = state.estimation.write().await;
            if let Some((prev_room, prev_session)) = membership.estimation.take()
                && prev_room != room
            {
                estimation.leave(&prev_room, conn, &prev_session);
            }
            if let Some(sid) =
                estimation.join(&room, conn, tx.clone(), &name, avatar, session_id)
            {
                membership.estimation = Some((room, sid));
            }
        },
        ClientEvent::LeaveRoom { room, session_id } => {
            state.estimation.write().await.leave(&room, conn, &session_id);
            membership.estimation = None;
        },
        ClientEvent::Vote {
            room,
            session_id,
            vote,
        } => {
            state.estimation.write().await.cast_vote(&room, &session_id, &vote);
        },
        ClientEvent::RevealVotes { room } => {
            state.estimation.write().await.reveal(&room);
        },
        ClientEvent::ResetVotes { room } => {
            state.estimation.write().await.reset_votes(&room);
        },

        // Retrospective board
        ClientEvent::JoinRetro { room, name } => {
            let mut retro = state.retro.write().await;
            if let Some((prev_room, prev_name)) = membership.retro.take()
                && prev_room != room
            {
                retro.leave(&prev_room, conn, &prev_name);
            }
            if retro.join(&room, conn, tx.clone(), &name) {
                membership.retro = Some((room, name));
            }
        },
        ClientEvent::LeaveRetro { room, name } => {
            state.retro.write().await.leave(&room, conn, &name);
            membership.retro = None;
        },
        ClientEvent::AddCard { room, card } => {
            state.retro.write().await.add_card(&room, card);
        },
        ClientEvent::SubmitCard {
            room,
            card_id,
            content,
        } => {
            state.retro.write().await.submit_card(&room, &card_id, &content);
        },
        ClientEvent::DeleteCard { room, card_id } => {
            state.retro.write().await.delete_card(&room, &card_id);
        },
        ClientEvent::VoteCard {
            room,
            card_id,
            voter,
        } => {
            state.retro.write().await.vote_card(&room, &card_id, &voter);
        },
        ClientEvent::MoveCard {
            room,
            card_id,
            new_column,
        } => {
            state.retro.write().await.move_card(&room, &card_id, new_column);
        },
        ClientEvent::ResetRetro { room } => {
            state.retro.write().await.reset(&room);
        },
        ClientEvent::GroupSimilarCards { room } => {
            state.retro.write().await.group_similar_cards(&room);
        },

        // Breakout
        ClientEvent::JoinBreakout {
            room_id,
            player_name,
        } => {
            let mut breakout = state.breakout.write().await;
            if let Some((prev_room, prev_id)) = membership.breakout.take()
                && prev_room != room_id
            {
                breakout.leave(&prev_room, conn, prev_id);
            }
            if let Some(player_id) = breakout.join(&room_id, conn, tx.clone(), &player_name) {
                membership.breakout = Some((room_id, player_id));
            }
        },
        ClientEvent::StartBreakout { room_id } => {
            let mut breakout = state.breakout.write().await;
            if breakout.start(&room_id) {
                let ticker =
                    crate::breakout::spawn_ticker(Arc::clone(&state.breakout), room_id.clone());
                breakout.install_ticker(&room_id, ticker);
            }
        },
        ClientEvent::ResetBreakout { room_id } => {
            state.breakout.write().await.reset(&room_id);
        },
        ClientEvent::PauseBreakout { room_id } => {
            state.breakout.write().await.toggle_pause(&room_id);
        },
        ClientEvent::PaddleMove {
            room_id,
            player_id,
            x,
        } => {
            // Trust the connection's own identity, not the payload
            match membership.breakout {
                Some((ref room, own_id)) if *room == room_id && own_id == player_id => {
                    state.breakout.write().await.paddle_move(&room_id, conn, player_id, x);
                },
                _ => {
                    tracing::debug!(conn, %room_id, player_id, "Ignoring paddle move spoof");
                },
            }
        },
    }
}

/// Clean up everything this connection joined, in whatever order the
/// rooms still exist.
async fn disconnect(state: &AppState, conn: ConnId, membership: ConnMembership) {
    if let Some((room, session_id)) = membership.estimation {
        state.estimation.write().await.leave(&room, conn, &session_id);
    }
    if let Some((room, name)) = membership.retro {
        state.retro.write().await.leave(&room, conn, &name);
    }
    if let Some((room, player_id)) = membership.breakout {
        state.breakout.write().await.leave(&room, conn, player_id);
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
