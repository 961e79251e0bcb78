//! WebSocket streaming for real-time round events.
//!
//! Connected clients subscribe to a single broadcast stream of
//! [`RoundEvent`]s: round starts, submission progress, round endings
//! and score repairs. Delivery is fire-and-forget - the game core never
//! depends on anyone listening, and a lagging client just loses the
//! events it was too slow for.
//!
//! Connect to `/api/v1/ws/events` for the JSON stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::SharedState;

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    /// The round's timer ran out
    TimeExpired,
    /// An administrator ended the round early
    AdminEnded,
}

/// Events pushed to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A round opened for submissions
    RoundStarted {
        round_id: String,
        lobby_id: String,
        round_number: u32,
        start_time: u64,
        duration_secs: u64,
    },
    /// A submission was accepted (count only - answers stay private)
    SubmissionReceived {
        round_id: String,
        submission_count: usize,
    },
    /// A round completed and its scores were computed
    RoundEnded {
        round_id: String,
        game_id: String,
        lobby_id: String,
        round_number: u32,
        end_time: u64,
        reason: EndReason,
    },
    /// A previously failed scoring run was repaired
    ScoresRepaired { round_id: String },
}

/// WebSocket handler for round events.
pub async fn ws_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_events_socket(socket, rx))
}

/// Pump broadcast events to one WebSocket client.
async fn handle_events_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<RoundEvent>) {
    info!("WebSocket client connected for round events");

    loop {
        tokio::select! {
            // Handle incoming messages from the client
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from client: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // Forward round events
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Err(e) = send_event(&mut socket, &event).await {
                            warn!("Failed to send event: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Send a round event over WebSocket as JSON.
async fn send_event(socket: &mut WebSocket, event: &RoundEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        axum::Error::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })?;
    socket.send(Message::Text(json)).await
}
