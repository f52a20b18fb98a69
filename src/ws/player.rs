//! Player intent handlers
//!
//! Outcomes reach the player as state updates through the registry, so
//! these only answer directly when the connection has not joined yet.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{ConnectionId, LobbyId, PlayerId};
use std::sync::Arc;

fn not_joined() -> Option<ServerMessage> {
    Some(ServerMessage::Error {
        code: "NOT_JOINED".to_string(),
        msg: "Join a lobby first".to_string(),
    })
}

pub async fn handle_join_lobby(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    lobby_id: LobbyId,
    name: Option<String>,
    rejoin_as: Option<PlayerId>,
) -> Option<ServerMessage> {
    tracing::info!("Join request for lobby {} from {}", lobby_id, connection_id);
    if let Err(e) = state
        .join_lobby(connection_id, lobby_id, name, rejoin_as)
        .await
    {
        tracing::debug!("Join failed: {}", e);
    }
    None
}

pub async fn handle_submit_cards(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    cards: Vec<usize>,
) -> Option<ServerMessage> {
    let Some(player_id) = state.registry.player_for(connection_id).await else {
        return not_joined();
    };
    tracing::info!("Player {} submitting cards {:?}", player_id, cards);
    if let Err(e) = state.submit_cards(&player_id, cards).await {
        tracing::debug!("Submission from {} refused: {}", player_id, e);
    }
    None
}

pub async fn handle_select_winner(
    state: &Arc<AppState>,
    connection_id: &ConnectionId,
    card_owner_id: PlayerId,
) -> Option<ServerMessage> {
    let Some(player_id) = state.registry.player_for(connection_id).await else {
        return not_joined();
    };
    tracing::info!("Czar {} picked {}", player_id, card_owner_id);
    if let Err(e) = state.select_winner(&player_id, card_owner_id).await {
        tracing::debug!("Selection from {} refused: {}", player_id, e);
    }
    None
}
