//! Host display command handlers

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::GameSettings;
use std::sync::Arc;

fn error(code: &str, msg: impl ToString) -> Option<ServerMessage> {
    Some(ServerMessage::Error {
        code: code.to_string(),
        msg: msg.to_string(),
    })
}

pub async fn handle_start_game(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host starting game");
    match state.start_game().await {
        Ok(()) => None,
        Err(e) => error("START_FAILED", e),
    }
}

pub async fn handle_update_settings(
    state: &Arc<AppState>,
    settings: GameSettings,
) -> Option<ServerMessage> {
    tracing::info!("Host updating settings: {:?}", settings);
    match state.update_settings(settings).await {
        Ok(()) => None,
        Err(e) => error("SETTINGS_REJECTED", e),
    }
}

pub async fn handle_close_lobby(state: &Arc<AppState>) -> Option<ServerMessage> {
    tracing::info!("Host closing lobby");
    match state.close_lobby().await {
        Ok(()) => None,
        Err(e) => error("CLOSE_FAILED", e),
    }
}
