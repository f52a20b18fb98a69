//! WebSocket message dispatch
//!
//! Authorization is checked here, then messages go to the role-specific
//! handler modules. Player intents answer through the connection registry,
//! so they usually return `None`; a returned message goes straight back to
//! the sender.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, Role};
use std::sync::Arc;

use super::{host, player};

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($role:expr, $action:expr) => {
        if *$role != Role::Host {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only the host can {}", $action),
            });
        }
    };
}

macro_rules! check_player {
    ($role:expr, $action:expr) => {
        if *$role != Role::Player {
            return Some(ServerMessage::Error {
                code: "UNAUTHORIZED".to_string(),
                msg: format!("Only players can {}", $action),
            });
        }
    };
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    role: &Role,
    connection_id: &ConnectionId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        // Player intents
        ClientMessage::JoinLobby {
            lobby_id,
            name,
            player_id,
        } => {
            check_player!(role, "join a lobby");
            player::handle_join_lobby(state, connection_id, lobby_id, name, player_id).await
        }

        ClientMessage::SubmitCards { cards } => {
            check_player!(role, "submit cards");
            player::handle_submit_cards(state, connection_id, cards).await
        }

        ClientMessage::SelectWinner { card_owner_id } => {
            check_player!(role, "select a winner");
            player::handle_select_winner(state, connection_id, card_owner_id).await
        }

        // Host display commands
        ClientMessage::StartGame => {
            check_host!(role, "start the game");
            host::handle_start_game(state).await
        }

        ClientMessage::UpdateSettings { settings } => {
            check_host!(role, "change settings");
            host::handle_update_settings(state, settings).await
        }

        ClientMessage::CloseLobby => {
            check_host!(role, "close the lobby");
            host::handle_close_lobby(state).await
        }
    }
}
