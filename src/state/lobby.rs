use rand::Rng;

use super::{AppState, DispatchError, DispatchResult, HostSession};
use crate::deck::build_decks;
use crate::host::{HostAction, HostError};
use crate::protocol::{LoadingKey, ServerMessage};
use crate::sync;
use crate::types::*;

/// Characters for lobby codes; no 0/O or 1/I/L
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

fn generate_lobby_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

fn default_name() -> String {
    petname::petname(2, " ").unwrap_or_else(|| "Mystery Player".to_string())
}

impl AppState {
    /// Open the lobby for a host display, or hand an existing one to it
    pub async fn open_lobby(&self, host_connection: &ConnectionId) -> Lobby {
        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut() {
            tracing::info!(
                "Host display {} attached to lobby {}",
                host_connection,
                session.lobby.lobby_id
            );
            session.host_connection = host_connection.clone();
            return session.lobby.clone();
        }

        let lobby = Lobby::new(generate_lobby_code(), self.default_settings.clone());
        tracing::info!("Opened lobby {}", lobby.lobby_id);
        *guard = Some(HostSession {
            lobby: lobby.clone(),
            host_connection: host_connection.clone(),
            timer: None,
        });
        lobby
    }

    /// Tell every player the lobby is gone and forget it
    pub async fn close_lobby(&self) -> DispatchResult<()> {
        // `lobby-closed` and the teardown share one lock; nothing may follow it
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(DispatchError::NoLobby)?;
        self.dispatch_locked(session, HostAction::CloseLobby, None)
            .await?;

        if let Some(mut session) = guard.take() {
            session.cancel_timer();
            tracing::info!("Closed lobby {}", session.lobby.lobby_id);
        }
        self.registry.unbind_all().await;
        Ok(())
    }

    /// A host display went away; the lobby closes with the display that opened it
    pub async fn host_disconnected(&self, connection_id: &ConnectionId) {
        let owns_lobby = self
            .session
            .read()
            .await
            .as_ref()
            .is_some_and(|s| &s.host_connection == connection_id);

        if owns_lobby {
            if let Err(e) = self.close_lobby().await {
                tracing::warn!("Failed to close lobby after host left: {}", e);
            }
        }
    }

    pub async fn join_lobby(
        &self,
        connection_id: &ConnectionId,
        lobby_id: LobbyId,
        name: Option<String>,
        rejoin_as: Option<PlayerId>,
    ) -> DispatchResult<()> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(default_name);

        // A socket carries at most one player
        if let Some(player_id) = self.registry.player_for(connection_id).await {
            tracing::debug!(
                "Connection {} already plays as {}, ignoring join",
                connection_id,
                player_id
            );
            self.resync(&player_id, Some(LoadingKey::JoiningLobby)).await;
            return Err(HostError::AlreadyJoined(player_id).into());
        }

        let action = HostAction::JoinLobby {
            connection_id: connection_id.clone(),
            lobby_id,
            name,
            rejoin_as,
        };

        let result = self.dispatch(action, Some(connection_id)).await;
        if let Err(e) = &result {
            match e {
                DispatchError::Rejected(host) if !host.is_capacity() => {
                    tracing::debug!("Join from {} refused: {}", connection_id, e)
                }
                _ => tracing::info!("Join from {} refused: {}", connection_id, e),
            }
            let message = sync::join_rejected(&e.to_string());
            if let Err(send_err) = self.registry.send_to_connection(connection_id, message).await {
                tracing::debug!("Could not deliver join refusal: {}", send_err);
            }
        }
        result
    }

    /// A player socket closed
    pub async fn connection_closed(&self, connection_id: &ConnectionId) {
        for player_id in self.registry.release(connection_id).await {
            let action = HostAction::PlayerDisconnected { player_id };
            match self.dispatch(action, None).await {
                Ok(()) | Err(DispatchError::NoLobby) => {}
                Err(e) => tracing::debug!("Disconnect of {} not applied: {}", connection_id, e),
            }
        }
    }

    pub async fn start_game(&self) -> DispatchResult<()> {
        let enabled = self
            .get_lobby()
            .await
            .ok_or(DispatchError::NoLobby)?
            .game_settings
            .enabled_packs;

        let (black_deck, white_deck) = {
            let mut rng = rand::rng();
            build_decks(&self.packs, &enabled, &mut rng)
        };

        self.dispatch(
            HostAction::StartGame {
                black_deck,
                white_deck,
            },
            None,
        )
        .await
    }

    pub async fn update_settings(&self, settings: GameSettings) -> DispatchResult<()> {
        self.dispatch(HostAction::UpdateSettings { settings }, None)
            .await
    }

    /// Snapshot for a host display that just connected
    pub async fn lobby_snapshot(&self) -> Option<ServerMessage> {
        self.get_lobby()
            .await
            .map(|lobby| ServerMessage::LobbyState(Box::new(lobby)))
    }
}
