//! Transport seam between the game logic and connected devices.
//!
//! The host side only knows player ids; [`ConnectionRegistry`] maps them to
//! the outbound queue of whichever socket currently carries that player.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{ConnectionId, PlayerId};

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("No connection for {0}")]
    NotConnected(String),

    #[error("Connection {0} is closed")]
    Closed(String),
}

/// Delivers server events to a single player
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn emit(&self, to: &PlayerId, message: ServerMessage) -> ChannelResult<()>;
}

/// Carries a player device's intents to the host
#[async_trait]
pub trait IntentChannel: Send + Sync {
    async fn send(&self, intent: ClientMessage) -> ChannelResult<()>;
}

#[async_trait]
impl IntentChannel for mpsc::UnboundedSender<ClientMessage> {
    async fn send(&self, intent: ClientMessage) -> ChannelResult<()> {
        mpsc::UnboundedSender::send(self, intent)
            .map_err(|_| ChannelError::Closed("intent channel".to_string()))
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>>,
    players: Arc<RwLock<HashMap<PlayerId, ConnectionId>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an outbound queue for a new socket
    pub async fn register(&self, connection_id: &ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .await
            .insert(connection_id.clone(), tx);
        rx
    }

    /// Route a player's events to this connection from now on
    pub async fn bind(&self, connection_id: &ConnectionId, player_id: &PlayerId) {
        let previous = self
            .players
            .write()
            .await
            .insert(player_id.clone(), connection_id.clone());
        if let Some(previous) = previous.filter(|c| c != connection_id) {
            tracing::debug!("Player {} moved from {} to {}", player_id, previous, connection_id);
        }
    }

    /// Drop a closed connection, returning every player it carried
    pub async fn release(&self, connection_id: &ConnectionId) -> Vec<PlayerId> {
        self.connections.write().await.remove(connection_id);

        let mut players = self.players.write().await;
        let carried: Vec<PlayerId> = players
            .iter()
            .filter(|(_, c)| *c == connection_id)
            .map(|(p, _)| p.clone())
            .collect();
        for player_id in &carried {
            players.remove(player_id);
        }
        carried
    }

    /// Forget every player binding; sockets stay open for the next lobby
    pub async fn unbind_all(&self) {
        self.players.write().await.clear();
    }

    pub async fn player_for(&self, connection_id: &ConnectionId) -> Option<PlayerId> {
        self.players
            .read()
            .await
            .iter()
            .find(|(_, c)| *c == connection_id)
            .map(|(p, _)| p.clone())
    }

    pub async fn send_to_connection(
        &self,
        connection_id: &ConnectionId,
        message: ServerMessage,
    ) -> ChannelResult<()> {
        let connections = self.connections.read().await;
        let tx = connections
            .get(connection_id)
            .ok_or_else(|| ChannelError::NotConnected(connection_id.clone()))?;
        tx.send(message)
            .map_err(|_| ChannelError::Closed(connection_id.clone()))
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl EventChannel for ConnectionRegistry {
    async fn emit(&self, to: &PlayerId, message: ServerMessage) -> ChannelResult<()> {
        // Before the join is acknowledged a player is addressed by connection id
        let connection_id = self
            .players
            .read()
            .await
            .get(to)
            .cloned()
            .unwrap_or_else(|| to.clone());
        self.send_to_connection(&connection_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_follows_binding() {
        let registry = ConnectionRegistry::new();
        let conn = "conn-1".to_string();
        let player = "player-1".to_string();
        let mut rx = registry.register(&conn).await;

        registry.bind(&conn, &player).await;
        registry
            .emit(&player, ServerMessage::LobbyClosed {})
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(ServerMessage::LobbyClosed {}));
    }

    #[tokio::test]
    async fn test_emit_to_unbound_connection_id() {
        let registry = ConnectionRegistry::new();
        let conn = "conn-1".to_string();
        let mut rx = registry.register(&conn).await;

        registry
            .emit(&conn, ServerMessage::ErrorDisconnect {})
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(ServerMessage::ErrorDisconnect {}));
    }

    #[tokio::test]
    async fn test_emit_unknown_player_fails() {
        let registry = ConnectionRegistry::new();
        let result = registry
            .emit(&"ghost".to_string(), ServerMessage::LobbyClosed {})
            .await;
        assert_eq!(result, Err(ChannelError::NotConnected("ghost".to_string())));
    }

    #[tokio::test]
    async fn test_rebind_moves_player_to_new_connection() {
        let registry = ConnectionRegistry::new();
        let old = "old".to_string();
        let new = "new".to_string();
        let player = "p".to_string();
        let _old_rx = registry.register(&old).await;
        let mut new_rx = registry.register(&new).await;

        registry.bind(&old, &player).await;
        registry.bind(&new, &player).await;

        // The stale socket closing must not unbind the player
        assert!(registry.release(&old).await.is_empty());
        registry
            .emit(&player, ServerMessage::LobbyClosed {})
            .await
            .unwrap();
        assert_eq!(new_rx.recv().await, Some(ServerMessage::LobbyClosed {}));

        assert_eq!(registry.release(&new).await, vec![player]);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_unbinds_every_player_on_connection() {
        let registry = ConnectionRegistry::new();
        let conn = "conn".to_string();
        let _rx = registry.register(&conn).await;

        registry.bind(&conn, &"c".to_string()).await;
        registry.bind(&conn, &"d".to_string()).await;

        let mut released = registry.release(&conn).await;
        released.sort();
        assert_eq!(released, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(registry.player_for(&conn).await, None);
    }

    #[tokio::test]
    async fn test_closed_receiver_reports_error() {
        let registry = ConnectionRegistry::new();
        let conn = "conn".to_string();
        drop(registry.register(&conn).await);

        let result = registry
            .send_to_connection(&conn, ServerMessage::LobbyClosed {})
            .await;
        assert_eq!(result, Err(ChannelError::Closed(conn)));
    }

    #[tokio::test]
    async fn test_intent_channel_over_mpsc() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        IntentChannel::send(&tx, ClientMessage::StartGame).await.unwrap();
        assert_eq!(rx.recv().await, Some(ClientMessage::StartGame));

        drop(rx);
        assert!(IntentChannel::send(&tx, ClientMessage::CloseLobby).await.is_err());
    }
}
