use super::{reduce, PlayerAction, PlayerState};
use crate::channel::{ChannelResult, IntentChannel};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::PlayerId;

/// A player device: local state plus the channel its intents travel over.
///
/// Intents update the local state optimistically and are sent without
/// waiting for an answer; the host's reply arrives later through
/// [`PlayerSession::receive`].
pub struct PlayerSession<C: IntentChannel> {
    channel: C,
    state: PlayerState,
}

impl<C: IntentChannel> PlayerSession<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: PlayerState::default(),
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    fn dispatch(&mut self, action: PlayerAction) {
        self.state = reduce(&self.state, action);
    }

    async fn fire(&mut self, intent: ClientMessage) -> ChannelResult<()> {
        if let Err(e) = self.channel.send(intent).await {
            tracing::error!("Failed to send intent: {}", e);
            self.dispatch(PlayerAction::ErrorDisconnect);
            return Err(e);
        }
        Ok(())
    }

    /// Join a lobby, reclaiming the previous identity if this device had one
    pub async fn join_lobby(&mut self, lobby_id: &str, name: Option<String>) -> ChannelResult<()> {
        self.dispatch(PlayerAction::JoinLobby);
        let intent = ClientMessage::JoinLobby {
            lobby_id: lobby_id.trim().to_uppercase(),
            name,
            player_id: self.state.id.clone(),
        };
        self.fire(intent).await
    }

    pub async fn submit_cards(&mut self, cards: Vec<usize>) -> ChannelResult<()> {
        self.dispatch(PlayerAction::SubmitCards);
        self.fire(ClientMessage::SubmitCards { cards }).await
    }

    pub async fn select_winner(&mut self, card_owner_id: PlayerId) -> ChannelResult<()> {
        self.dispatch(PlayerAction::SelectWinner);
        self.fire(ClientMessage::SelectWinner { card_owner_id }).await
    }

    pub fn receive(&mut self, message: ServerMessage) {
        match PlayerAction::from_event(message) {
            Some(action) => self.dispatch(action),
            None => tracing::debug!("Ignoring host-only event"),
        }
    }

    /// Apply an event straight off the wire. Unknown or malformed events are ignored.
    pub fn receive_raw(&mut self, raw: &str) {
        match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => self.receive(message),
            Err(e) => tracing::debug!("Ignoring unrecognised event: {}", e),
        }
    }

    /// The transport dropped for good
    pub fn channel_lost(&mut self) {
        self.dispatch(PlayerAction::ErrorDisconnect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LoadingKey, PlayerPhase};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_join_fires_intent_without_waiting() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = PlayerSession::new(tx);

        session.join_lobby(" abcde ", Some("Ann".to_string())).await.unwrap();

        assert_eq!(session.state().game_state, PlayerPhase::PendingConnection);
        assert_eq!(
            rx.recv().await,
            Some(ClientMessage::JoinLobby {
                lobby_id: "ABCDE".to_string(),
                name: Some("Ann".to_string()),
                player_id: None,
            })
        );
    }

    #[tokio::test]
    async fn test_rejoin_sends_known_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = PlayerSession::new(tx);
        session.receive(ServerMessage::JoinLobby {
            id: "p7".to_string(),
        });

        session.join_lobby("ABCDE", None).await.unwrap();
        match rx.recv().await {
            Some(ClientMessage::JoinLobby { player_id, .. }) => {
                assert_eq!(player_id.as_deref(), Some("p7"))
            }
            other => panic!("Expected join intent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_is_error_state() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut session = PlayerSession::new(tx);

        assert!(session.submit_cards(vec![0]).await.is_err());
        assert_eq!(session.state().game_state, PlayerPhase::Error);
    }

    #[tokio::test]
    async fn test_submit_then_host_ack() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = PlayerSession::new(tx);

        session.submit_cards(vec![2]).await.unwrap();
        assert!(session.state().is_loading(LoadingKey::SubmittingCards));

        session.receive_raw(
            r#"{"event":"update","payload":{"gameState":"player-wait","removeLoading":"submitting-cards"}}"#,
        );
        assert_eq!(session.state().game_state, PlayerPhase::PlayerWait);
        assert!(session.state().loading.is_empty());
    }

    #[test]
    fn test_unknown_event_leaves_state_unchanged() {
        let (tx, _rx) = mpsc::unbounded_channel::<ClientMessage>();
        let mut session = PlayerSession::new(tx);
        session.receive_raw(
            r#"{"event":"deal-white-cards","payload":{"cards":[{"text":"a"}],"selectCardCount":1}}"#,
        );
        let before = session.state().clone();

        session.receive_raw(r#"{"event":"confetti","payload":{"amount":9000}}"#);
        session.receive_raw("not even json");
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_lobby_closed_event() {
        let (tx, _rx) = mpsc::unbounded_channel::<ClientMessage>();
        let mut session = PlayerSession::new(tx);
        session.receive_raw(r#"{"event":"lobby-closed","payload":{}}"#);
        assert_eq!(session.state().game_state, PlayerPhase::LobbyClosed);

        session.channel_lost();
        assert_eq!(session.state().game_state, PlayerPhase::Error);
    }
}
