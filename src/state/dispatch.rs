use super::{AppState, DispatchError, DispatchResult, HostSession};
use crate::channel::EventChannel;
use crate::host::{reduce, HostAction};
use crate::protocol::{LoadingKey, ServerMessage};
use crate::sync::{self, Delivery};
use crate::types::*;

impl AppState {
    /// Run one action against the lobby and push the results out.
    ///
    /// The session lock is held for the whole call, so actions are applied
    /// one at a time in arrival order. `origin` is the connection that asked
    /// for the action; a join acknowledgement binds it to the new player.
    pub async fn dispatch(
        &self,
        action: HostAction,
        origin: Option<&ConnectionId>,
    ) -> DispatchResult<()> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(DispatchError::NoLobby)?;
        self.dispatch_locked(session, action, origin).await
    }

    /// [`AppState::dispatch`] for a caller already holding the session lock
    pub(super) async fn dispatch_locked(
        &self,
        session: &mut HostSession,
        action: HostAction,
        origin: Option<&ConnectionId>,
    ) -> DispatchResult<()> {
        let name = action.name();
        let result = {
            let mut rng = rand::rng();
            reduce(&session.lobby, action, &mut rng)
        };
        let transition = match result {
            Ok(transition) => transition,
            Err(e) => {
                tracing::debug!("{} rejected: {}", name, e);
                return Err(e.into());
            }
        };
        tracing::debug!("{} applied in lobby {}", name, session.lobby.lobby_id);

        if let Some(connection_id) = origin {
            for outbound in &transition.outbox {
                if let ServerMessage::JoinLobby { id } = &outbound.message {
                    self.registry.bind(connection_id, id).await;
                }
            }
        }

        let prev = std::mem::replace(&mut session.lobby, transition.lobby);
        let deliveries = sync::plan(&prev, &session.lobby, transition.outbox);
        self.deliver(deliveries).await;

        // No receivers connected is fine
        let _ = self
            .host_broadcast
            .send(ServerMessage::LobbyState(Box::new(session.lobby.clone())));

        self.schedule_timer(session, &prev);
        Ok(())
    }

    async fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if let Err(e) = self.registry.emit(&delivery.to, delivery.message).await {
                tracing::warn!("Dropped message for {}: {}", delivery.to, e);
            }
        }
    }

    /// A player intent: refusals resync the player so its screen never sticks
    pub async fn player_intent(
        &self,
        player_id: &PlayerId,
        action: HostAction,
        loading: Option<LoadingKey>,
    ) -> DispatchResult<()> {
        let result = self.dispatch(action, None).await;
        if let Err(DispatchError::Rejected(_)) = &result {
            self.resync(player_id, loading).await;
        }
        result
    }

    pub(super) async fn resync(&self, player_id: &PlayerId, loading: Option<LoadingKey>) {
        let delivery = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| sync::resync(&s.lobby, player_id, loading));
        if let Some(delivery) = delivery {
            self.deliver(vec![delivery]).await;
        }
    }

    pub async fn submit_cards(&self, player_id: &PlayerId, cards: Vec<usize>) -> DispatchResult<()> {
        let action = HostAction::SubmitCards {
            player_id: player_id.clone(),
            cards,
        };
        self.player_intent(player_id, action, Some(LoadingKey::SubmittingCards))
            .await
    }

    pub async fn select_winner(
        &self,
        player_id: &PlayerId,
        card_owner_id: PlayerId,
    ) -> DispatchResult<()> {
        let action = HostAction::SelectWinner {
            player_id: player_id.clone(),
            card_owner_id,
        };
        self.player_intent(player_id, action, Some(LoadingKey::SelectingWinner))
            .await
    }

    fn schedule_timer(&self, session: &mut HostSession, prev: &Lobby) {
        let phase = session.lobby.game_state;
        let round = session.lobby.round;
        if phase == prev.game_state && round == prev.round {
            return;
        }
        session.cancel_timer();

        let settings = &session.lobby.game_settings;
        let timer = match phase {
            GamePhase::RoundWinner => Some((
                settings.winner_screen_display_time,
                HostAction::FinishRound { round },
            )),
            GamePhase::SubmissionOpen => settings
                .submission_time_limit
                .map(|limit| (limit, HostAction::CloseSubmissions { round })),
            _ => None,
        };

        if let Some((delay, action)) = timer {
            session.timer = Some(self.spawn_timer(delay, action));
        }
    }
}
