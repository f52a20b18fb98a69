//! Turns host transitions into per-player messages.
//!
//! Each connected player sees a projection of the lobby: which screen to
//! show and what it says. After a transition both projections are compared
//! and only the fields that changed go out as an `update`, so a player whose
//! screen did not change receives nothing.

use crate::host::{Outbound, Recipient};
use crate::protocol::{LoadingKey, PlayerPhase, ServerMessage, StatePatch, StatusMessage};
use crate::types::*;

/// What one player's device should currently display
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub game_state: PlayerPhase,
    pub message: StatusMessage,
}

impl PlayerView {
    fn new(game_state: PlayerPhase, message: StatusMessage) -> Self {
        Self {
            game_state,
            message,
        }
    }

    pub fn full_patch(&self) -> StatePatch {
        StatePatch {
            game_state: Some(self.game_state),
            message: Some(self.message.clone()),
            ..Default::default()
        }
    }

    /// Patch that brings `prev` to `self`; `None` means the device knows nothing yet
    pub fn diff_from(&self, prev: Option<&PlayerView>) -> StatePatch {
        let Some(prev) = prev else {
            return self.full_patch();
        };
        let mut patch = StatePatch::default();
        if prev.game_state != self.game_state {
            patch.game_state = Some(self.game_state);
        }
        if prev.message != self.message {
            patch.message = Some(self.message.clone());
        }
        patch
    }
}

/// A message addressed to one player
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: PlayerId,
    pub message: ServerMessage,
}

/// Project the lobby onto one player's screen. Disconnected players see nothing.
pub fn project(lobby: &Lobby, player_id: &PlayerId) -> Option<PlayerView> {
    let player = lobby.players.get(player_id).filter(|p| p.is_connected())?;

    if lobby.game_state == GamePhase::GameOver {
        return Some(game_over_view(lobby, player_id));
    }

    let seated = player.status == PlayerStatus::Playing && lobby.player_ids.contains(player_id);
    if !seated {
        let small = if lobby.game_state.is_round_active() || lobby.round > 0 {
            "You'll be dealt in next round"
        } else {
            "Waiting for the host to start the game"
        };
        return Some(PlayerView::new(
            PlayerPhase::LobbyWait,
            StatusMessage::new("You're in!", small),
        ));
    }

    let view = match lobby.game_state {
        GamePhase::Pregame | GamePhase::StagingComplete if lobby.round == 0 => PlayerView::new(
            PlayerPhase::LobbyWait,
            StatusMessage::new("You're in!", "Waiting for the host to start the game"),
        ),
        GamePhase::Pregame | GamePhase::StagingComplete => PlayerView::new(
            PlayerPhase::LobbyWait,
            StatusMessage::new("Round cancelled", "Waiting for the host to continue"),
        ),
        GamePhase::Dealing | GamePhase::SubmissionOpen if player.is_czar => PlayerView::new(
            PlayerPhase::CzarWait,
            StatusMessage::new("You are the Czar", "Wait for everyone to pick their cards"),
        ),
        GamePhase::Dealing | GamePhase::SubmissionOpen if player.has_submitted() => {
            PlayerView::new(
                PlayerPhase::PlayerWait,
                StatusMessage::new("Cards submitted", "Waiting for the other players"),
            )
        }
        GamePhase::Dealing | GamePhase::SubmissionOpen => {
            let (text, pick) = lobby
                .selected_black_card
                .as_ref()
                .map_or((String::new(), 1), |c| (c.text.clone(), c.pick));
            PlayerView::new(
                PlayerPhase::PlayerSelect,
                StatusMessage::new(text, format!("Pick {}", pick)),
            )
        }
        GamePhase::Reveal if player.is_czar => {
            let text = lobby
                .selected_black_card
                .as_ref()
                .map(|c| c.text.clone())
                .unwrap_or_default();
            PlayerView::new(
                PlayerPhase::CzarSelect,
                StatusMessage::new("Pick your favorite", text),
            )
        }
        GamePhase::Reveal => PlayerView::new(
            PlayerPhase::PlayerWait,
            StatusMessage::new("The Czar is choosing", "Fingers crossed"),
        ),
        GamePhase::RoundWinner => round_result_view(lobby, player_id),
        GamePhase::GameOver => game_over_view(lobby, player_id),
    };
    Some(view)
}

fn round_result_view(lobby: &Lobby, player_id: &PlayerId) -> PlayerView {
    let winner_id = lobby.czar_selection.as_ref();
    let winner = winner_id.and_then(|id| lobby.players.get(id));
    let name = winner.map_or("Nobody", |p| p.name.as_str());
    let cards = lobby
        .submitted_cards
        .iter()
        .filter(|c| Some(&c.player_id) == winner_id)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" / ");

    let message = if winner_id == Some(player_id) {
        let score = winner.map_or(0, |p| p.score);
        StatusMessage::new("You won the round!", format!("Score: {}", score))
    } else if lobby.czar.as_ref() == Some(player_id) {
        StatusMessage::new(format!("You picked {}", name), cards)
    } else {
        StatusMessage::new(format!("{} won the round", name), cards)
    };
    PlayerView::new(PlayerPhase::RoundResult, message)
}

fn game_over_view(lobby: &Lobby, player_id: &PlayerId) -> PlayerView {
    let message = match lobby.standings.first() {
        Some(first) if &first.player_id == player_id => {
            StatusMessage::new("You won the game!", format!("Final score: {}", first.score))
        }
        Some(first) => {
            let big = format!("{} won the game", first.name);
            match lobby
                .standings
                .iter()
                .position(|s| &s.player_id == player_id)
            {
                Some(rank) => StatusMessage::new(
                    big,
                    format!(
                        "You finished #{} with {} points",
                        rank + 1,
                        lobby.standings[rank].score
                    ),
                ),
                None => StatusMessage::new(big, format!("Final score: {}", first.score)),
            }
        }
        None => StatusMessage::big_only("Game over"),
    };
    PlayerView::new(PlayerPhase::GameOver, message)
}

/// Seated players first in seating order, then everyone else by id
fn player_order(lobby: &Lobby) -> Vec<&PlayerId> {
    let mut rest: Vec<&PlayerId> = lobby
        .players
        .keys()
        .filter(|id| !lobby.player_ids.contains(id))
        .collect();
    rest.sort();
    lobby.player_ids.iter().chain(rest).collect()
}

fn resolve<'a>(lobby: &'a Lobby, to: &'a Recipient) -> Vec<&'a PlayerId> {
    match to {
        Recipient::Player(id) => vec![id],
        Recipient::Everyone => player_order(lobby)
            .into_iter()
            .filter(|id| lobby.players.get(*id).is_some_and(|p| p.is_connected()))
            .collect(),
    }
}

/// Everything to send after a transition from `prev` to `next`.
///
/// Join acknowledgements go first so the device knows its id before any
/// state arrives, then state updates, then the reducer's other messages.
pub fn plan(prev: &Lobby, next: &Lobby, outbox: Vec<Outbound>) -> Vec<Delivery> {
    let mut acks = Vec::new();
    let mut extra_patches: Vec<(PlayerId, StatePatch)> = Vec::new();
    let mut rest = Vec::new();

    for outbound in outbox {
        for id in resolve(next, &outbound.to) {
            match &outbound.message {
                ServerMessage::JoinLobby { .. } => acks.push(Delivery {
                    to: id.clone(),
                    message: outbound.message.clone(),
                }),
                ServerMessage::Update(patch) => extra_patches.push((id.clone(), patch.clone())),
                message => rest.push(Delivery {
                    to: id.clone(),
                    message: message.clone(),
                }),
            }
        }
    }

    let mut updates = Vec::new();
    for id in player_order(next) {
        let Some(view) = project(next, id) else {
            continue;
        };
        let previous = project(prev, id);
        let mut patch = view.diff_from(previous.as_ref());

        for (_, extra) in extra_patches.iter().filter(|(to, _)| to == id) {
            patch.merge(extra.clone());
        }

        if previous.is_none() {
            if let Some(deal) = catch_up_deal(next, id, &rest) {
                rest.push(deal);
            }
        }

        if !patch.is_empty() {
            updates.push(Delivery {
                to: id.clone(),
                message: ServerMessage::Update(patch),
            });
        }
    }

    acks.into_iter().chain(updates).chain(rest).collect()
}

/// A player arriving mid-submission needs their hand
fn catch_up_deal(lobby: &Lobby, player_id: &PlayerId, pending: &[Delivery]) -> Option<Delivery> {
    if lobby.game_state != GamePhase::SubmissionOpen {
        return None;
    }
    let player = lobby.players.get(player_id)?;
    let eligible = lobby.eligible_submitters().any(|id| id == player_id);
    if !eligible || player.has_submitted() {
        return None;
    }
    let already_dealt = pending.iter().any(|d| {
        &d.to == player_id && matches!(d.message, ServerMessage::DealWhiteCards { .. })
    });
    if already_dealt {
        return None;
    }

    Some(Delivery {
        to: player_id.clone(),
        message: ServerMessage::DealWhiteCards {
            cards: player.cards.clone(),
            select_card_count: lobby.pick(),
        },
    })
}

/// Full screen state for a player whose intent was refused, clearing its spinner
pub fn resync(lobby: &Lobby, player_id: &PlayerId, loading: Option<LoadingKey>) -> Option<Delivery> {
    let view = project(lobby, player_id)?;
    let mut patch = view.full_patch();
    patch.remove_loading = loading;
    Some(Delivery {
        to: player_id.clone(),
        message: ServerMessage::Update(patch),
    })
}

/// Sends a device whose join was refused back to the code entry screen
pub fn join_rejected(reason: &str) -> ServerMessage {
    ServerMessage::Update(StatePatch {
        game_state: Some(PlayerPhase::EnterCode),
        message: Some(StatusMessage::new("Could not join", reason)),
        remove_loading: Some(LoadingKey::JoiningLobby),
        ..Default::default()
    })
}
