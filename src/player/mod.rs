//! Player device state.
//!
//! A device only holds the narrow slice of the game the host pushes to it.
//! [`reduce`] is total: every action yields a well-formed state, and events
//! it has no handler for leave the state as it was.

mod session;

pub use session::PlayerSession;

use serde::Serialize;

use crate::protocol::{LoadingKey, PlayerPhase, ServerMessage, StatePatch, StatusMessage};
use crate::types::{PlayerId, WhiteCard};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub game_state: PlayerPhase,
    pub message: StatusMessage,
    /// In-flight intents, each at most once
    pub loading: Vec<LoadingKey>,
    pub cards: Vec<WhiteCard>,
    pub select_card_count: usize,
    /// Identity assigned by the host, kept for rejoining
    pub id: Option<PlayerId>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            game_state: PlayerPhase::EnterCode,
            message: StatusMessage::default(),
            loading: Vec::new(),
            cards: Vec::new(),
            select_card_count: 0,
            id: None,
        }
    }
}

impl PlayerState {
    pub fn is_loading(&self, key: LoadingKey) -> bool {
        self.loading.contains(&key)
    }

    fn start_loading(&mut self, key: LoadingKey) {
        if !self.is_loading(key) {
            self.loading.push(key);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Join intent fired by the device
    JoinLobby,
    /// The host acknowledged the join
    Joined { id: PlayerId },
    Update(StatePatch),
    ErrorDisconnect,
    SubmitCards,
    SelectWinner,
    ReceiveWhiteCards {
        cards: Vec<WhiteCard>,
        select_card_count: usize,
    },
    LobbyClosed,
}

impl PlayerAction {
    /// The action a server event maps to; `None` for events a device ignores
    pub fn from_event(message: ServerMessage) -> Option<Self> {
        match message {
            ServerMessage::JoinLobby { id } => Some(PlayerAction::Joined { id }),
            ServerMessage::Update(patch) => Some(PlayerAction::Update(patch)),
            ServerMessage::DealWhiteCards {
                cards,
                select_card_count,
            } => Some(PlayerAction::ReceiveWhiteCards {
                cards,
                select_card_count,
            }),
            ServerMessage::ErrorDisconnect {} => Some(PlayerAction::ErrorDisconnect),
            ServerMessage::LobbyClosed {} => Some(PlayerAction::LobbyClosed),
            ServerMessage::LobbyState(_) | ServerMessage::Error { .. } => None,
        }
    }
}

pub fn reduce(state: &PlayerState, action: PlayerAction) -> PlayerState {
    let mut next = state.clone();
    match action {
        PlayerAction::JoinLobby => {
            next.game_state = PlayerPhase::PendingConnection;
            next.message = StatusMessage::new("Connecting to Lobby", "Please wait");
            next.start_loading(LoadingKey::JoiningLobby);
        }
        PlayerAction::Joined { id } => {
            next.id = Some(id);
        }
        PlayerAction::Update(patch) => apply_patch(&mut next, patch),
        PlayerAction::ErrorDisconnect => {
            next.game_state = PlayerPhase::Error;
            next.message = StatusMessage::big_only("AN ERROR OCCURRED");
        }
        PlayerAction::SubmitCards => {
            next.game_state = PlayerPhase::SubmittingCards;
            next.message = StatusMessage::new("Submitting your cards", "Please wait");
            next.start_loading(LoadingKey::SubmittingCards);
        }
        PlayerAction::SelectWinner => {
            next.game_state = PlayerPhase::SelectingWinner;
            next.message = StatusMessage::new("Sending your pick", "Please wait");
            next.start_loading(LoadingKey::SelectingWinner);
        }
        PlayerAction::ReceiveWhiteCards {
            cards,
            select_card_count,
        } => {
            next.cards = cards;
            next.select_card_count = select_card_count;
            next.game_state = PlayerPhase::PlayerSelect;
        }
        PlayerAction::LobbyClosed => {
            next.game_state = PlayerPhase::LobbyClosed;
            next.message = StatusMessage::new(
                "THE LOBBY HAS BEEN CLOSED",
                "You don't have to go home, but you can't stay here",
            );
            next.loading.clear();
        }
    }
    next
}

fn apply_patch(state: &mut PlayerState, patch: StatePatch) {
    if let Some(game_state) = patch.game_state {
        state.game_state = game_state;
    }
    if let Some(message) = patch.message {
        state.message = message;
    }
    if let Some(cards) = patch.cards {
        state.cards = cards;
    }
    if let Some(count) = patch.select_card_count {
        state.select_card_count = count;
    }
    if let Some(key) = patch.remove_loading {
        state.loading.retain(|k| *k != key);
    }
    if !patch.unknown.is_empty() {
        let keys: Vec<&String> = patch.unknown.keys().collect();
        tracing::debug!("Ignoring unknown update fields: {:?}", keys);
    }
}
