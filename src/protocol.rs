use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages sent by player devices and the host display.
///
/// On the wire every message is `{"event": "<name>", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinLobby {
        #[serde(rename = "lobbyID")]
        lobby_id: LobbyId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Identity from an earlier session, used to rejoin after a disconnect
        #[serde(rename = "playerID", default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
    },
    SubmitCards {
        /// Indices into the player's hand
        cards: Vec<usize>,
    },
    SelectWinner {
        #[serde(rename = "cardOwnerId")]
        card_owner_id: PlayerId,
    },
    // Host display commands
    StartGame,
    UpdateSettings {
        settings: GameSettings,
    },
    CloseLobby,
}

impl ClientMessage {
    /// Loading indicator the sending device shows while this intent is in flight
    pub fn loading_key(&self) -> Option<LoadingKey> {
        match self {
            ClientMessage::JoinLobby { .. } => Some(LoadingKey::JoiningLobby),
            ClientMessage::SubmitCards { .. } => Some(LoadingKey::SubmittingCards),
            ClientMessage::SelectWinner { .. } => Some(LoadingKey::SelectingWinner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Join accepted, carries the assigned identity
    JoinLobby {
        id: PlayerId,
    },
    Update(StatePatch),
    /// A player's full hand, sent only to that player
    DealWhiteCards {
        cards: Vec<WhiteCard>,
        #[serde(rename = "selectCardCount")]
        select_card_count: usize,
    },
    ErrorDisconnect {},
    LobbyClosed {},
    /// Host display only: the full authoritative lobby
    LobbyState(Box<Lobby>),
    Error {
        code: String,
        msg: String,
    },
}

/// Local game phase on a player device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerPhase {
    EnterCode,
    PendingConnection,
    LobbyWait,
    PlayerSelect,
    SubmittingCards,
    PlayerWait,
    CzarWait,
    CzarSelect,
    SelectingWinner,
    RoundResult,
    GameOver,
    Error,
    LobbyClosed,
}

/// In-flight intents a device shows a loading indicator for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoadingKey {
    JoiningLobby,
    SubmittingCards,
    SelectingWinner,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    pub big: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
}

impl StatusMessage {
    pub fn new(big: impl Into<String>, small: impl Into<String>) -> Self {
        Self {
            big: big.into(),
            small: Some(small.into()),
        }
    }

    pub fn big_only(big: impl Into<String>) -> Self {
        Self {
            big: big.into(),
            small: None,
        }
    }
}

/// Shallow patch over a player's local state.
///
/// Absent fields leave the local value untouched. `remove_loading` is an
/// instruction, not a state field: it drops one entry from the loading set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state: Option<PlayerPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<StatusMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<WhiteCard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_card_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_loading: Option<LoadingKey>,
    /// Fields this build does not know about; logged and dropped on merge
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, serde_json::Value>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        self.game_state.is_none()
            && self.message.is_none()
            && self.cards.is_none()
            && self.select_card_count.is_none()
            && self.remove_loading.is_none()
            && self.unknown.is_empty()
    }

    /// Overlay `other` on top of this patch, later values winning
    pub fn merge(&mut self, other: StatePatch) {
        if other.game_state.is_some() {
            self.game_state = other.game_state;
        }
        if other.message.is_some() {
            self.message = other.message;
        }
        if other.cards.is_some() {
            self.cards = other.cards;
        }
        if other.select_card_count.is_some() {
            self.select_card_count = other.select_card_count;
        }
        if other.remove_loading.is_some() {
            self.remove_loading = other.remove_loading;
        }
        self.unknown.extend(other.unknown);
    }
}
