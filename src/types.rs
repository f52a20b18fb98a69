use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::deck::Deck;

/// Opaque ID types for type safety
pub type LobbyId = String;
pub type PlayerId = String;
pub type ConnectionId = String;

/// Cards dealt to every non-czar player at the start of a round
pub const HAND_SIZE: usize = 10;

/// Connected players needed before the host can start a game
pub const MIN_PLAYERS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    Pregame,
    StagingComplete,
    Dealing,
    SubmissionOpen,
    Reveal,
    RoundWinner,
    GameOver,
}

impl GamePhase {
    /// Phases in which a czar is seated and the round can be scored
    pub fn is_round_active(self) -> bool {
        matches!(
            self,
            GamePhase::Dealing | GamePhase::SubmissionOpen | GamePhase::Reveal
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Staging,
    Playing,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhiteCard {
    pub text: String,
    /// Index of the pack the card came from
    #[serde(default)]
    pub pack: usize,
    /// Position of the card inside its pack
    #[serde(default)]
    pub index: usize,
}

impl WhiteCard {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pack: 0,
            index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlackCard {
    pub text: String,
    /// How many white cards answer this prompt
    pub pick: usize,
    #[serde(default)]
    pub pack: usize,
    #[serde(default)]
    pub index: usize,
}

/// A white card played this round, tagged with the player who played it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmittedCard {
    pub text: String,
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub winning_score: u32,
    pub max_players: usize,
    #[serde(with = "duration_millis")]
    pub winner_screen_display_time: Duration,
    /// Closes submissions after this long; `None` waits for everyone
    #[serde(default, with = "optional_duration_millis")]
    pub submission_time_limit: Option<Duration>,
    /// Indices into the loaded card packs; empty means every pack
    #[serde(default)]
    pub enabled_packs: Vec<usize>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            winning_score: 7,
            max_players: 10,
            winner_screen_display_time: Duration::from_secs(5),
            submission_time_limit: None,
            enabled_packs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub score: u32,
    pub is_czar: bool,
    pub cards: Vec<WhiteCard>,
    /// Indices into `cards` played this round
    pub submitted_cards: Vec<usize>,
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            name,
            score: 0,
            is_czar: false,
            cards: Vec::new(),
            submitted_cards: Vec::new(),
            status: PlayerStatus::Staging,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status != PlayerStatus::Disconnected
    }

    pub fn has_submitted(&self) -> bool {
        !self.submitted_cards.is_empty()
    }
}

/// The authoritative per-game aggregate owned by the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    #[serde(rename = "lobbyID")]
    pub lobby_id: LobbyId,
    pub game_settings: GameSettings,
    pub game_state: GamePhase,
    /// Round counter; timer events carry it so late ones can be discarded
    pub round: u32,
    #[serde(rename = "playerIDs")]
    pub player_ids: Vec<PlayerId>,
    pub players: HashMap<PlayerId, Player>,
    pub selected_black_card: Option<BlackCard>,
    /// Current or most recent czar, the starting point for rotation
    pub czar: Option<PlayerId>,
    pub czar_selection: Option<PlayerId>,
    pub submitted_cards: Vec<SubmittedCard>,
    /// Final standings, filled in once the game is over
    pub standings: Vec<Standing>,
    #[serde(skip)]
    pub black_deck: Deck<BlackCard>,
    #[serde(skip)]
    pub white_deck: Deck<WhiteCard>,
}

impl Lobby {
    pub fn new(lobby_id: LobbyId, game_settings: GameSettings) -> Self {
        Self {
            lobby_id,
            game_settings,
            game_state: GamePhase::Pregame,
            round: 0,
            player_ids: Vec::new(),
            players: HashMap::new(),
            selected_black_card: None,
            czar: None,
            czar_selection: None,
            submitted_cards: Vec::new(),
            standings: Vec::new(),
            black_deck: Deck::default(),
            white_deck: Deck::default(),
        }
    }

    /// Players that currently hold a connection, in any status
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    /// The seated czar, if a round is running
    pub fn current_czar(&self) -> Option<&PlayerId> {
        self.player_ids
            .iter()
            .find(|id| self.players.get(*id).is_some_and(|p| p.is_czar))
    }

    /// Non-czar players still connected and seated in the round
    pub fn eligible_submitters(&self) -> impl Iterator<Item = &PlayerId> {
        self.player_ids.iter().filter(|id| {
            self.players
                .get(*id)
                .is_some_and(|p| p.status == PlayerStatus::Playing && !p.is_czar)
        })
    }

    pub fn pick(&self) -> usize {
        self.selected_black_card.as_ref().map_or(0, |c| c.pick)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
