//! Authoritative host reducer.
//!
//! Every transition is `(&Lobby, HostAction) -> Result<Transition>`: the lobby
//! is cloned, the action is applied to the clone, and the clone is only
//! returned when the whole action succeeded. A rejected action therefore
//! never leaves a half-applied lobby behind. Randomness comes in through the
//! `rng` argument and pre-shuffled decks, so fixed seeds give fixed games.

mod lobby;
mod round;

use rand::Rng;

use crate::deck::Deck;
use crate::protocol::ServerMessage;
use crate::types::*;

pub type HostResult<T> = Result<T, HostError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("{action} is not allowed during {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: GamePhase,
    },

    #[error("No lobby with code {0}")]
    UnknownLobby(String),

    #[error("Lobby is full ({0} players)")]
    LobbyFull(usize),

    #[error("Player {0} already joined")]
    AlreadyJoined(PlayerId),

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("Player {0} is not seated in the round")]
    NotSeated(PlayerId),

    #[error("The czar cannot submit cards")]
    CzarCannotSubmit,

    #[error("Player {0} already submitted this round")]
    AlreadySubmitted(PlayerId),

    #[error("Expected {expected} cards, got {got}")]
    WrongCardCount { expected: usize, got: usize },

    #[error("Invalid card index {0}")]
    InvalidCardIndex(usize),

    #[error("Player {0} is not the czar")]
    NotCzar(PlayerId),

    #[error("Player {0} has no submission this round")]
    NoSubmission(PlayerId),

    #[error("Need {needed} connected players, have {connected}")]
    NotEnoughPlayers { needed: usize, connected: usize },

    #[error("No black cards left to draw")]
    EmptyDeck,

    #[error("No black card has been selected")]
    NoBlackCard,

    #[error("Event for round {got} arrived during round {current}")]
    StaleRound { current: u32, got: u32 },

    #[error("Nobody has reached the winning score")]
    NoWinnerYet,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl HostError {
    /// Errors reported back to the requesting player instead of being dropped
    pub fn is_capacity(&self) -> bool {
        matches!(self, HostError::UnknownLobby(_) | HostError::LobbyFull(_))
    }
}

#[derive(Debug, Clone)]
pub enum HostAction {
    /// A connection asked to join; `rejoin_as` names an earlier identity
    JoinLobby {
        connection_id: ConnectionId,
        lobby_id: LobbyId,
        name: String,
        rejoin_as: Option<PlayerId>,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    UpdateSettings {
        settings: GameSettings,
    },
    /// Decks are built and shuffled by the caller from the enabled packs
    StartGame {
        black_deck: Deck<BlackCard>,
        white_deck: Deck<WhiteCard>,
    },
    /// Staging, cleanup, czar, black card and dealing as one transition
    StartNextRound,
    AddPlayersFromStaging,
    SetNextCzar,
    SelectBlackCard,
    DealWhiteCards,
    SubmitCards {
        player_id: PlayerId,
        cards: Vec<usize>,
    },
    /// Submission time limit expired
    CloseSubmissions {
        round: u32,
    },
    SelectWinner {
        player_id: PlayerId,
        card_owner_id: PlayerId,
    },
    RemoveSubmittedCardsFromPlayer,
    RemoveDisconnectedPlayersCard {
        player_id: PlayerId,
    },
    /// Winner screen elapsed
    FinishRound {
        round: u32,
    },
    GameOver,
    CloseLobby,
}

impl HostAction {
    pub fn name(&self) -> &'static str {
        match self {
            HostAction::JoinLobby { .. } => "JOIN_LOBBY",
            HostAction::PlayerDisconnected { .. } => "PLAYER_DISCONNECTED",
            HostAction::UpdateSettings { .. } => "UPDATE_SETTINGS",
            HostAction::StartGame { .. } => "START_GAME",
            HostAction::StartNextRound => "START_NEXT_ROUND",
            HostAction::AddPlayersFromStaging => "ADD_PLAYERS_FROM_STAGING",
            HostAction::SetNextCzar => "SET_NEXT_CZAR",
            HostAction::SelectBlackCard => "SELECT_BLACK_CARD",
            HostAction::DealWhiteCards => "DEAL_WHITE_CARDS",
            HostAction::SubmitCards { .. } => "SUBMIT_CARDS",
            HostAction::CloseSubmissions { .. } => "CLOSE_SUBMISSIONS",
            HostAction::SelectWinner { .. } => "SELECT_WINNER",
            HostAction::RemoveSubmittedCardsFromPlayer => "REMOVE_SUBMITTED_CARDS_FROM_PLAYER",
            HostAction::RemoveDisconnectedPlayersCard { .. } => "REMOVE_DISCONNECTED_PLAYERS_CARD",
            HostAction::FinishRound { .. } => "FINISH_ROUND",
            HostAction::GameOver => "GAME_OVER",
            HostAction::CloseLobby => "CLOSE_LOBBY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Player(PlayerId),
    /// Every connected player
    Everyone,
}

/// A message the reducer wants delivered in addition to the state sync
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to_player(player_id: &PlayerId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Player(player_id.clone()),
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub lobby: Lobby,
    pub outbox: Vec<Outbound>,
}

/// Apply one action to the lobby
pub fn reduce<R: Rng + ?Sized>(
    lobby: &Lobby,
    action: HostAction,
    rng: &mut R,
) -> HostResult<Transition> {
    let mut next = lobby.clone();
    let mut outbox = Vec::new();
    apply(&mut next, action, rng, &mut outbox)?;
    Ok(Transition {
        lobby: next,
        outbox,
    })
}

fn apply<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    action: HostAction,
    rng: &mut R,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    match action {
        HostAction::JoinLobby {
            connection_id,
            lobby_id,
            name,
            rejoin_as,
        } => lobby::join(lobby, connection_id, &lobby_id, name, rejoin_as, outbox),
        HostAction::PlayerDisconnected { player_id } => lobby::disconnect(lobby, &player_id),
        HostAction::UpdateSettings { settings } => lobby::update_settings(lobby, settings),
        HostAction::StartGame {
            black_deck,
            white_deck,
        } => {
            lobby::start_game(lobby, black_deck, white_deck)?;
            round::start_next_round(lobby, rng, outbox)
        }
        HostAction::StartNextRound => round::start_next_round(lobby, rng, outbox),
        HostAction::AddPlayersFromStaging => lobby::add_players_from_staging(lobby),
        HostAction::SetNextCzar => round::set_next_czar(lobby),
        HostAction::SelectBlackCard => round::select_black_card(lobby, rng),
        HostAction::DealWhiteCards => round::deal_white_cards(lobby, rng, outbox),
        HostAction::SubmitCards { player_id, cards } => {
            round::submit_cards(lobby, &player_id, cards, outbox)
        }
        HostAction::CloseSubmissions { round } => round::close_submissions(lobby, round),
        HostAction::SelectWinner {
            player_id,
            card_owner_id,
        } => round::select_winner(lobby, &player_id, &card_owner_id, outbox),
        HostAction::RemoveSubmittedCardsFromPlayer => round::remove_submitted_cards(lobby),
        HostAction::RemoveDisconnectedPlayersCard { player_id } => {
            round::remove_disconnected_players_card(lobby, &player_id);
            Ok(())
        }
        HostAction::FinishRound { round } => round::finish_round(lobby, round, rng, outbox),
        HostAction::GameOver => round::game_over(lobby),
        HostAction::CloseLobby => {
            outbox.push(Outbound {
                to: Recipient::Everyone,
                message: ServerMessage::LobbyClosed {},
            });
            Ok(())
        }
    }
}
