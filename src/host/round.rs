use rand::Rng;
use std::collections::HashSet;

use super::{lobby, HostError, HostResult, Outbound};
use crate::protocol::{LoadingKey, ServerMessage, StatePatch};
use crate::types::*;

fn remove_loading(key: LoadingKey) -> ServerMessage {
    ServerMessage::Update(StatePatch {
        remove_loading: Some(key),
        ..Default::default()
    })
}

/// Seat staged players, clear the last round, rotate the czar, draw a prompt and deal
pub(super) fn start_next_round<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    rng: &mut R,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    lobby::add_players_from_staging(lobby)?;
    remove_submitted_cards(lobby)?;
    set_next_czar(lobby)?;
    select_black_card(lobby, rng)?;
    deal_white_cards(lobby, rng, outbox)
}

pub(super) fn set_next_czar(lobby: &mut Lobby) -> HostResult<()> {
    match lobby.game_state {
        GamePhase::StagingComplete | GamePhase::RoundWinner => {}
        phase => {
            return Err(HostError::WrongPhase {
                action: "SET_NEXT_CZAR",
                phase,
            })
        }
    }

    let is_playing = |id: &PlayerId| {
        lobby
            .players
            .get(id)
            .is_some_and(|p| p.status == PlayerStatus::Playing)
    };

    let seated = lobby.player_ids.iter().filter(|id| is_playing(id)).count();
    if seated < 2 {
        return Err(HostError::NotEnoughPlayers {
            needed: 2,
            connected: seated,
        });
    }

    let start = lobby
        .czar
        .as_ref()
        .and_then(|czar| lobby.player_ids.iter().position(|id| id == czar))
        .map_or(0, |i| i + 1);
    let count = lobby.player_ids.len();
    let next = (0..count)
        .map(|offset| &lobby.player_ids[(start + offset) % count])
        .find(|id| is_playing(id))
        .cloned()
        .ok_or(HostError::NotEnoughPlayers {
            needed: 2,
            connected: seated,
        })?;

    for (id, player) in lobby.players.iter_mut() {
        player.is_czar = *id == next;
    }

    lobby.round += 1;
    lobby.czar = Some(next);
    lobby.czar_selection = None;
    lobby.game_state = GamePhase::Dealing;
    tracing::debug!(
        "Round {} in lobby {}, czar is {:?}",
        lobby.round,
        lobby.lobby_id,
        lobby.czar
    );
    Ok(())
}

pub(super) fn select_black_card<R: Rng + ?Sized>(lobby: &mut Lobby, rng: &mut R) -> HostResult<()> {
    if lobby.game_state != GamePhase::Dealing {
        return Err(HostError::WrongPhase {
            action: "SELECT_BLACK_CARD",
            phase: lobby.game_state,
        });
    }

    if let Some(previous) = lobby.selected_black_card.take() {
        lobby.black_deck.discard(previous);
    }
    let card = lobby.black_deck.draw(rng).ok_or(HostError::EmptyDeck)?;
    lobby.selected_black_card = Some(card);
    Ok(())
}

/// Top every answering player's hand up to [`HAND_SIZE`] and open submissions
pub(super) fn deal_white_cards<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    rng: &mut R,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    if lobby.game_state != GamePhase::Dealing {
        return Err(HostError::WrongPhase {
            action: "DEAL_WHITE_CARDS",
            phase: lobby.game_state,
        });
    }
    if lobby.selected_black_card.is_none() {
        return Err(HostError::NoBlackCard);
    }

    let pick = lobby.pick();
    let recipients: Vec<PlayerId> = lobby.eligible_submitters().cloned().collect();

    for id in recipients {
        let Some(player) = lobby.players.get_mut(&id) else {
            continue;
        };
        while player.cards.len() < HAND_SIZE {
            match lobby.white_deck.draw(rng) {
                Some(card) => player.cards.push(card),
                None => {
                    tracing::warn!("White deck ran dry while dealing to {}", id);
                    break;
                }
            }
        }
        outbox.push(Outbound::to_player(
            &id,
            ServerMessage::DealWhiteCards {
                cards: player.cards.clone(),
                select_card_count: pick,
            },
        ));
    }

    lobby.game_state = GamePhase::SubmissionOpen;
    Ok(())
}

pub(super) fn submit_cards(
    lobby: &mut Lobby,
    player_id: &PlayerId,
    cards: Vec<usize>,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    if lobby.game_state != GamePhase::SubmissionOpen {
        return Err(HostError::WrongPhase {
            action: "SUBMIT_CARDS",
            phase: lobby.game_state,
        });
    }

    let pick = lobby.pick();
    let seated = lobby.player_ids.contains(player_id);
    let player = lobby
        .players
        .get_mut(player_id)
        .ok_or_else(|| HostError::UnknownPlayer(player_id.clone()))?;

    if !seated || player.status != PlayerStatus::Playing {
        return Err(HostError::NotSeated(player_id.clone()));
    }
    if player.is_czar {
        return Err(HostError::CzarCannotSubmit);
    }
    if player.has_submitted() {
        return Err(HostError::AlreadySubmitted(player_id.clone()));
    }
    if cards.len() != pick {
        return Err(HostError::WrongCardCount {
            expected: pick,
            got: cards.len(),
        });
    }

    let mut seen = HashSet::new();
    for &index in &cards {
        if index >= player.cards.len() || !seen.insert(index) {
            return Err(HostError::InvalidCardIndex(index));
        }
    }

    // Order matters for multi-blank prompts
    for &index in &cards {
        lobby.submitted_cards.push(SubmittedCard {
            text: player.cards[index].text.clone(),
            player_id: player_id.clone(),
        });
    }
    player.submitted_cards = cards;

    outbox.push(Outbound::to_player(
        player_id,
        remove_loading(LoadingKey::SubmittingCards),
    ));
    reveal_if_complete(lobby);
    Ok(())
}

/// Move to the reveal once every answering player has submitted
pub(super) fn reveal_if_complete(lobby: &mut Lobby) {
    if lobby.game_state != GamePhase::SubmissionOpen || lobby.submitted_cards.is_empty() {
        return;
    }

    let all_in = lobby
        .eligible_submitters()
        .all(|id| lobby.players.get(id).is_some_and(|p| p.has_submitted()));
    if all_in {
        tracing::info!("All cards are in for round {}", lobby.round);
        lobby.game_state = GamePhase::Reveal;
    }
}

pub(super) fn close_submissions(lobby: &mut Lobby, round: u32) -> HostResult<()> {
    if round != lobby.round || lobby.game_state != GamePhase::SubmissionOpen {
        return Err(HostError::StaleRound {
            current: lobby.round,
            got: round,
        });
    }

    if lobby.submitted_cards.is_empty() {
        tracing::warn!("Time ran out with no submissions in round {}", round);
        abandon_round(lobby);
    } else {
        tracing::info!("Time ran out, revealing round {}", round);
        lobby.game_state = GamePhase::Reveal;
    }
    Ok(())
}

pub(super) fn select_winner(
    lobby: &mut Lobby,
    selector: &PlayerId,
    card_owner_id: &PlayerId,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    if lobby.game_state != GamePhase::Reveal {
        return Err(HostError::WrongPhase {
            action: "SELECT_WINNER",
            phase: lobby.game_state,
        });
    }
    if lobby.current_czar() != Some(selector) {
        return Err(HostError::NotCzar(selector.clone()));
    }

    let played = lobby
        .submitted_cards
        .iter()
        .any(|c| &c.player_id == card_owner_id);
    let owner = lobby
        .players
        .get_mut(card_owner_id)
        .filter(|p| played && p.has_submitted())
        .ok_or_else(|| HostError::NoSubmission(card_owner_id.clone()))?;

    owner.score += 1;
    tracing::info!(
        "{} wins round {} with {} points",
        owner.name,
        lobby.round,
        owner.score
    );

    for player in lobby.players.values_mut() {
        player.is_czar = false;
    }
    lobby.czar_selection = Some(card_owner_id.clone());
    lobby.game_state = GamePhase::RoundWinner;

    outbox.push(Outbound::to_player(
        selector,
        remove_loading(LoadingKey::SelectingWinner),
    ));
    Ok(())
}

/// Discard every played card from its owner's hand
pub(super) fn remove_submitted_cards(lobby: &mut Lobby) -> HostResult<()> {
    if lobby.game_state.is_round_active() {
        return Err(HostError::WrongPhase {
            action: "REMOVE_SUBMITTED_CARDS_FROM_PLAYER",
            phase: lobby.game_state,
        });
    }

    for player in lobby.players.values_mut() {
        let mut played = std::mem::take(&mut player.submitted_cards);
        // Highest index first so earlier removals don't shift later ones
        played.sort_unstable_by(|a, b| b.cmp(a));
        played.dedup();
        for index in played {
            if index < player.cards.len() {
                lobby.white_deck.discard(player.cards.remove(index));
            }
        }
    }
    lobby.submitted_cards.clear();
    Ok(())
}

pub(super) fn remove_disconnected_players_card(lobby: &mut Lobby, player_id: &PlayerId) {
    lobby.submitted_cards.retain(|c| &c.player_id != player_id);
    if let Some(player) = lobby.players.get_mut(player_id) {
        player.submitted_cards.clear();
    }
}

pub(super) fn finish_round<R: Rng + ?Sized>(
    lobby: &mut Lobby,
    round: u32,
    rng: &mut R,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    if round != lobby.round || lobby.game_state != GamePhase::RoundWinner {
        return Err(HostError::StaleRound {
            current: lobby.round,
            got: round,
        });
    }

    if has_winner(lobby) {
        return game_over(lobby);
    }

    let mut attempt = lobby.clone();
    let mut queued = Vec::new();
    match start_next_round(&mut attempt, rng, &mut queued) {
        Ok(()) => {
            *lobby = attempt;
            outbox.extend(queued);
            Ok(())
        }
        Err(HostError::NotEnoughPlayers { connected, .. }) => {
            tracing::warn!(
                "Only {} players left in lobby {}, returning to pregame",
                connected,
                lobby.lobby_id
            );
            remove_submitted_cards(lobby)?;
            abandon_round(lobby);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn has_winner(lobby: &Lobby) -> bool {
    let target = lobby.game_settings.winning_score;
    lobby.players.values().any(|p| p.score >= target)
}

pub(super) fn game_over(lobby: &mut Lobby) -> HostResult<()> {
    if lobby.game_state == GamePhase::GameOver {
        return Err(HostError::WrongPhase {
            action: "GAME_OVER",
            phase: lobby.game_state,
        });
    }
    if !has_winner(lobby) {
        return Err(HostError::NoWinnerYet);
    }

    let mut standings: Vec<Standing> = lobby
        .player_ids
        .iter()
        .filter_map(|id| {
            lobby.players.get(id).map(|p| Standing {
                player_id: id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
        })
        .collect();
    // Stable, so ties keep seating order
    standings.sort_by(|a, b| b.score.cmp(&a.score));

    if let Some(winner) = standings.first() {
        tracing::info!(
            "Game over in lobby {}: {} wins with {}",
            lobby.lobby_id,
            winner.name,
            winner.score
        );
    }

    for player in lobby.players.values_mut() {
        player.is_czar = false;
    }
    lobby.standings = standings;
    lobby.game_state = GamePhase::GameOver;
    Ok(())
}

/// Drop the running round without awarding points and wait for the host again
pub(super) fn abandon_round(lobby: &mut Lobby) {
    for player in lobby.players.values_mut() {
        player.is_czar = false;
        player.submitted_cards.clear();
    }
    lobby.submitted_cards.clear();
    if let Some(card) = lobby.selected_black_card.take() {
        lobby.black_deck.discard(card);
    }
    lobby.czar_selection = None;
    lobby.game_state = GamePhase::Pregame;
}
