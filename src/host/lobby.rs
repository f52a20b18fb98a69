use super::{round, HostError, HostResult, Outbound};
use crate::deck::Deck;
use crate::protocol::{LoadingKey, ServerMessage, StatePatch};
use crate::types::*;

pub(super) fn join(
    lobby: &mut Lobby,
    connection_id: ConnectionId,
    lobby_id: &str,
    name: String,
    rejoin_as: Option<PlayerId>,
    outbox: &mut Vec<Outbound>,
) -> HostResult<()> {
    if !lobby_id.trim().eq_ignore_ascii_case(&lobby.lobby_id) {
        return Err(HostError::UnknownLobby(lobby_id.to_string()));
    }

    if lobby.connected_count() >= lobby.game_settings.max_players {
        return Err(HostError::LobbyFull(lobby.game_settings.max_players));
    }

    // A returning player takes their old seat back, hand and score included
    let rejoining = rejoin_as.filter(|id| {
        lobby
            .players
            .get(id)
            .is_some_and(|p| p.status == PlayerStatus::Disconnected)
    });

    let id = match rejoining {
        Some(id) => {
            let seated = lobby.player_ids.contains(&id);
            if let Some(player) = lobby.players.get_mut(&id) {
                player.status = if seated {
                    PlayerStatus::Playing
                } else {
                    PlayerStatus::Staging
                };
                tracing::info!("Player {} ({}) rejoined lobby {}", player.name, id, lobby.lobby_id);
            }
            id
        }
        None => {
            if lobby.players.contains_key(&connection_id) {
                return Err(HostError::AlreadyJoined(connection_id));
            }
            tracing::info!("Player {} ({}) joined lobby {}", name, connection_id, lobby.lobby_id);
            lobby
                .players
                .insert(connection_id.clone(), Player::new(name));
            connection_id
        }
    };

    outbox.push(Outbound::to_player(&id, ServerMessage::JoinLobby { id: id.clone() }));
    outbox.push(Outbound::to_player(
        &id,
        ServerMessage::Update(StatePatch {
            remove_loading: Some(LoadingKey::JoiningLobby),
            ..Default::default()
        }),
    ));
    Ok(())
}

pub(super) fn disconnect(lobby: &mut Lobby, player_id: &PlayerId) -> HostResult<()> {
    let player = lobby
        .players
        .get_mut(player_id)
        .ok_or_else(|| HostError::UnknownPlayer(player_id.clone()))?;

    if player.status == PlayerStatus::Disconnected {
        return Ok(());
    }

    let was_czar = player.is_czar;
    player.status = PlayerStatus::Disconnected;
    tracing::info!("Player {} ({}) disconnected", player.name, player_id);

    if !lobby.game_state.is_round_active() {
        return Ok(());
    }

    if was_czar {
        tracing::warn!("Czar {} left mid-round, abandoning round {}", player_id, lobby.round);
        round::abandon_round(lobby);
        return Ok(());
    }

    round::remove_disconnected_players_card(lobby, player_id);

    if lobby.eligible_submitters().next().is_none() {
        tracing::warn!("No players left to answer, abandoning round {}", lobby.round);
        round::abandon_round(lobby);
        return Ok(());
    }

    match lobby.game_state {
        GamePhase::SubmissionOpen => round::reveal_if_complete(lobby),
        GamePhase::Reveal if lobby.submitted_cards.is_empty() => {
            tracing::warn!("Last submission withdrawn, abandoning round {}", lobby.round);
            round::abandon_round(lobby);
        }
        _ => {}
    }
    Ok(())
}

pub(super) fn update_settings(lobby: &mut Lobby, settings: GameSettings) -> HostResult<()> {
    if lobby.game_state != GamePhase::Pregame {
        return Err(HostError::WrongPhase {
            action: "UPDATE_SETTINGS",
            phase: lobby.game_state,
        });
    }
    if settings.winning_score == 0 {
        return Err(HostError::InvalidSettings(
            "winning score must be at least 1".to_string(),
        ));
    }
    if settings.max_players < MIN_PLAYERS {
        return Err(HostError::InvalidSettings(format!(
            "max players must be at least {}",
            MIN_PLAYERS
        )));
    }
    // Packs are fixed once the decks exist
    if lobby.round > 0 && settings.enabled_packs != lobby.game_settings.enabled_packs {
        return Err(HostError::InvalidSettings(
            "card packs cannot change after the first round".to_string(),
        ));
    }

    lobby.game_settings = settings;
    Ok(())
}

pub(super) fn start_game(
    lobby: &mut Lobby,
    black_deck: Deck<BlackCard>,
    white_deck: Deck<WhiteCard>,
) -> HostResult<()> {
    if lobby.game_state != GamePhase::Pregame {
        return Err(HostError::WrongPhase {
            action: "START_GAME",
            phase: lobby.game_state,
        });
    }

    let connected = lobby.connected_count();
    if connected < MIN_PLAYERS {
        return Err(HostError::NotEnoughPlayers {
            needed: MIN_PLAYERS,
            connected,
        });
    }

    // After an abandoned round the game resumes with the cards already in play
    if lobby.round == 0 {
        if black_deck.is_empty() || white_deck.is_empty() {
            return Err(HostError::EmptyDeck);
        }
        lobby.black_deck = black_deck;
        lobby.white_deck = white_deck;
    }

    tracing::info!(
        "Starting game in lobby {} with {} players",
        lobby.lobby_id,
        connected
    );
    Ok(())
}

/// Seat staged players. Only valid between rounds.
pub(super) fn add_players_from_staging(lobby: &mut Lobby) -> HostResult<()> {
    match lobby.game_state {
        GamePhase::Pregame | GamePhase::StagingComplete | GamePhase::RoundWinner => {}
        phase => {
            return Err(HostError::WrongPhase {
                action: "ADD_PLAYERS_FROM_STAGING",
                phase,
            })
        }
    }

    // Ids are ULIDs, so sorting them seats newcomers in join order
    let mut staged: Vec<PlayerId> = lobby
        .players
        .iter()
        .filter(|(id, p)| p.status == PlayerStatus::Staging && !lobby.player_ids.contains(id))
        .map(|(id, _)| id.clone())
        .collect();
    staged.sort_by_key(|id| id.clone());

    for id in &lobby.player_ids {
        if let Some(player) = lobby.players.get_mut(id) {
            if player.status == PlayerStatus::Staging {
                player.status = PlayerStatus::Playing;
            }
        }
    }

    for id in staged {
        if let Some(player) = lobby.players.get_mut(&id) {
            player.status = PlayerStatus::Playing;
            tracing::debug!("Seating {} ({})", player.name, id);
        }
        lobby.player_ids.push(id);
    }

    if lobby.game_state == GamePhase::Pregame {
        lobby.game_state = GamePhase::StagingComplete;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::super::*;
    use crate::protocol::ServerMessage;
    use crate::types::*;

    fn join_as(
        lobby: &Lobby,
        connection: &str,
        code: &str,
        rejoin_as: Option<&str>,
    ) -> HostResult<Transition> {
        reduce(
            lobby,
            HostAction::JoinLobby {
                connection_id: connection.to_string(),
                lobby_id: code.to_string(),
                name: "Someone".to_string(),
                rejoin_as: rejoin_as.map(|s| s.to_string()),
            },
            &mut rng(),
        )
    }

    fn empty_lobby() -> Lobby {
        Lobby::new(CODE.to_string(), GameSettings::default())
    }

    #[test]
    fn test_join_adds_staging_player_and_acks() {
        let transition = join_as(&empty_lobby(), "conn-1", "abcde", None).unwrap();

        let player = &transition.lobby.players["conn-1"];
        assert_eq!(player.status, PlayerStatus::Staging);
        assert_eq!(player.score, 0);
        assert!(transition.lobby.player_ids.is_empty());
        assert_eq!(
            transition.outbox[0],
            Outbound::to_player(
                &"conn-1".to_string(),
                ServerMessage::JoinLobby {
                    id: "conn-1".to_string()
                }
            )
        );
        assert!(matches!(
            &transition.outbox[1].message,
            ServerMessage::Update(patch) if patch.remove_loading.is_some()
        ));
    }

    #[test]
    fn test_join_wrong_code_rejected() {
        let result = join_as(&empty_lobby(), "conn-1", "ZZZZZ", None);
        assert_eq!(result.unwrap_err(), HostError::UnknownLobby("ZZZZZ".to_string()));
    }

    #[test]
    fn test_join_full_lobby_rejected() {
        let mut lobby = empty_lobby();
        lobby.game_settings.max_players = 3;
        for id in ["a", "b", "c"] {
            lobby = join_as(&lobby, id, CODE, None).unwrap().lobby;
        }

        let result = join_as(&lobby, "d", CODE, None);
        assert_eq!(result.unwrap_err(), HostError::LobbyFull(3));

        // A disconnected player frees their slot
        let lobby = reduce(
            &lobby,
            HostAction::PlayerDisconnected {
                player_id: "a".to_string(),
            },
            &mut rng(),
        )
        .unwrap()
        .lobby;
        assert!(join_as(&lobby, "d", CODE, None).is_ok());
    }

    #[test]
    fn test_double_join_rejected() {
        let lobby = join_as(&empty_lobby(), "a", CODE, None).unwrap().lobby;
        let result = join_as(&lobby, "a", CODE, None);
        assert_eq!(result.unwrap_err(), HostError::AlreadyJoined("a".to_string()));
    }

    #[test]
    fn test_start_game_needs_three_players() {
        let mut rng = rng();
        let mut lobby = empty_lobby();
        for id in ["a", "b"] {
            lobby = join(&lobby, id, &mut rng).lobby;
        }

        let (black_deck, white_deck) =
            crate::deck::build_decks(&crate::deck::builtin_packs(), &[], &mut rng);
        let result = reduce(
            &lobby,
            HostAction::StartGame {
                black_deck,
                white_deck,
            },
            &mut rng,
        );
        assert_eq!(
            result.unwrap_err(),
            HostError::NotEnoughPlayers {
                needed: 3,
                connected: 2
            }
        );
    }

    #[test]
    fn test_start_game_needs_white_cards() {
        let mut rng = rng();
        let mut lobby = empty_lobby();
        for id in ["a", "b", "c"] {
            lobby = join(&lobby, id, &mut rng).lobby;
        }

        let prompts_only = vec![crate::deck::CardPack {
            name: "prompts".to_string(),
            black: vec![crate::deck::PackBlackCard {
                text: "Why?".to_string(),
                pick: 1,
            }],
            white: Vec::new(),
        }];
        let (black_deck, white_deck) = crate::deck::build_decks(&prompts_only, &[], &mut rng);
        let result = reduce(
            &lobby,
            HostAction::StartGame {
                black_deck,
                white_deck,
            },
            &mut rng,
        );
        assert_eq!(result.unwrap_err(), HostError::EmptyDeck);
    }

    #[test]
    fn test_start_game_seats_everyone_and_deals() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c"], &mut rng);

        assert_eq!(lobby.game_state, GamePhase::SubmissionOpen);
        assert_eq!(lobby.round, 1);
        assert_eq!(lobby.player_ids, vec!["a", "b", "c"]);
        assert_eq!(czar_of(&lobby), "a");
        assert!(lobby.selected_black_card.is_some());
        for id in jesters(&lobby) {
            assert_eq!(lobby.players[&id].cards.len(), HAND_SIZE);
        }
        assert_invariants(&lobby);
    }

    #[test]
    fn test_mid_round_join_waits_in_staging() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c"], &mut rng);
        let lobby = join(&lobby, "d", &mut rng).lobby;

        assert_eq!(lobby.players["d"].status, PlayerStatus::Staging);
        assert!(!lobby.player_ids.contains(&"d".to_string()));
        assert!(!jesters(&lobby).contains(&"d".to_string()));

        // Submissions from staged players are refused
        let result = reduce(
            &lobby,
            HostAction::SubmitCards {
                player_id: "d".to_string(),
                cards: vec![0],
            },
            &mut rng,
        );
        assert_eq!(result.unwrap_err(), HostError::NotSeated("d".to_string()));
    }

    #[test]
    fn test_rejoin_restores_seat() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c", "d"], &mut rng);
        let hand = lobby.players["c"].cards.clone();

        let lobby = reduce(
            &lobby,
            HostAction::PlayerDisconnected {
                player_id: "c".to_string(),
            },
            &mut rng,
        )
        .unwrap()
        .lobby;
        assert_eq!(lobby.players["c"].status, PlayerStatus::Disconnected);

        let transition = join_as(&lobby, "new-conn", CODE, Some("c")).unwrap();
        let lobby = transition.lobby;
        assert_eq!(lobby.players["c"].status, PlayerStatus::Playing);
        assert_eq!(lobby.players["c"].cards, hand);
        assert!(!lobby.players.contains_key("new-conn"));
        assert_eq!(
            transition.outbox[0].message,
            ServerMessage::JoinLobby {
                id: "c".to_string()
            }
        );
        assert_invariants(&lobby);
    }

    #[test]
    fn test_rejoin_as_connected_player_is_fresh_join() {
        let lobby = join_as(&empty_lobby(), "a", CODE, None).unwrap().lobby;
        let lobby = join_as(&lobby, "b", CODE, Some("a")).unwrap().lobby;

        assert_eq!(lobby.players.len(), 2);
        assert!(lobby.players.contains_key("b"));
    }

    #[test]
    fn test_czar_disconnect_abandons_round() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c"], &mut rng);
        let czar = czar_of(&lobby);
        let lobby = submit(&lobby, &jesters(&lobby)[0], &mut rng).unwrap().lobby;

        let lobby = reduce(
            &lobby,
            HostAction::PlayerDisconnected { player_id: czar },
            &mut rng,
        )
        .unwrap()
        .lobby;

        assert_eq!(lobby.game_state, GamePhase::Pregame);
        assert!(lobby.submitted_cards.is_empty());
        assert!(lobby.players.values().all(|p| p.score == 0));
        assert_invariants(&lobby);
    }

    #[test]
    fn test_last_pending_player_leaving_triggers_reveal() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c", "d"], &mut rng);
        let jesters = jesters(&lobby);

        let lobby = submit(&lobby, &jesters[0], &mut rng).unwrap().lobby;
        let lobby = submit(&lobby, &jesters[1], &mut rng).unwrap().lobby;
        assert_eq!(lobby.game_state, GamePhase::SubmissionOpen);

        let lobby = reduce(
            &lobby,
            HostAction::PlayerDisconnected {
                player_id: jesters[2].clone(),
            },
            &mut rng,
        )
        .unwrap()
        .lobby;
        assert_eq!(lobby.game_state, GamePhase::Reveal);
        assert_invariants(&lobby);
    }

    #[test]
    fn test_disconnect_strips_submission() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c", "d"], &mut rng);
        let quitter = jesters(&lobby)[0].clone();
        let lobby = submit(&lobby, &quitter, &mut rng).unwrap().lobby;

        let lobby = reduce(
            &lobby,
            HostAction::PlayerDisconnected {
                player_id: quitter.clone(),
            },
            &mut rng,
        )
        .unwrap()
        .lobby;

        assert!(lobby.submitted_cards.iter().all(|c| c.player_id != quitter));
        assert!(!lobby.players[&quitter].has_submitted());
        assert_eq!(lobby.game_state, GamePhase::SubmissionOpen);
    }

    #[test]
    fn test_settings_only_in_pregame() {
        let mut rng = rng();
        let settings = GameSettings {
            winning_score: 3,
            ..GameSettings::default()
        };

        let lobby = reduce(
            &empty_lobby(),
            HostAction::UpdateSettings {
                settings: settings.clone(),
            },
            &mut rng,
        )
        .unwrap()
        .lobby;
        assert_eq!(lobby.game_settings.winning_score, 3);

        let lobby = started(&["a", "b", "c"], &mut rng);
        let result = reduce(&lobby, HostAction::UpdateSettings { settings }, &mut rng);
        assert!(matches!(result, Err(HostError::WrongPhase { .. })));
    }

    #[test]
    fn test_settings_validation() {
        let result = reduce(
            &empty_lobby(),
            HostAction::UpdateSettings {
                settings: GameSettings {
                    max_players: 2,
                    ..GameSettings::default()
                },
            },
            &mut rng(),
        );
        assert!(matches!(result, Err(HostError::InvalidSettings(_))));
    }

    #[test]
    fn test_staging_only_between_rounds() {
        let mut rng = rng();
        let lobby = started(&["a", "b", "c"], &mut rng);
        let result = reduce(&lobby, HostAction::AddPlayersFromStaging, &mut rng);
        assert!(matches!(result, Err(HostError::WrongPhase { .. })));

        let lobby = join(&empty_lobby(), "x", &mut rng).lobby;
        let lobby = reduce(&lobby, HostAction::AddPlayersFromStaging, &mut rng)
            .unwrap()
            .lobby;
        assert_eq!(lobby.game_state, GamePhase::StagingComplete);
        assert_eq!(lobby.players["x"].status, PlayerStatus::Playing);
        assert_eq!(lobby.player_ids, vec!["x"]);
    }
}
