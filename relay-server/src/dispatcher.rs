//! Verb dispatch: turns one [`ClientMessage`] into the direct reply the
//! caller gets back, mutating room state and triggering broadcasts as a
//! side effect along the way.
//!
//! Grounded on the original socket dispatcher's per-verb async functions
//! (`LIST`, `OPEN`, `JOIN`, `MARK`, …), generalized from "forward to the
//! sole global `rooms` dict" into an `AppState`-scoped, server-authoritative
//! equivalent that also implements the distilled spec's additional verbs
//! (`UNMARK`, `SPECTATE`, `TIMELAPSE`) the original left unhandled.

use crate::config::AnyGenerator;
use crate::error::DispatchError;
use crate::state::AppState;
use bingo_core::board::create_board;
use bingo_core::room::Room;
use protocol::{
    ClientMessage, GeneratorSummary, RoomId, RoomSummary, ServerMessage, TeamId, UserId,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which (room, user) this connection last authenticated as. Cached locally
/// per-connection instead of scanning every user's transport handle to find
/// "the user behind this socket", the way the original `get_user_by_socket`
/// would have to.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub room_id: Option<RoomId>,
    pub user_id: Option<UserId>,
}

impl Identity {
    fn require(&self, room_id: &str) -> Result<UserId, DispatchError> {
        match (&self.room_id, &self.user_id) {
            (Some(r), Some(u)) if r == room_id => Ok(u.clone()),
            _ => Err(DispatchError::NoAuth),
        }
    }
}

const BOARD_KINDS: &[&str] = &["Non-Lockout", "Lockout", "Invasion", "Exploration", "GTTOS"];

pub async fn dispatch(
    state: &Arc<AppState>,
    identity: &mut Identity,
    outbound: &mpsc::Sender<ServerMessage>,
    message: ClientMessage,
) -> ServerMessage {
    let result = handle(state, identity, outbound, message).await;
    result.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "verb rejected");
        to_wire_error(err)
    })
}

fn to_wire_error(err: DispatchError) -> ServerMessage {
    match err {
        DispatchError::NotFound(_) => ServerMessage::NotFound,
        DispatchError::NoAuth => ServerMessage::NoAuth,
        DispatchError::NoTeam => ServerMessage::NoTeam,
        DispatchError::NoMark => ServerMessage::NoMark,
        DispatchError::Malformed(message) => ServerMessage::Error { message },
        DispatchError::Core(err) => ServerMessage::Error {
            message: err.to_string(),
        },
    }
}

async fn handle(
    state: &Arc<AppState>,
    identity: &mut Identity,
    outbound: &mpsc::Sender<ServerMessage>,
    message: ClientMessage,
) -> Result<ServerMessage, DispatchError> {
    match message {
        ClientMessage::List => list_rooms(state).await,
        ClientMessage::GetGames => get_games(state).await,
        ClientMessage::GetGenerators { game } => get_generators(state, &game).await,
        ClientMessage::GetBoards => Ok(ServerMessage::Boards {
            boards: BOARD_KINDS.iter().map(|s| s.to_string()).collect(),
        }),
        ClientMessage::Open {
            username,
            room_name,
            game,
            generator,
            board,
            seed,
        } => open_room(state, identity, outbound, username, room_name, game, generator, board, seed).await,
        ClientMessage::Join { room_id, username } => {
            join_room(state, identity, outbound, room_id, username).await
        }
        ClientMessage::Rejoin { room_id, user_id } => {
            rejoin_room(state, identity, outbound, room_id, user_id).await
        }
        ClientMessage::Exit { room_id, user_id } => exit_room(state, room_id, user_id).await,
        ClientMessage::CreateTeam {
            room_id,
            name,
            colour,
        } => create_team(state, identity, room_id, name, colour).await,
        ClientMessage::JoinTeam { room_id, team_id } => {
            join_team(state, identity, room_id, team_id).await
        }
        ClientMessage::LeaveTeam { room_id } => leave_team(state, identity, room_id).await,
        ClientMessage::Mark { room_id, goal_id } => mark(state, identity, room_id, goal_id).await,
        ClientMessage::Unmark { room_id, goal_id } => {
            unmark(state, identity, room_id, goal_id).await
        }
        ClientMessage::Spectate { room_id } => spectate(state, identity, room_id).await,
        ClientMessage::Timelapse { room_id } => timelapse(state, identity, room_id).await,
        // connection.rs drops this before dispatch ever sees it; kept here
        // only so the match stays exhaustive against new variants.
        ClientMessage::Unknown => Ok(ServerMessage::Error {
            message: "unknown verb".to_string(),
        }),
    }
}

async fn list_rooms(state: &Arc<AppState>) -> Result<ServerMessage, DispatchError> {
    let rooms = state.rooms.read().await;
    let mut list = std::collections::HashMap::new();
    for (room_id, room) in rooms.iter() {
        let room = room.lock().await;
        if room.users.is_empty() {
            continue;
        }
        list.insert(
            room_id.clone(),
            RoomSummary {
                name: room.name.clone(),
                game: room.game.clone(),
                board: room.board.board_kind().to_string(),
                variant: room.board.generator_name.clone(),
                count: room.users.len(),
            },
        );
    }
    Ok(ServerMessage::Listed { list })
}

async fn get_games(state: &Arc<AppState>) -> Result<ServerMessage, DispatchError> {
    let catalogs = state.catalogs.read().await;
    Ok(ServerMessage::Games {
        games: catalogs.keys().cloned().collect(),
    })
}

async fn get_generators(state: &Arc<AppState>, game: &str) -> Result<ServerMessage, DispatchError> {
    let catalogs = state.catalogs.read().await;
    let generators = catalogs
        .get(game)
        .ok_or_else(|| DispatchError::NotFound(format!("game {game:?}")))?;
    Ok(ServerMessage::Generators {
        game: game.to_string(),
        generators: generators
            .values()
            .map(|g| GeneratorSummary {
                name: g.name().to_string(),
                small: g.is_small(),
            })
            .collect(),
    })
}

#[allow(clippy::too_many_arguments)]
async fn open_room(
    state: &Arc<AppState>,
    identity: &mut Identity,
    outbound: &mpsc::Sender<ServerMessage>,
    username: String,
    room_name: String,
    game: String,
    generator_name: String,
    board_kind: String,
    seed: String,
) -> Result<ServerMessage, DispatchError> {
    let catalogs = state.catalogs.read().await;
    let generator: &AnyGenerator = catalogs
        .get(&game)
        .and_then(|g| g.get(&generator_name))
        .ok_or_else(|| DispatchError::NotFound(format!("generator {game}/{generator_name}")))?;
    let goal_source: &dyn bingo_core::generator::GoalSource = match generator {
        AnyGenerator::Sampled(g) => g,
        AnyGenerator::Fixed(g) => g,
    };
    let board = create_board(&board_kind, goal_source, &seed)?;
    drop(catalogs);

    let mut room = Room::new(room_name, board);
    let user_id = room.add_user(username);
    room.register_transport(&user_id, outbound);
    let room_id = room.id.clone();

    state.insert_room(room).await;
    identity.room_id = Some(room_id.clone());
    identity.user_id = Some(user_id.clone());

    Ok(ServerMessage::Opened { room_id, user_id })
}

async fn join_room(
    state: &Arc<AppState>,
    identity: &mut Identity,
    outbound: &mpsc::Sender<ServerMessage>,
    room_id: RoomId,
    username: String,
) -> Result<ServerMessage, DispatchError> {
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    let user_id = room.add_user(username);
    room.register_transport(&user_id, outbound);

    let reply = ServerMessage::Joined {
        user_id: user_id.clone(),
        room_name: room.name.clone(),
        board_min: room.board.minimum_view(),
        team_colours: room.team_colours(),
    };
    room.alert_player_changes().await;
    drop(room);

    identity.room_id = Some(room_id);
    identity.user_id = Some(user_id);
    Ok(reply)
}

async fn rejoin_room(
    state: &Arc<AppState>,
    identity: &mut Identity,
    outbound: &mpsc::Sender<ServerMessage>,
    room_id: RoomId,
    user_id: UserId,
) -> Result<ServerMessage, DispatchError> {
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    if !room.users.contains_key(&user_id) {
        return Err(DispatchError::NoAuth);
    }
    room.register_transport(&user_id, outbound);

    let team_id = room.users[&user_id].team_id.clone();
    let board_view = match &team_id {
        Some(team_id) => room.board.team_view(team_id),
        None => room.board.minimum_view(),
    };
    let reply = ServerMessage::Rejoined {
        room_name: room.name.clone(),
        board: board_view,
        team_colours: room.team_colours(),
    };
    room.alert_player_changes().await;
    drop(room);

    identity.room_id = Some(room_id);
    identity.user_id = Some(user_id);
    Ok(reply)
}

async fn exit_room(
    state: &Arc<AppState>,
    room_id: RoomId,
    user_id: UserId,
) -> Result<ServerMessage, DispatchError> {
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;
    if room.remove_user(&user_id).is_none() {
        return Err(DispatchError::NoAuth);
    }
    room.alert_player_changes().await;
    Ok(ServerMessage::PlayerUpdate {
        users: room.user_summaries(),
        teams: room.team_summaries(),
    })
}

async fn create_team(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
    name: String,
    colour: String,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    let team_id = room.create_team(name, colour);
    room.join_team(&user_id, &team_id);

    let reply = ServerMessage::TeamCreated {
        team_id: team_id.clone(),
        board: room.board.team_view(&team_id),
        team_colours: room.team_colours(),
    };
    room.alert_player_changes().await;
    Ok(reply)
}

async fn join_team(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
    team_id: TeamId,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    if !room.teams.contains_key(&team_id) {
        return Err(DispatchError::NotFound(format!("team {team_id}")));
    }
    room.join_team(&user_id, &team_id);

    let reply = ServerMessage::TeamJoined {
        board: room.board.team_view(&team_id),
        team_colours: room.team_colours(),
    };
    room.alert_player_changes().await;
    Ok(reply)
}

async fn leave_team(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    if !room.leave_team(&user_id) {
        return Err(DispatchError::NoTeam);
    }
    room.alert_player_changes().await;
    Ok(ServerMessage::TeamLeft)
}

async fn mark(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
    goal_id: usize,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    let team_id = room
        .users
        .get(&user_id)
        .and_then(|u| u.team_id.clone())
        .ok_or(DispatchError::NoTeam)?;

    let ok = room.board.mark(goal_id, &team_id);
    if ok {
        room.alert_board_changes().await;
        Ok(ServerMessage::Marked { goal_id })
    } else {
        Ok(ServerMessage::NoMark)
    }
}

async fn unmark(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
    goal_id: usize,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    let team_id = room
        .users
        .get(&user_id)
        .and_then(|u| u.team_id.clone())
        .ok_or(DispatchError::NoTeam)?;

    let ok = room.board.unmark(goal_id, &team_id);
    if ok {
        room.alert_board_changes().await;
        Ok(ServerMessage::Unmarked { goal_id })
    } else {
        Ok(ServerMessage::NoMark)
    }
}

async fn spectate(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let mut room = room_lock.lock().await;

    let level = room
        .cycle_spectate(&user_id)
        .ok_or(DispatchError::NoAuth)?;
    let board = match level {
        2 => room.board.full_view(),
        1 => room.board.spectator_view(),
        _ => room.board.minimum_view(),
    };
    room.alert_board_changes().await;
    Ok(ServerMessage::Spectating { level, board })
}

async fn timelapse(
    state: &Arc<AppState>,
    identity: &Identity,
    room_id: RoomId,
) -> Result<ServerMessage, DispatchError> {
    let user_id = identity.require(&room_id)?;
    let room_lock = state
        .get_room(&room_id)
        .await
        .ok_or_else(|| DispatchError::NotFound(format!("room {room_id}")))?;
    let room = room_lock.lock().await;

    let is_spectator = room
        .users
        .get(&user_id)
        .map(|u| u.spectate > 0)
        .unwrap_or(false);
    if !is_spectator {
        return Err(DispatchError::NoAuth);
    }

    Ok(ServerMessage::Timelapse {
        history: room.mark_history_view(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, CatalogRegistry};
    use bingo_core::{Catalog, Generator, GeneratorKind};
    use serde_json::json;
    use std::path::PathBuf;

    fn test_state() -> Arc<AppState> {
        let mut obj = serde_json::Map::new();
        for i in 0..25 {
            obj.insert(format!("g{i}"), json!({"name": format!("Goal {i}")}));
        }
        let catalog = Catalog::parse("demo", vec![], None, &obj).unwrap();
        let generator = Generator::new("gen", GeneratorKind::Uniform, catalog);

        let mut generators = std::collections::HashMap::new();
        generators.insert("gen".to_string(), AnyGenerator::Sampled(generator));
        let mut registry = CatalogRegistry::new();
        registry.insert("demo".to_string(), generators);

        let config = AppConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            catalog_dir: PathBuf::from("."),
            tls_cert: None,
            tls_key: None,
        };
        Arc::new(AppState::new(config, registry))
    }

    fn sink() -> mpsc::Sender<ServerMessage> {
        mpsc::channel(16).0
    }

    async fn open(state: &Arc<AppState>, identity: &mut Identity, username: &str) -> RoomId {
        let reply = dispatch(
            state,
            identity,
            &sink(),
            ClientMessage::Open {
                username: username.to_string(),
                room_name: "room".to_string(),
                game: "demo".to_string(),
                generator: "gen".to_string(),
                board: "Lockout".to_string(),
                seed: "seed".to_string(),
            },
        )
        .await;
        match reply {
            ServerMessage::Opened { room_id, .. } => room_id,
            other => panic!("expected Opened, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn open_then_mark_round_trip() {
        let state = test_state();
        let mut identity = Identity::default();
        let room_id = open(&state, &mut identity, "alice").await;

        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Mark {
                room_id: room_id.clone(),
                goal_id: 0,
            },
        )
        .await;
        // The room's sole "Red" team has no members yet, so marking fails
        // with NoTeam until the opener joins a team.
        assert!(matches!(reply, ServerMessage::NoTeam));

        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::CreateTeam {
                room_id: room_id.clone(),
                name: "Blue".to_string(),
                colour: "#0000FF".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::TeamCreated { .. }));

        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Mark {
                room_id: room_id.clone(),
                goal_id: 0,
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Marked { goal_id: 0 }));

        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Mark {
                room_id: room_id.clone(),
                goal_id: 0,
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::NoMark));
    }

    #[tokio::test]
    async fn unauthenticated_mark_is_rejected() {
        let state = test_state();
        let mut identity = Identity::default();
        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Mark {
                room_id: "nonexistent".to_string(),
                goal_id: 0,
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::NoAuth));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let state = test_state();
        let mut identity = Identity::default();
        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Join {
                room_id: "nonexistent".to_string(),
                username: "bob".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::NotFound));
    }

    #[tokio::test]
    async fn second_user_can_join_and_spectate() {
        let state = test_state();
        let mut opener = Identity::default();
        let room_id = open(&state, &mut opener, "alice").await;

        let mut joiner = Identity::default();
        let reply = dispatch(
            &state,
            &mut joiner,
            &sink(),
            ClientMessage::Join {
                room_id: room_id.clone(),
                username: "bob".to_string(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Joined { .. }));

        let reply = dispatch(
            &state,
            &mut joiner,
            &sink(),
            ClientMessage::Spectate {
                room_id: room_id.clone(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Spectating { level: 1, .. }));

        let reply = dispatch(
            &state,
            &mut joiner,
            &sink(),
            ClientMessage::Timelapse {
                room_id: room_id.clone(),
            },
        )
        .await;
        assert!(matches!(reply, ServerMessage::Timelapse { .. }));
    }

    #[tokio::test]
    async fn list_only_shows_nonempty_rooms() {
        let state = test_state();
        let mut identity = Identity::default();
        let room_id = open(&state, &mut identity, "alice").await;

        let reply = dispatch(&state, &mut identity, &sink(), ClientMessage::List).await;
        let ServerMessage::Listed { list } = reply else {
            panic!("expected Listed")
        };
        assert!(list.contains_key(&room_id));

        dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::Exit {
                room_id: room_id.clone(),
                user_id: identity.user_id.clone().unwrap(),
            },
        )
        .await;

        let reply = dispatch(&state, &mut identity, &sink(), ClientMessage::List).await;
        let ServerMessage::Listed { list } = reply else {
            panic!("expected Listed")
        };
        assert!(!list.contains_key(&room_id));
    }

    #[tokio::test]
    async fn get_generators_reports_the_registered_catalog() {
        let state = test_state();
        let mut identity = Identity::default();
        let reply = dispatch(
            &state,
            &mut identity,
            &sink(),
            ClientMessage::GetGenerators {
                game: "demo".to_string(),
            },
        )
        .await;
        let ServerMessage::Generators { generators, .. } = reply else {
            panic!("expected Generators")
        };
        assert_eq!(generators.len(), 1);
        assert_eq!(generators[0].name, "gen");
    }
}

