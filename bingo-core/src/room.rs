//! The Room aggregate: users, teams, the board, and fan-out to connections.
//!
//! Grounded on the original `Room`/`User`/`Team` classes plus the verb
//! handlers in the socket dispatcher, which is where `alert_board_changes`
//! and `alert_player_changes` are implicitly defined by their call sites
//! (`await room.alert_board_changes()` after every `mark`/`unmark`,
//! `await room.alert_player_changes()` after every roster change). A Room
//! owns exactly one board for its whole lifetime; there is no re-roll.

use crate::board::Board;
use protocol::{
    BoardView, MarkEventView, RoomId, ServerMessage, TeamId, TeamSummary, UserId, UserSummary,
};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Spectate levels a user may hold. `SPECTATE` cycles a user through these:
/// 0 → 1 (team-blind spectator view) → 2 (omniscient full view) → 2.
pub const SPECTATE_NONE: u8 = 0;
pub const SPECTATE_OBSERVER: u8 = 1;
pub const SPECTATE_FULL: u8 = 2;

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub connected: bool,
    pub team_id: Option<TeamId>,
    pub spectate: u8,
}

#[derive(Debug, Clone)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub colour: String,
    pub members: Vec<UserId>,
}

/// One `(team, goal, marked)` event as shown to a `TIMELAPSE` requester.
#[derive(Debug, Clone)]
pub struct MarkEvent {
    pub team_id: TeamId,
    pub goal_id: usize,
    pub marked: bool,
}

/// A single game room: one board, a user roster, and a set of teams.
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub game: String,
    pub board: Board,
    pub teams: HashMap<TeamId, Team>,
    pub users: HashMap<UserId, User>,
    pub created: u64,
    pub touched: u64,
    /// Non-owning handles to each connected user's outbound channel.
    /// Upgraded on every fan-out; a dead entry just means that user is
    /// currently disconnected, not that it should be evicted — matches
    /// the source nulling `user.socket` rather than dropping the user.
    transports: HashMap<UserId, mpsc::WeakSender<ServerMessage>>,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Room {
    /// Creates a room with its board already generated and a single default
    /// "Red" team, exactly as the source seeds every new room.
    pub fn new(name: String, board: Board) -> Self {
        let game = board.game.clone();
        let mut teams = HashMap::new();
        let default_team = Team {
            id: Uuid::new_v4().to_string(),
            name: "Red".to_string(),
            colour: "#FF0000".to_string(),
            members: Vec::new(),
        };
        teams.insert(default_team.id.clone(), default_team);

        let now = now_unix();
        Room {
            id: Uuid::new_v4().to_string(),
            name,
            game,
            board,
            teams,
            users: HashMap::new(),
            created: now,
            touched: now,
            transports: HashMap::new(),
        }
    }

    /// Binds a connected user's outbound channel, replacing any prior one
    /// (the `REJOIN` case — a new socket takes over an existing user id).
    pub fn register_transport(&mut self, user_id: &str, sender: &mpsc::Sender<ServerMessage>) {
        self.transports
            .insert(user_id.to_string(), sender.downgrade());
        if let Some(user) = self.users.get_mut(user_id) {
            user.connected = true;
        }
    }

    /// Marks a user disconnected without removing them from the room, so a
    /// later `REJOIN` can restore their team and spectate state.
    pub fn clear_transport(&mut self, user_id: &str) {
        self.transports.remove(user_id);
        if let Some(user) = self.users.get_mut(user_id) {
            user.connected = false;
        }
    }

    fn view_for(&self, user: &User) -> BoardView {
        match user.spectate {
            SPECTATE_FULL => self.board.full_view(),
            SPECTATE_OBSERVER => self.board.spectator_view(),
            _ => match &user.team_id {
                Some(team_id) => self.board.team_view(team_id),
                None => self.board.minimum_view(),
            },
        }
    }

    /// Fans out a personalized `BOARD_UPDATE` to every connected user,
    /// shaped by that user's team/spectate status.
    ///
    /// Sends are non-blocking: a peer whose channel is full is treated as
    /// unhealthy and its transport is cleared rather than stalling this
    /// room's mutex on a slow or wedged connection.
    pub async fn alert_board_changes(&mut self) {
        let colours = self.team_colours();
        let mut unhealthy = Vec::new();
        for (user_id, weak) in &self.transports {
            let Some(sender) = weak.upgrade() else { continue };
            let Some(user) = self.users.get(user_id) else { continue };
            let message = ServerMessage::BoardUpdate {
                board: self.view_for(user),
                team_colours: colours.clone(),
            };
            if sender.try_send(message).is_err() {
                unhealthy.push(user_id.clone());
            }
        }
        for user_id in unhealthy {
            self.clear_transport(&user_id);
        }
    }

    /// Fans out the current roster/team list to every connected user.
    pub async fn alert_player_changes(&mut self) {
        let message = ServerMessage::PlayerUpdate {
            users: self.user_summaries(),
            teams: self.team_summaries(),
        };
        let mut unhealthy = Vec::new();
        for (user_id, weak) in &self.transports {
            let Some(sender) = weak.upgrade() else { continue };
            if sender.try_send(message.clone()).is_err() {
                unhealthy.push(user_id.clone());
            }
        }
        for user_id in unhealthy {
            self.clear_transport(&user_id);
        }
    }

    pub fn touch(&mut self) {
        self.touched = now_unix();
    }

    pub fn add_user(&mut self, username: String) -> UserId {
        let id = Uuid::new_v4().to_string();
        self.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                name: username,
                connected: true,
                team_id: None,
                spectate: SPECTATE_NONE,
            },
        );
        self.touch();
        id
    }

    pub fn remove_user(&mut self, user_id: &str) -> Option<User> {
        let user = self.users.remove(user_id)?;
        if let Some(team_id) = &user.team_id {
            if let Some(team) = self.teams.get_mut(team_id) {
                team.members.retain(|m| m != user_id);
            }
        }
        self.touch();
        Some(user)
    }

    pub fn create_team(&mut self, name: String, colour: String) -> TeamId {
        let id = Uuid::new_v4().to_string();
        self.teams.insert(
            id.clone(),
            Team {
                id: id.clone(),
                name,
                colour,
                members: Vec::new(),
            },
        );
        id
    }

    /// Moves `user_id` into `team_id`, leaving whatever team it was in and
    /// clearing any spectate level (joining a team always returns a user to
    /// play). Returns `false` if either id is unknown.
    pub fn join_team(&mut self, user_id: &str, team_id: &str) -> bool {
        if !self.teams.contains_key(team_id) || !self.users.contains_key(user_id) {
            return false;
        }
        self.leave_current_team(user_id);
        self.teams
            .get_mut(team_id)
            .unwrap()
            .members
            .push(user_id.to_string());
        let user = self.users.get_mut(user_id).unwrap();
        user.team_id = Some(team_id.to_string());
        user.spectate = SPECTATE_NONE;
        self.touch();
        true
    }

    /// Removes `user_id` from whatever team it currently holds, if any.
    /// Returns `false` if the user had no team.
    pub fn leave_team(&mut self, user_id: &str) -> bool {
        let had_team = self.leave_current_team(user_id);
        if had_team {
            self.touch();
        }
        had_team
    }

    fn leave_current_team(&mut self, user_id: &str) -> bool {
        let Some(user) = self.users.get_mut(user_id) else {
            return false;
        };
        let Some(old_team) = user.team_id.take() else {
            return false;
        };
        if let Some(team) = self.teams.get_mut(&old_team) {
            team.members.retain(|m| m != user_id);
        }
        true
    }

    /// Advances `user_id`'s spectate level (0→1→2→2) and returns the new
    /// level, or `None` if the user is unknown.
    pub fn cycle_spectate(&mut self, user_id: &str) -> Option<u8> {
        let user = self.users.get_mut(user_id)?;
        user.spectate = (user.spectate + 1).min(SPECTATE_FULL);
        Some(user.spectate)
    }

    pub fn user_team_colour(&self, team_id: &str) -> Option<&str> {
        self.teams.get(team_id).map(|t| t.colour.as_str())
    }

    pub fn team_colours(&self) -> HashMap<TeamId, String> {
        self.teams
            .iter()
            .map(|(id, team)| (id.clone(), team.colour.clone()))
            .collect()
    }

    pub fn user_summaries(&self) -> Vec<UserSummary> {
        self.users
            .values()
            .map(|u| UserSummary {
                user_id: u.id.clone(),
                name: u.name.clone(),
                team_id: u.team_id.clone(),
                connected: u.connected,
                spectate: u.spectate,
            })
            .collect()
    }

    pub fn team_summaries(&self) -> Vec<TeamSummary> {
        self.teams
            .values()
            .map(|t| TeamSummary {
                team_id: t.id.clone(),
                name: t.name.clone(),
                colour: t.colour.clone(),
                members: t.members.clone(),
            })
            .collect()
    }

    /// Board mark history projected for a `TIMELAPSE` reply.
    pub fn mark_history_view(&self) -> Vec<MarkEventView> {
        self.board
            .mark_history
            .iter()
            .map(|e| MarkEventView {
                team_id: e.team_id.clone(),
                goal_id: e.index,
                marked: e.marked,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::create_board;
    use crate::catalog::Catalog;
    use crate::generator::{Generator, GeneratorKind};
    use serde_json::json;

    fn test_room() -> Room {
        let mut obj = serde_json::Map::new();
        for i in 0..25 {
            obj.insert(format!("g{i}"), json!({"name": format!("Goal {i}")}));
        }
        let catalog = Catalog::parse("game", vec![], None, &obj).unwrap();
        let generator = Generator::new("gen", GeneratorKind::Uniform, catalog);
        let board = create_board("Non-Lockout", &generator, "seed").unwrap();
        Room::new("my room".to_string(), board)
    }

    #[test]
    fn new_room_seeds_one_red_team() {
        let room = test_room();
        assert_eq!(room.teams.len(), 1);
        let team = room.teams.values().next().unwrap();
        assert_eq!(team.name, "Red");
    }

    #[test]
    fn joining_a_team_moves_user_out_of_previous_one() {
        let mut room = test_room();
        let user_id = room.add_user("alice".to_string());
        let team_a = room.create_team("Blue".to_string(), "#0000FF".to_string());
        let team_b = room.create_team("Green".to_string(), "#00FF00".to_string());

        assert!(room.join_team(&user_id, &team_a));
        assert_eq!(room.teams[&team_a].members, vec![user_id.clone()]);

        assert!(room.join_team(&user_id, &team_b));
        assert!(room.teams[&team_a].members.is_empty());
        assert_eq!(room.teams[&team_b].members, vec![user_id]);
    }

    #[test]
    fn removing_a_user_clears_them_from_their_team() {
        let mut room = test_room();
        let user_id = room.add_user("bob".to_string());
        let team_id = room.create_team("Blue".to_string(), "#0000FF".to_string());
        room.join_team(&user_id, &team_id);

        room.remove_user(&user_id);
        assert!(room.teams[&team_id].members.is_empty());
    }
}
