//! The wire protocol between client and relay server.
//!
//! Every inbound message carries a `verb` field that externally tags
//! [`ClientMessage`]; every outbound message is tagged the same way through
//! [`ServerMessage`]. This mirrors the original relay's message-type byte,
//! but the transport is JSON text frames instead of postcard-encoded binary
//! frames, since the server here interprets every message instead of simply
//! routing bytes between a host and its clients.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque room identifier, issued by the server on `OPEN`.
pub type RoomId = String;
/// Opaque user identifier, issued by the server on `OPEN`/`JOIN`.
pub type UserId = String;
/// Opaque team identifier, issued by the server on `CREATE_TEAM`.
pub type TeamId = String;

/// A message sent by a client to the relay server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "verb")]
pub enum ClientMessage {
    #[serde(rename = "LIST")]
    List,
    #[serde(rename = "GET_GAMES")]
    GetGames,
    #[serde(rename = "GET_GENERATORS")]
    GetGenerators { game: String },
    #[serde(rename = "GET_BOARDS")]
    GetBoards,
    #[serde(rename = "OPEN")]
    Open {
        username: String,
        #[serde(rename = "roomName")]
        room_name: String,
        game: String,
        generator: String,
        board: String,
        seed: String,
    },
    #[serde(rename = "JOIN")]
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        username: String,
    },
    #[serde(rename = "REJOIN")]
    Rejoin {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    #[serde(rename = "EXIT")]
    Exit {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    #[serde(rename = "CREATE_TEAM")]
    CreateTeam {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        name: String,
        colour: String,
    },
    #[serde(rename = "JOIN_TEAM")]
    JoinTeam {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "teamId")]
        team_id: TeamId,
    },
    #[serde(rename = "LEAVE_TEAM")]
    LeaveTeam {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    #[serde(rename = "MARK")]
    Mark {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "goalId")]
        goal_id: usize,
    },
    #[serde(rename = "UNMARK")]
    Unmark {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "goalId")]
        goal_id: usize,
    },
    #[serde(rename = "SPECTATE")]
    Spectate {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    #[serde(rename = "TIMELAPSE")]
    Timelapse {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    /// Catches any `verb` not listed above, so an unrecognized verb still
    /// deserializes successfully instead of failing the whole message the
    /// way truly malformed JSON does. The dispatcher drops these silently.
    #[serde(other)]
    Unknown,
}

/// A message sent by the relay server to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verb")]
pub enum ServerMessage {
    #[serde(rename = "LISTED")]
    Listed { list: HashMap<RoomId, RoomSummary> },
    #[serde(rename = "GAMES")]
    Games { games: Vec<String> },
    #[serde(rename = "GENERATORS")]
    Generators {
        game: String,
        generators: Vec<GeneratorSummary>,
    },
    #[serde(rename = "BOARDS")]
    Boards { boards: Vec<String> },
    #[serde(rename = "OPENED")]
    Opened {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    #[serde(rename = "JOINED")]
    Joined {
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "roomName")]
        room_name: String,
        #[serde(rename = "boardMin")]
        board_min: BoardView,
        #[serde(rename = "teamColours")]
        team_colours: HashMap<TeamId, String>,
    },
    #[serde(rename = "REJOINED")]
    Rejoined {
        #[serde(rename = "roomName")]
        room_name: String,
        board: BoardView,
        #[serde(rename = "teamColours")]
        team_colours: HashMap<TeamId, String>,
    },
    #[serde(rename = "TEAM_CREATED")]
    TeamCreated {
        #[serde(rename = "teamId")]
        team_id: TeamId,
        board: BoardView,
        #[serde(rename = "teamColours")]
        team_colours: HashMap<TeamId, String>,
    },
    #[serde(rename = "TEAM_JOINED")]
    TeamJoined {
        board: BoardView,
        #[serde(rename = "teamColours")]
        team_colours: HashMap<TeamId, String>,
    },
    #[serde(rename = "TEAM_LEFT")]
    TeamLeft,
    #[serde(rename = "MARKED")]
    Marked {
        #[serde(rename = "goalId")]
        goal_id: usize,
    },
    #[serde(rename = "NOMARK")]
    NoMark,
    #[serde(rename = "UNMARKED")]
    Unmarked {
        #[serde(rename = "goalId")]
        goal_id: usize,
    },
    /// Broadcast after any mutation to the board (`alert_board_changes`), shaped
    /// per recipient's spectate level.
    #[serde(rename = "BOARD_UPDATE")]
    BoardUpdate {
        board: BoardView,
        #[serde(rename = "teamColours")]
        team_colours: HashMap<TeamId, String>,
    },
    /// Broadcast after any roster change (`alert_player_changes`).
    #[serde(rename = "PLAYER_UPDATE")]
    PlayerUpdate {
        users: Vec<UserSummary>,
        teams: Vec<TeamSummary>,
    },
    #[serde(rename = "SPECTATING")]
    Spectating { level: u8, board: BoardView },
    #[serde(rename = "TIMELAPSE")]
    Timelapse { history: Vec<MarkEventView> },
    #[serde(rename = "ERROR")]
    Error { message: String },
    #[serde(rename = "NOTFOUND")]
    NotFound,
    #[serde(rename = "NOAUTH")]
    NoAuth,
    #[serde(rename = "NOTEAM")]
    NoTeam,
}

/// One entry of the `LIST` response.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub name: String,
    pub game: String,
    pub board: String,
    pub variant: String,
    pub count: usize,
}

/// One entry of the `GET_GENERATORS` response.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorSummary {
    pub name: String,
    /// Whether the catalog backing this generator is small (fewer than 169 goals).
    pub small: bool,
}

/// A single user as shown in the roster broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub name: String,
    #[serde(rename = "teamId")]
    pub team_id: Option<TeamId>,
    pub connected: bool,
    pub spectate: u8,
}

/// A single team as shown in the roster broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
    pub name: String,
    pub colour: String,
    pub members: Vec<UserId>,
}

/// One entry of a `TIMELAPSE` response — a single mark/unmark replay event.
#[derive(Debug, Clone, Serialize)]
pub struct MarkEventView {
    #[serde(rename = "teamId")]
    pub team_id: TeamId,
    #[serde(rename = "goalId")]
    pub goal_id: usize,
    pub marked: bool,
}

/// A single goal's display data, as shown in a board view.
#[derive(Debug, Clone, Serialize)]
pub struct GoalView {
    pub name: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub translations: HashMap<String, String>,
}

/// Variant-specific extra fields appended to a team's board view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardExtras {
    #[serde(rename = "invasionMoves", skip_serializing_if = "Option::is_none")]
    pub invasion_moves: Option<Vec<usize>>,
    #[serde(rename = "colMarks", skip_serializing_if = "Option::is_none")]
    pub col_marks: Option<HashMap<TeamId, usize>>,
}

impl BoardExtras {
    pub fn is_empty(&self) -> bool {
        self.invasion_moves.is_none() && self.col_marks.is_none()
    }
}

/// The stable wire shape of any board projection (board view schema).
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    #[serde(rename = "type")]
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub game: String,
    #[serde(rename = "generatorName")]
    pub generator_name: String,
    #[serde(rename = "maxMarksPerSquare")]
    pub max_marks_per_square: u8,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub goals: HashMap<String, GoalView>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub marks: HashMap<TeamId, Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finals: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "BoardExtras::is_empty")]
    pub extras: BoardExtras,
}
