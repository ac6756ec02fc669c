//! The Board abstraction and its four variants.
//!
//! The source models this as a class hierarchy (`Board` → `Bingo` →
//! `Lockout` → `Invasion`, plus a separate `Exploration`/`GTTOS` branch).
//! Rust has no inheritance, and the variant set is closed and small, so this
//! is re-architected as one `Board` struct carrying common state plus a
//! [`BoardVariant`] enum carrying per-variant state; behaviour that differs
//! per variant is a match over that enum instead of virtual dispatch. This
//! mirrors how `backbone-lib`'s `BackEndArchitecture` trait separates
//! game-specific behaviour from common transport plumbing, narrowed from an
//! open trait (arbitrary games) to a closed enum (a fixed family of board
//! rules).

pub mod exploration;
pub mod invasion;

use crate::catalog::Goal;
use crate::error::CoreError;
use crate::generator::GoalSource;
use exploration::{ExplorationKind, ExplorationState};
use invasion::InvasionState;
use protocol::{BoardExtras, BoardView, GoalView, TeamId};
use std::collections::{HashMap, HashSet};

/// One `(team, cell, marked)` entry in a board's append-only mark history.
#[derive(Debug, Clone)]
pub struct MarkEvent {
    pub team_id: TeamId,
    pub index: usize,
    pub marked: bool,
}

#[derive(Debug, Clone)]
pub enum BoardVariant {
    NonLockout,
    Lockout,
    Invasion(InvasionState),
    Exploration(ExplorationState),
}

impl BoardVariant {
    fn type_name(&self) -> &'static str {
        match self {
            BoardVariant::NonLockout => "Non-Lockout",
            BoardVariant::Lockout => "Lockout",
            BoardVariant::Invasion(_) => "Invasion",
            BoardVariant::Exploration(state) => match state.kind {
                ExplorationKind::Exploration => "Exploration",
                ExplorationKind::Gttos => "Get To The Other Side",
            },
        }
    }
}

/// A board's full state: goal layout, marks, and variant rules.
#[derive(Debug, Clone)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    pub game: String,
    pub generator_name: String,
    pub languages: Vec<String>,
    pub seed: String,
    pub goals: Vec<Goal>,
    pub marks: HashMap<TeamId, HashSet<usize>>,
    pub mark_history: Vec<MarkEvent>,
    pub variant: BoardVariant,
}

/// Builds a board of the named variant, drawing its goals from `generator`.
pub fn create_board(
    board_kind: &str,
    generator: &dyn GoalSource,
    seed: &str,
) -> Result<Board, CoreError> {
    let (width, height, variant) = match board_kind {
        "Non-Lockout" => (5, 5, BoardVariant::NonLockout),
        "Lockout" => (5, 5, BoardVariant::Lockout),
        "Invasion" => (5, 5, BoardVariant::Invasion(InvasionState::new(5, 5))),
        "Exploration" => (
            13,
            13,
            BoardVariant::Exploration(ExplorationState::exploration13()),
        ),
        "GTTOS" => (
            13,
            13,
            BoardVariant::Exploration(ExplorationState::gttos13()),
        ),
        other => return Err(CoreError::UnknownBoard(other.to_string())),
    };

    let goals = generator.get(seed, width * height)?;

    Ok(Board {
        width,
        height,
        game: generator.game().to_string(),
        generator_name: generator.generator_name().to_string(),
        languages: generator.languages().to_vec(),
        seed: seed.to_string(),
        goals,
        marks: HashMap::new(),
        mark_history: Vec::new(),
        variant,
    })
}

impl Board {
    /// The wire name of this board's variant (`"Lockout"`, `"Get To The
    /// Other Side"`, …), as shown in `LIST` and every `BoardView.type`.
    pub fn board_kind(&self) -> &'static str {
        self.variant.type_name()
    }

    pub fn max_marks_per_square(&self) -> u8 {
        match &self.variant {
            BoardVariant::NonLockout | BoardVariant::Exploration(_) => 0,
            BoardVariant::Lockout | BoardVariant::Invasion(_) => 1,
        }
    }

    fn inv_marks(&self) -> HashMap<usize, TeamId> {
        let mut out = HashMap::new();
        for (team_id, cells) in &self.marks {
            for &index in cells {
                out.insert(index, team_id.clone());
            }
        }
        out
    }

    /// The default predicate: `team_id` is present and has not already
    /// marked `index`. Variants override selectively.
    fn default_can_mark(&self, index: usize, team_id: &str) -> bool {
        !self
            .marks
            .get(team_id)
            .map(|cells| cells.contains(&index))
            .unwrap_or(false)
    }

    pub fn can_mark(&self, index: usize, team_id: &str) -> bool {
        if index >= self.goals.len() {
            return false;
        }
        match &self.variant {
            BoardVariant::NonLockout => self.default_can_mark(index, team_id),
            BoardVariant::Lockout => {
                !self.marks.values().any(|cells| cells.contains(&index))
            }
            BoardVariant::Invasion(state) => {
                let inv = self.inv_marks();
                state.valid_moves(&inv, team_id).contains_key(&index)
            }
            BoardVariant::Exploration(state) => state
                .seen_by_team(&self.marks, team_id, self.width, self.height)
                .contains(&index),
        }
    }

    pub fn can_unmark(&self, index: usize, team_id: &str) -> bool {
        self.marks
            .get(team_id)
            .map(|cells| cells.contains(&index))
            .unwrap_or(false)
    }

    /// Marks `index` for `team_id` if permitted; returns whether it took effect.
    pub fn mark(&mut self, index: usize, team_id: &str) -> bool {
        let invasion_constraints = if let BoardVariant::Invasion(state) = &self.variant {
            let inv = self.inv_marks();
            match state.valid_moves(&inv, team_id).get(&index) {
                Some(c) => Some(c.clone()),
                None => return false,
            }
        } else {
            if !self.can_mark(index, team_id) {
                return false;
            }
            None
        };

        self.marks
            .entry(team_id.to_string())
            .or_default()
            .insert(index);
        self.mark_history.push(MarkEvent {
            team_id: team_id.to_string(),
            index,
            marked: true,
        });

        if let Some(constraints) = invasion_constraints {
            if let BoardVariant::Invasion(state) = &mut self.variant {
                state.update_constraints(team_id, constraints);
            }
        }
        true
    }

    /// Unmarks `index` for `team_id` if permitted; returns whether it took effect.
    ///
    /// For Invasion, this is not a plain removal: the whole board is replayed
    /// from scratch without `index` to check the resulting state is still
    /// valid for both teams, per the source's `unmark`/`replay` pair.
    pub fn unmark(&mut self, index: usize, team_id: &str) -> bool {
        if !self.can_unmark(index, team_id) {
            return false;
        }

        if let BoardVariant::Invasion(_) = &self.variant {
            return self.unmark_invasion(index, team_id);
        }

        let cells = self.marks.get_mut(team_id).unwrap();
        cells.remove(&index);
        if cells.is_empty() {
            self.marks.remove(team_id);
        }
        self.mark_history.push(MarkEvent {
            team_id: team_id.to_string(),
            index,
            marked: false,
        });
        true
    }

    fn unmark_invasion(&mut self, index: usize, team_id: &str) -> bool {
        let BoardVariant::Invasion(state) = &self.variant else {
            unreachable!()
        };
        let fresh_state = InvasionState::new(self.width, self.height);
        let mut replay_marks: HashMap<TeamId, HashSet<usize>> = HashMap::new();
        let mut replay_state = fresh_state;

        let mut to_play: HashSet<usize> = self.marks[team_id].clone();
        to_play.remove(&index);
        let team_constraints = state
            .start_constraints
            .get(team_id)
            .cloned()
            .unwrap_or_else(invasion::all_directions);
        if !replay(&mut replay_state, &mut replay_marks, team_id, &to_play, &team_constraints) {
            return false;
        }

        if let Some(other_id) = state.other_team(team_id) {
            let other_marks = self.marks.get(&other_id).cloned().unwrap_or_default();
            let other_constraints = state
                .start_constraints
                .get(&other_id)
                .cloned()
                .unwrap_or_else(invasion::all_directions);
            if !replay(
                &mut replay_state,
                &mut replay_marks,
                &other_id,
                &other_marks,
                &other_constraints,
            ) {
                return false;
            }
        }

        self.marks = replay_marks;
        self.mark_history.push(MarkEvent {
            team_id: team_id.to_string(),
            index,
            marked: false,
        });
        if let BoardVariant::Invasion(state) = &mut self.variant {
            *state = replay_state;
        }
        true
    }

    fn goal_views(&self, indices: impl Iterator<Item = usize>) -> HashMap<String, GoalView> {
        indices
            .filter_map(|i| self.goals.get(i).map(|g| (i.to_string(), g.to_view())))
            .collect()
    }

    fn marks_as_lists(&self) -> HashMap<TeamId, Vec<usize>> {
        self.marks
            .iter()
            .map(|(t, cells)| (t.clone(), cells.iter().copied().collect()))
            .collect()
    }

    fn base_view(&self) -> BoardView {
        BoardView {
            kind: self.variant.type_name().to_string(),
            width: self.width as u32,
            height: self.height as u32,
            game: self.game.clone(),
            generator_name: self.generator_name.clone(),
            max_marks_per_square: self.max_marks_per_square(),
            goals: HashMap::new(),
            marks: HashMap::new(),
            base: None,
            finals: None,
            extras: BoardExtras::default(),
        }
    }

    /// Metadata-only view, safe to show anyone regardless of team.
    pub fn minimum_view(&self) -> BoardView {
        match &self.variant {
            BoardVariant::Exploration(state) => {
                let mut view = self.base_view();
                view.goals = self.goal_views(state.base.iter().copied());
                view.base = Some(state.base.iter().copied().collect());
                view.finals = Some(state.finals.iter().copied().collect());
                view
            }
            _ => self.full_view(),
        }
    }

    /// What a member of `team_id` may see.
    pub fn team_view(&self, team_id: &str) -> BoardView {
        match &self.variant {
            BoardVariant::Invasion(state) => {
                let mut view = self.full_view();
                let inv = self.inv_marks();
                let mut moves: Vec<usize> =
                    state.valid_moves(&inv, team_id).keys().copied().collect();
                moves.sort_unstable();
                view.extras.invasion_moves = Some(moves);
                view
            }
            BoardVariant::Exploration(state) => {
                let seen = state.seen_by_team(&self.marks, team_id, self.width, self.height);
                let mut view = self.minimum_view();
                view.goals = self.goal_views(seen.into_iter());
                let own_marks = self
                    .marks
                    .get(team_id)
                    .map(|cells| cells.iter().copied().collect())
                    .unwrap_or_default();
                view.marks = HashMap::from([(team_id.to_string(), own_marks)]);
                if matches!(state.kind, ExplorationKind::Gttos) {
                    view.extras.col_marks = Some(state.mark_cols(&self.marks, self.width));
                }
                view
            }
            _ => self.full_view(),
        }
    }

    /// Authoritative projection with no hidden information, for spectators
    /// and Non-Lockout/Lockout/Invasion team views.
    pub fn full_view(&self) -> BoardView {
        let mut view = self.base_view();
        view.goals = self.goal_views(0..self.goals.len());
        view.marks = self.marks_as_lists();
        view
    }

    /// Spectator projection, which for Exploration/GTTOS reveals the union
    /// of both teams' visibility rather than the full unmarked board.
    pub fn spectator_view(&self) -> BoardView {
        match &self.variant {
            BoardVariant::Exploration(state) => {
                let seen = state.seen_by_all(&self.marks, self.width, self.height);
                let mut view = self.minimum_view();
                view.goals = self.goal_views(seen.into_iter());
                view.marks = self.marks_as_lists();
                view
            }
            _ => self.full_view(),
        }
    }
}

/// Replays `indexes` onto `marks`/`state` for `team_id`, accepting any legal
/// ordering, used to validate a post-unmark board state is still reachable.
fn replay(
    state: &mut InvasionState,
    marks: &mut HashMap<TeamId, HashSet<usize>>,
    team_id: &str,
    indexes: &HashSet<usize>,
    constraints: &HashSet<u8>,
) -> bool {
    let mut to_move = indexes.clone();
    while !to_move.is_empty() {
        let inv: HashMap<usize, TeamId> = marks.iter().fold(HashMap::new(), |mut acc, (t, cells)| {
            for &i in cells {
                acc.insert(i, t.clone());
            }
            acc
        });
        let moves = state.valid_moves(&inv, team_id);

        let next = to_move.iter().copied().find(|i| {
            moves
                .get(i)
                .map(|c| constraints.is_subset(c))
                .unwrap_or(false)
        });

        let Some(index) = next else {
            return false;
        };
        to_move.remove(&index);
        let c = moves[&index].clone();
        marks.entry(team_id.to_string()).or_default().insert(index);
        state.update_constraints(team_id, c);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::generator::{Generator, GeneratorKind};
    use serde_json::json;

    fn make_generator(goal_count: usize, game: &str) -> Generator {
        let mut obj = serde_json::Map::new();
        for i in 0..goal_count {
            obj.insert(format!("g{i}"), json!({"name": format!("Goal {i}")}));
        }
        let catalog = Catalog::parse(game, vec![], None, &obj).unwrap();
        Generator::new("gen", GeneratorKind::Uniform, catalog)
    }

    #[test]
    fn non_lockout_allows_multiple_teams_on_same_cell() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Non-Lockout", &generator, "seed").unwrap();
        assert!(board.mark(0, "team-a"));
        assert!(board.mark(0, "team-b"));
    }

    #[test]
    fn lockout_rejects_second_team_on_marked_cell() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Lockout", &generator, "seed").unwrap();
        assert!(board.mark(0, "team-a"));
        assert!(!board.mark(0, "team-b"));
    }

    #[test]
    fn lockout_history_replay_reconstructs_marks() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Lockout", &generator, "seed").unwrap();
        board.mark(0, "team-a");
        board.mark(1, "team-b");
        board.unmark(0, "team-a");
        board.mark(2, "team-a");

        let mut fresh = create_board("Lockout", &generator, "seed").unwrap();
        for event in &board.mark_history {
            if event.marked {
                fresh.mark(event.index, &event.team_id);
            } else {
                fresh.unmark(event.index, &event.team_id);
            }
        }
        assert_eq!(fresh.marks, board.marks);
    }

    #[test]
    fn invasion_accepts_first_move_from_any_direction_then_constrains() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Invasion", &generator, "seed").unwrap();
        assert!(board.mark(0, "team-a"));
        assert!(board.mark(24, "team-b"));
        let view = board.team_view("team-a");
        assert!(view.extras.invasion_moves.is_some());
    }

    #[test]
    fn invasion_unmark_fails_if_resulting_state_invalid() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Invasion", &generator, "seed").unwrap();
        board.mark(0, "team-a");
        board.mark(1, "team-a");
        // Unmark the first move while the second mark still depends on its
        // consistency; the replay either accepts or rejects but must never
        // leave the board mid-mutation.
        let before = board.marks.clone();
        let ok = board.unmark(0, "team-a");
        if !ok {
            assert_eq!(board.marks, before);
        }
    }

    #[test]
    fn exploration_hides_unseen_goals() {
        let generator = make_generator(169, "game");
        let board = create_board("Exploration", &generator, "seed").unwrap();
        let view = board.team_view("team-a");
        assert!(view.goals.len() < board.goals.len());
        assert!(view.goals.contains_key("84"));
    }

    #[test]
    fn gttos_reports_mark_columns() {
        let generator = make_generator(169, "game");
        let mut board = create_board("GTTOS", &generator, "seed").unwrap();
        board.mark(0, "team-a");
        let view = board.team_view("team-a");
        assert!(view.extras.col_marks.is_some());
        assert_eq!(view.extras.col_marks.unwrap().get("team-a"), Some(&0));
    }

    // The six worked scenarios below are reproduced verbatim from the
    // numbers they were specified with, not just their pass/fail shape.

    #[test]
    fn scenario_non_lockout_dual_claim() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Non-Lockout", &generator, "seed").unwrap();
        assert!(board.mark(7, "A"));
        assert!(board.mark(7, "B"));
        assert_eq!(board.marks[&"A".to_string()], HashSet::from([7]));
        assert_eq!(board.marks[&"B".to_string()], HashSet::from([7]));
    }

    #[test]
    fn scenario_lockout_contention() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Lockout", &generator, "seed").unwrap();
        assert!(board.mark(7, "A"));
        assert!(!board.mark(7, "B"));
        assert_eq!(board.marks.len(), 1);
        assert_eq!(board.marks[&"A".to_string()], HashSet::from([7]));
    }

    #[test]
    fn scenario_invasion_first_moves_narrow_constraints() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Invasion", &generator, "seed").unwrap();

        assert!(board.mark(0, "A"));
        let BoardVariant::Invasion(state) = &board.variant else {
            unreachable!()
        };
        assert_eq!(
            state.start_constraints["A"],
            HashSet::from([invasion::TOP, invasion::LEFT])
        );

        assert!(board.mark(24, "B"));
        let BoardVariant::Invasion(state) = &board.variant else {
            unreachable!()
        };
        assert_eq!(
            state.start_constraints["B"],
            HashSet::from([invasion::BOTTOM, invasion::RIGHT])
        );

        assert!(board.mark(1, "A"));
        let BoardVariant::Invasion(state) = &board.variant else {
            unreachable!()
        };
        assert_eq!(state.start_constraints["A"], HashSet::from([invasion::TOP]));
        assert_eq!(
            state.start_constraints["B"],
            HashSet::from([invasion::BOTTOM])
        );
    }

    #[test]
    fn scenario_invasion_interior_cell_rejected() {
        let generator = make_generator(25, "game");
        let mut board = create_board("Invasion", &generator, "seed").unwrap();
        assert!(!board.mark(12, "A"));
    }

    #[test]
    fn scenario_exploration_center_reveal() {
        let generator = make_generator(169, "game");
        let mut board = create_board("Exploration", &generator, "seed").unwrap();
        assert!(board.mark(84, "A"));
        let BoardVariant::Exploration(state) = &board.variant else {
            unreachable!()
        };
        let seen = state.seen_by_team(&board.marks, "A", board.width, board.height);
        assert_eq!(seen, HashSet::from([84, 71, 83, 85, 97]));
        assert!(!board.mark(72, "A"));
    }

    #[test]
    fn scenario_gttos_rank_broadcast() {
        let generator = make_generator(169, "game");
        let mut board = create_board("GTTOS", &generator, "seed").unwrap();
        assert!(board.mark(0, "A"));
        assert!(board.mark(1, "A"));
        assert!(board.mark(26, "B"));

        let view = board.team_view("A");
        let col_marks = view.extras.col_marks.unwrap();
        assert_eq!(col_marks.get("A"), Some(&1));
        assert_eq!(col_marks.get("B"), Some(&0));
    }
}
