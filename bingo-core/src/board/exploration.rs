//! Exploration/GTTOS variant internals: fog-of-war via 4-adjacency BFS-by-one-step.
//!
//! Grounded on the original `Exploration`/`GTTOS` classes. Visibility is not
//! a full BFS flood — it is exactly the base cells plus the direct
//! neighbours of every marked cell, recomputed fresh on every view.

use protocol::TeamId;
use std::collections::{HashMap, HashSet};

/// Which of the two adjacency-revealed variants a board is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorationKind {
    /// Center-to-corner layout.
    Exploration,
    /// Left-to-right layout, reports each team's furthest column reached.
    Gttos,
}

#[derive(Debug, Clone)]
pub struct ExplorationState {
    pub kind: ExplorationKind,
    pub base: HashSet<usize>,
    pub finals: HashSet<usize>,
}

impl ExplorationState {
    pub fn exploration13() -> Self {
        ExplorationState {
            kind: ExplorationKind::Exploration,
            base: HashSet::from([84]),
            finals: HashSet::from([0, 12, 156, 168]),
        }
    }

    pub fn gttos13() -> Self {
        let base: HashSet<usize> = (0..13).map(|row| row * 13).collect();
        let finals: HashSet<usize> = (0..13).map(|row| row * 13 + 12).collect();
        ExplorationState {
            kind: ExplorationKind::Gttos,
            base,
            finals,
        }
    }

    pub fn surrounding(&self, index: usize, width: usize, height: usize) -> HashSet<usize> {
        let x = (index % width) as isize;
        let y = (index / width) as isize;
        let candidates = [(x - 1, y), (x + 1, y), (x, y + 1), (x, y - 1)];
        candidates
            .into_iter()
            .filter(|&(cx, cy)| cx >= 0 && cx < width as isize && cy >= 0 && cy < height as isize)
            .map(|(cx, cy)| (cy as usize) * width + (cx as usize))
            .collect()
    }

    pub fn seen_by_team(
        &self,
        marks: &HashMap<TeamId, HashSet<usize>>,
        team_id: &str,
        width: usize,
        height: usize,
    ) -> HashSet<usize> {
        let mut seen = self.base.clone();
        if let Some(team_marks) = marks.get(team_id) {
            for &mark in team_marks {
                seen.extend(self.surrounding(mark, width, height));
            }
        }
        seen
    }

    pub fn seen_by_all(
        &self,
        marks: &HashMap<TeamId, HashSet<usize>>,
        width: usize,
        height: usize,
    ) -> HashSet<usize> {
        let mut seen = self.base.clone();
        for team_marks in marks.values() {
            for &mark in team_marks {
                seen.extend(self.surrounding(mark, width, height));
            }
        }
        seen
    }

    /// GTTOS-only: each team's highest-reached column, always populated
    /// (never `None`, even for teams with no marks yet).
    pub fn mark_cols(
        &self,
        marks: &HashMap<TeamId, HashSet<usize>>,
        width: usize,
    ) -> HashMap<TeamId, usize> {
        marks
            .iter()
            .map(|(team_id, cells)| {
                let max_col = cells.iter().map(|&cell| cell % width).max().unwrap_or(0);
                (team_id.clone(), max_col)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrounding_excludes_out_of_bounds() {
        let state = ExplorationState::exploration13();
        let corner = state.surrounding(0, 13, 13);
        assert_eq!(corner.len(), 2);
        assert!(corner.contains(&1));
        assert!(corner.contains(&13));
    }

    #[test]
    fn seen_grows_with_marks() {
        let state = ExplorationState::exploration13();
        let mut marks = HashMap::new();
        marks.insert("t1".to_string(), HashSet::from([84]));
        let seen = state.seen_by_team(&marks, "t1", 13, 13);
        assert!(seen.contains(&84));
        assert!(seen.len() > 1);
    }

    #[test]
    fn mark_cols_defaults_to_zero_for_no_marks() {
        let state = ExplorationState::gttos13();
        let marks: HashMap<TeamId, HashSet<usize>> =
            HashMap::from([("t1".to_string(), HashSet::new())]);
        let cols = state.mark_cols(&marks, 13);
        assert_eq!(cols.get("t1"), Some(&0));
    }
}
