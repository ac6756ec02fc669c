//! Seeded, deterministic goal sampling over a [`Catalog`].
//!
//! All four catalog-backed variants share one draw loop — pick uniformly
//! from the remaining pool, apply the variant's removal/budget rules, repeat
//! until `n` goals are drawn or the pool is exhausted. [`GeneratorRules`]
//! factors the loop out so variants differ only in their hooks, mirroring
//! how [`crate::board`] factors its own variant family.

use crate::catalog::{Catalog, Goal};
use crate::error::CoreError;
use crate::rng::Mt19937;

/// Common surface [`crate::board::create_board`] needs from any generator,
/// whether catalog-backed or fixed. Lets the board layer stay ignorant of
/// which sampling algorithm produced its goals.
pub trait GoalSource {
    fn get(&self, seed: &str, n: usize) -> Result<Vec<Goal>, CoreError>;
    fn game(&self) -> &str;
    fn generator_name(&self) -> &str;
    fn languages(&self) -> &[String];
}

/// Which sampling algorithm a generator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Uniform,
    Mutex,
    Tiebreaker,
    TiebreakerMutex,
}

/// A seeded sampler bound to one catalog.
///
/// Stateless between calls: `get(seed, n)` is a pure function of
/// `(catalog, kind, seed, n)`.
pub struct Generator {
    pub name: String,
    pub kind: GeneratorKind,
    pub tiebreaker_max: u32,
    catalog: Catalog,
}

impl Generator {
    pub fn new(name: impl Into<String>, kind: GeneratorKind, catalog: Catalog) -> Self {
        let tiebreaker_max = catalog.tiebreaker_max.unwrap_or(0);
        Generator {
            name: name.into(),
            kind,
            tiebreaker_max,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Draws `n` distinct goals deterministically from `seed`.
    pub fn get(&self, seed: &str, n: usize) -> Result<Vec<Goal>, CoreError> {
        let mut rng = Mt19937::from_seed_str(seed);
        // `pool` holds indices into `self.catalog.goals_in_order()`, in the
        // catalog's own order, mirroring a Python dict's insertion-ordered
        // `keys()` view that the original sampler draws from.
        let mut pool: Vec<usize> = (0..self.catalog.len()).collect();
        let mut tiebreakers_left = self.tiebreaker_max;
        let goals = self.catalog.goals_in_order();
        let mut sample = Vec::with_capacity(n);

        for _ in 0..n {
            if matches!(
                self.kind,
                GeneratorKind::Tiebreaker | GeneratorKind::TiebreakerMutex
            ) && tiebreakers_left == 0
            {
                pool.retain(|&idx| !goals[idx].tiebreaker);
            }

            if pool.is_empty() {
                return Err(CoreError::Exhausted {
                    generator: self.name.clone(),
                    drawn: sample.len(),
                    requested: n,
                });
            }

            let choice_pos = rng.below(pool.len() as u32) as usize;
            let goal_idx = pool.remove(choice_pos);
            let goal = &goals[goal_idx];
            sample.push(goal.clone());

            if matches!(self.kind, GeneratorKind::Tiebreaker | GeneratorKind::TiebreakerMutex)
                && goal.tiebreaker
            {
                tiebreakers_left = tiebreakers_left.saturating_sub(1);
            }

            if matches!(self.kind, GeneratorKind::Mutex | GeneratorKind::TiebreakerMutex)
                && !goal.exclusions.is_empty()
            {
                pool.retain(|&idx| !goal.exclusions.contains(&goals[idx].id));
            }
        }

        Ok(sample)
    }
}

impl GoalSource for Generator {
    fn get(&self, seed: &str, n: usize) -> Result<Vec<Goal>, CoreError> {
        Generator::get(self, seed, n)
    }

    fn game(&self) -> &str {
        &self.catalog.game
    }

    fn generator_name(&self) -> &str {
        &self.name
    }

    fn languages(&self) -> &[String] {
        &self.catalog.languages
    }
}

/// Returns the first `n` goals of a preconfigured ordered list, ignoring the
/// seed entirely. Used for curated lineups authored directly as an ordered
/// id list rather than a weighted/exclusion-bearing catalog.
pub struct FixedGenerator {
    pub name: String,
    pub game: String,
    goals: Vec<Goal>,
}

impl FixedGenerator {
    pub fn new(name: impl Into<String>, game: impl Into<String>, goals: Vec<Goal>) -> Self {
        FixedGenerator {
            name: name.into(),
            game: game.into(),
            goals,
        }
    }

    pub fn get(&self, _seed: &str, n: usize) -> Result<Vec<Goal>, CoreError> {
        if n > self.goals.len() {
            return Err(CoreError::Exhausted {
                generator: self.name.clone(),
                drawn: self.goals.len(),
                requested: n,
            });
        }
        Ok(self.goals[..n].to_vec())
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

impl GoalSource for FixedGenerator {
    fn get(&self, seed: &str, n: usize) -> Result<Vec<Goal>, CoreError> {
        FixedGenerator::get(self, seed, n)
    }

    fn game(&self) -> &str {
        &self.game
    }

    fn generator_name(&self) -> &str {
        &self.name
    }

    fn languages(&self) -> &[String] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn catalog_with(goals: serde_json::Value) -> Catalog {
        let doc = goals.as_object().unwrap().clone();
        Catalog::parse("game", vec![], Some(1), &doc).unwrap()
    }

    #[test]
    fn uniform_is_deterministic_and_without_replacement() {
        let catalog = catalog_with(json!({
            "a": {"name": "A"}, "b": {"name": "B"}, "c": {"name": "C"},
            "d": {"name": "D"}, "e": {"name": "E"},
        }));
        let gen = Generator::new("g", GeneratorKind::Uniform, catalog);
        let first = gen.get("seed-1", 3).unwrap();
        let second = gen.get("seed-1", 3).unwrap();
        assert_eq!(
            first.iter().map(|g| g.id.clone()).collect::<Vec<_>>(),
            second.iter().map(|g| g.id.clone()).collect::<Vec<_>>()
        );
        let ids: HashSet<_> = first.iter().map(|g| g.id.clone()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn mutex_never_returns_mutually_exclusive_pair() {
        let catalog = catalog_with(json!({
            "a": {"name": "A", "exclusions": ["b"]},
            "b": {"name": "B", "exclusions": ["a"]},
            "c": {"name": "C"},
            "d": {"name": "D"},
        }));
        let gen = Generator::new("g", GeneratorKind::Mutex, catalog);
        for seed in ["s1", "s2", "s3", "s4", "s5"] {
            let sample = gen.get(seed, 2).unwrap();
            let ids: HashSet<_> = sample.iter().map(|g| g.id.as_str()).collect();
            assert!(!(ids.contains("a") && ids.contains("b")));
        }
    }

    #[test]
    fn tiebreaker_budget_is_respected() {
        let catalog = catalog_with(json!({
            "a": {"name": "A", "tiebreaker": true},
            "b": {"name": "B", "tiebreaker": true},
            "c": {"name": "C"},
            "d": {"name": "D"},
            "e": {"name": "E"},
        }));
        let gen = Generator::new("g", GeneratorKind::Tiebreaker, catalog);
        for seed in ["x1", "x2", "x3"] {
            let sample = gen.get(seed, 4).unwrap();
            let tiebreakers = sample.iter().filter(|g| g.tiebreaker).count();
            assert!(tiebreakers <= 1);
        }
    }

    #[test]
    fn exhausted_pool_is_an_error() {
        let catalog = catalog_with(json!({"a": {"name": "A"}, "b": {"name": "B"}}));
        let gen = Generator::new("g", GeneratorKind::Uniform, catalog);
        let err = gen.get("seed", 5).unwrap_err();
        assert!(matches!(err, CoreError::Exhausted { .. }));
    }

    #[test]
    fn fixed_ignores_seed_and_takes_prefix() {
        let goals = vec![
            Goal {
                id: "a".into(),
                name: "A".into(),
                translations: Default::default(),
                weight: 1.0,
                exclusions: Default::default(),
                tiebreaker: false,
            },
            Goal {
                id: "b".into(),
                name: "B".into(),
                translations: Default::default(),
                weight: 1.0,
                exclusions: Default::default(),
                tiebreaker: false,
            },
        ];
        let gen = FixedGenerator::new("f", "game", goals);
        let a = gen.get("seed-a", 1).unwrap();
        let b = gen.get("seed-b", 1).unwrap();
        assert_eq!(a[0].id, "a");
        assert_eq!(b[0].id, "a");
    }
}
