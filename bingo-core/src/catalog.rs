//! Goal catalogs: the immutable, per-generator pool of goals a board is drawn
//! from.
//!
//! A catalog is a flat keyed document — `{goalId: {name, type?, weight?,
//! exclusions?, tiebreaker?, translations?}}` — with `type` inferred from
//! whichever of `weight`/`exclusions`/`tiebreaker` are present when absent.
//! Catalog order matters: generators draw by index into the catalog's goal
//! list, so that list preserves the source document's key order rather than
//! going through a randomly-ordered `HashMap`, which would make sampling
//! non-reproducible across runs.

use crate::error::CoreError;
use protocol::GoalView;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// A single goal definition, immutable once parsed.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub translations: HashMap<String, String>,
    /// Positive rational weight; defaults to 1 when absent. Currently advisory
    /// — no generator variant in §4.2 consumes it yet (matches the source's
    /// own `#TODO: add weighted generators!`).
    pub weight: f64,
    pub exclusions: HashSet<String>,
    pub tiebreaker: bool,
}

impl Goal {
    pub fn to_view(&self) -> GoalView {
        GoalView {
            name: self.name.clone(),
            translations: self.translations.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawGoal {
    name: String,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    exclusions: Option<HashSet<String>>,
    #[serde(default)]
    tiebreaker: bool,
    #[serde(default)]
    translations: HashMap<String, String>,
}

/// An immutable catalog of goals for one game/generator, plus the metadata
/// the board and dispatcher need to describe it.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub game: String,
    pub languages: Vec<String>,
    pub tiebreaker_max: Option<u32>,
    /// Goals in source-document order. Generators sample from this order so
    /// that the same (catalog, seed) always yields the same draws.
    goals: Vec<Goal>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    /// Parses a catalog from its JSON document (an object mapping goal id to
    /// goal definition) plus the surrounding metadata supplied by the
    /// generator config that owns it.
    pub fn parse(
        game: &str,
        languages: Vec<String>,
        tiebreaker_max: Option<u32>,
        document: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Catalog, CoreError> {
        let mut goals = Vec::with_capacity(document.len());
        let mut by_id = HashMap::with_capacity(document.len());

        for (id, raw_value) in document {
            let raw: RawGoal =
                serde_json::from_value(raw_value.clone()).map_err(|e| CoreError::InvalidCatalog {
                    game: game.to_string(),
                    reason: format!("goal {id:?} failed to parse: {e}"),
                })?;
            by_id.insert(id.clone(), goals.len());
            goals.push(Goal {
                id: id.clone(),
                name: raw.name,
                translations: raw.translations,
                weight: raw.weight.unwrap_or(1.0),
                exclusions: raw.exclusions.unwrap_or_default(),
                tiebreaker: raw.tiebreaker,
            });
        }

        for goal in &goals {
            for excluded in &goal.exclusions {
                if !by_id.contains_key(excluded) {
                    return Err(CoreError::InvalidCatalog {
                        game: game.to_string(),
                        reason: format!(
                            "goal {:?} excludes unknown goal {:?}",
                            goal.id, excluded
                        ),
                    });
                }
            }
        }

        Ok(Catalog {
            game: game.to_string(),
            languages,
            tiebreaker_max,
            goals,
            by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn goals_in_order(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.by_id.get(id).map(|&i| &self.goals[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn infers_weighted_and_exclusion_goals() {
        let document = doc(json!({
            "a": {"name": "A", "weight": 2.0},
            "b": {"name": "B", "exclusions": ["a"]},
            "c": {"name": "C", "tiebreaker": true},
        }));
        let catalog = Catalog::parse("game", vec![], None, &document).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("a").unwrap().weight, 2.0);
        assert!(catalog.get("b").unwrap().exclusions.contains("a"));
        assert!(catalog.get("c").unwrap().tiebreaker);
    }

    #[test]
    fn rejects_dangling_exclusion() {
        let document = doc(json!({
            "a": {"name": "A", "exclusions": ["missing"]},
        }));
        let err = Catalog::parse("game", vec![], None, &document).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCatalog { .. }));
    }

    #[test]
    fn preserves_document_order() {
        let document = doc(json!({
            "z": {"name": "Z"},
            "a": {"name": "A"},
            "m": {"name": "M"},
        }));
        let catalog = Catalog::parse("game", vec![], None, &document).unwrap();
        let ids: Vec<&str> = catalog.goals_in_order().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }
}
