//! Process configuration and hot-reloadable catalog loading.
//!
//! Mirrors the teacher's `lobby::{AppState, reload_config}` split: environment
//! variables are read once at startup into [`AppConfig`], while catalogs are
//! read from disk through [`load_catalogs`], which callers may invoke again
//! at any time (e.g. from an admin endpoint) to pick up new or edited game
//! files without a restart.

use bingo_core::generator::{Generator, GeneratorKind};
use bingo_core::{Catalog, Goal};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Process-wide settings, read once from the environment at startup.
pub struct AppConfig {
    pub listen_addr: String,
    pub catalog_dir: PathBuf,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            listen_addr: std::env::var("BINGO_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            catalog_dir: std::env::var("BINGO_CATALOG_DIR")
                .unwrap_or_else(|_| "./catalogs".to_string())
                .into(),
            tls_cert: std::env::var("BINGO_TLS_CERT").ok().map(PathBuf::from),
            tls_key: std::env::var("BINGO_TLS_KEY").ok().map(PathBuf::from),
        }
    }

    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// One named sampler for one game, either catalog-backed or a fixed lineup.
pub enum AnyGenerator {
    Sampled(Generator),
    Fixed(bingo_core::FixedGenerator),
}

impl AnyGenerator {
    pub fn name(&self) -> &str {
        match self {
            AnyGenerator::Sampled(g) => &g.name,
            AnyGenerator::Fixed(g) => &g.name,
        }
    }

    pub fn get(&self, seed: &str, n: usize) -> Result<Vec<Goal>, bingo_core::CoreError> {
        match self {
            AnyGenerator::Sampled(g) => g.get(seed, n),
            AnyGenerator::Fixed(g) => g.get(seed, n),
        }
    }

    /// Whether this generator's pool is "small" (fewer than 169 goals), as
    /// reported by `GET_GENERATORS`.
    pub fn is_small(&self) -> bool {
        match self {
            AnyGenerator::Sampled(g) => g.catalog().len() < 169,
            AnyGenerator::Fixed(g) => g.len() < 169,
        }
    }
}

/// All generators for all games, keyed by game then generator name.
pub type CatalogRegistry = HashMap<String, HashMap<String, AnyGenerator>>;

#[derive(Debug, Deserialize)]
struct RawGeneratorConfig {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    goals: serde_json::Value,
    #[serde(default, rename = "tiebreakerMax")]
    tiebreaker_max: Option<u32>,
    #[serde(default)]
    languages: Vec<String>,
}

/// Walks `catalog_dir`, parsing every `<game>.json` file into its generators.
///
/// A single malformed game file is logged and skipped rather than failing
/// the whole load, so one bad catalog can't take every other game down.
pub async fn load_catalogs(catalog_dir: &Path) -> Result<CatalogRegistry, std::io::Error> {
    let mut registry = CatalogRegistry::new();
    let mut entries = tokio::fs::read_dir(catalog_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(game) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match load_game_file(game, &path).await {
            Ok(generators) => {
                registry.insert(game.to_string(), generators);
            }
            Err(err) => {
                tracing::error!(game, ?err, "failed to load catalog file, skipping");
            }
        }
    }

    Ok(registry)
}

async fn load_game_file(
    game: &str,
    path: &Path,
) -> Result<HashMap<String, AnyGenerator>, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    let document: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| e.to_string())?;

    let mut generators = HashMap::new();
    for (name, raw_value) in document {
        let raw: RawGeneratorConfig =
            serde_json::from_value(raw_value).map_err(|e| format!("{name}: {e}"))?;

        let generator = match raw.kind.as_str() {
            "FixedGenerator" => {
                let ids: Vec<String> =
                    serde_json::from_value(raw.goals).map_err(|e| format!("{name}: {e}"))?;
                let goals = ids
                    .into_iter()
                    .map(|id| Goal {
                        id: id.clone(),
                        name: id,
                        translations: HashMap::new(),
                        weight: 1.0,
                        exclusions: Default::default(),
                        tiebreaker: false,
                    })
                    .collect();
                AnyGenerator::Fixed(bingo_core::FixedGenerator::new(name.clone(), game, goals))
            }
            kind => {
                let goal_doc = raw
                    .goals
                    .as_object()
                    .ok_or_else(|| format!("{name}: \"goals\" must be an object"))?;
                let catalog = Catalog::parse(game, raw.languages, raw.tiebreaker_max, goal_doc)
                    .map_err(|e| e.to_string())?;
                let generator_kind = match kind {
                    "BaseGenerator" => GeneratorKind::Uniform,
                    "MutexGenerator" => GeneratorKind::Mutex,
                    "TiebreakerGenerator" => GeneratorKind::Tiebreaker,
                    "TiebreakerMutexGenerator" => GeneratorKind::TiebreakerMutex,
                    other => return Err(format!("{name}: unknown generator type {other:?}")),
                };
                AnyGenerator::Sampled(Generator::new(name.clone(), generator_kind, catalog))
            }
        };
        generators.insert(name, generator);
    }

    Ok(generators)
}
