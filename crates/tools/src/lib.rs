//! Scene-file replay for the `atlas-sync` binary.

use std::fs;
use std::path::Path;

use layers::VectorLayer;
use model::{Feature, FeatureId, FeatureSource, FeatureStore, GeometryShape, Position};
use runtime::{EventBus, Frame, MetricsSnapshot, REPAINT};
use serde::{Deserialize, Serialize};
use sync::{PassSummary, SyncConfig, Synchronizer};
use tracing::info;

/// A layer, its features and how many animation ticks to replay after the
/// initial pass.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneFile {
    pub layer: VectorLayer,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub ticks: u32,
}

#[derive(Debug)]
pub enum LoadError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse {
        path: String,
        source: serde_json::Error,
    },
    Config(sync::ConfigError),
    DuplicateFeature(FeatureId),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, source } => write!(f, "read {path}: {source}"),
            LoadError::Parse { path, source } => write!(f, "parse {path}: {source}"),
            LoadError::Config(e) => write!(f, "{e}"),
            LoadError::DuplicateFeature(id) => write!(f, "duplicate {id}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<sync::ConfigError> for LoadError {
    fn from(e: sync::ConfigError) -> Self {
        LoadError::Config(e)
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_scene(path: &Path) -> Result<SceneFile, LoadError> {
    let text = read(path)?;
    parse_scene(&text).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_scene(text: &str) -> Result<SceneFile, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn load_config(path: Option<&Path>) -> Result<SyncConfig, LoadError> {
    match path {
        Some(path) => Ok(SyncConfig::from_json_str(&read(path)?)?),
        None => Ok(SyncConfig::default()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// One summary per completed pass: the initial one, then one per tick.
    pub passes: Vec<PassSummary>,
    pub repaints: usize,
    pub entries: usize,
    pub metrics: MetricsSnapshot,
}

/// Runs the initial pass over every feature, then advances each dynamic line
/// track by one position per tick and runs a pass for it.
///
/// With `chunked`, passes are split into chunks of `config.chunk_size`.
pub fn replay(
    scene: SceneFile,
    config: SyncConfig,
    chunked: bool,
) -> Result<ReplayReport, LoadError> {
    let mut store = FeatureStore::new();
    for feature in scene.features {
        let id = feature.id();
        if store.is_visible(id) {
            return Err(LoadError::DuplicateFeature(id));
        }
        store.insert(feature);
    }
    let tracks: Vec<FeatureId> = store
        .feature_ids()
        .into_iter()
        .filter(|id| store.feature(*id).is_some_and(Feature::is_dynamic))
        .collect();

    let mut sync = Synchronizer::new(scene.layer, config);
    let mut bus = EventBus::new();
    let mut frame = Frame::new(0, 1.0 / 60.0);
    let mut passes = Vec::with_capacity(scene.ticks as usize + 1);
    let mut repaints = 0;

    for tick in 0..=scene.ticks {
        if tick > 0 {
            frame = frame.next();
            for id in &tracks {
                store.update(*id, |f| {
                    if let Some(geometry) = f.geometry_mut()
                        && let Some(next) = extrapolate(geometry.shape())
                    {
                        geometry.push_position(next);
                    }
                });
            }
        }
        let changes = store.drain_changes();
        let summary = if chunked {
            sync.enqueue(&changes);
            loop {
                let summary = sync.run_chunk(&store, frame, &mut bus);
                if summary.complete {
                    break summary;
                }
                frame = frame.next();
            }
        } else {
            sync.run_pass(&store, &changes, frame, &mut bus)
        };
        // The host drains the bus once per pass and redraws on any repaint.
        repaints += bus.drain().iter().filter(|e| e.kind == REPAINT).count();
        info!(
            tick,
            processed = summary.processed,
            failed = summary.failed,
            swept = summary.swept,
            "pass complete"
        );
        passes.push(summary);
    }

    Ok(ReplayReport {
        passes,
        repaints,
        entries: sync.scene().len(),
        metrics: sync.metrics().snapshot(),
    })
}

/// Continues a track along its last segment.
fn extrapolate(shape: &GeometryShape) -> Option<Position> {
    let coords = match shape {
        GeometryShape::LineString(c) | GeometryShape::DynamicLineString(c) => c,
        _ => return None,
    };
    match coords.as_slice() {
        [.., a, b] => Some(Position::new(
            2.0 * b.lon - a.lon,
            2.0 * b.lat - a.lat,
            b.alt,
        )),
        _ => None,
    }
}
