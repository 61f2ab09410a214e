use serde::Deserialize;

/// Stroke width (and billboard size) used when a style does not set one.
pub const DEFAULT_FEATURE_SIZE: f32 = 1.25;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub default_feature_size: f32,
    /// Features reconciled per chunk by [`crate::Synchronizer::run_chunk`].
    pub chunk_size: u32,
    /// Renderer capacity per role collection; `None` is unbounded.
    pub max_primitives_per_role: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_feature_size: DEFAULT_FEATURE_SIZE,
            chunk_size: 512,
            max_primitives_per_role: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(payload).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_feature_size.is_finite() || self.default_feature_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "default_feature_size",
                reason: format!("must be positive, got {}", self.default_feature_size),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
