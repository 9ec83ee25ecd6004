use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::iforest::IsolationForestParams;

pub const ENV_MODEL_PATH: &str = "COUPON_ML_MODEL_PATH";
pub const ENV_PORT: &str = "COUPON_ML_PORT";

/// Fewest trees a retrained forest is built with.
pub const MIN_TRAIN_TREES: usize = 50;

/// Fixed runtime configuration. The version probe reports the port, model
/// path and forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub model_path: PathBuf,
    pub if_trees: usize,
    pub if_contamination: f64,
    /// Seeds both the synthetic population and the forest.
    pub seed: u64,
    /// Synthetic rows drawn on cold start.
    pub init_rows: usize,
    /// Synthetic rows drawn when a train request carries no rows.
    pub train_rows: usize,
    pub max_samples: usize,
    pub top_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: 8000,
            model_path: PathBuf::from("./model.bin"),
            if_trees: 100,
            if_contamination: 0.05,
            seed: 42,
            init_rows: 200,
            train_rows: 300,
            max_samples: 256,
            top_k: 3,
        }
    }
}

impl Settings {
    /// Reads a JSON settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Applies `COUPON_ML_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_PORT}={port}: {e}")))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.init_params().validate()?;
        if self.init_rows == 0 || self.train_rows == 0 {
            return Err(Error::Config(
                "synthetic row counts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Forest used on cold start.
    pub fn init_params(&self) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.if_trees,
            max_samples: self.max_samples,
            contamination: self.if_contamination,
            seed: self.seed,
        }
    }

    /// Forest used on retrain.
    pub fn train_params(&self) -> IsolationForestParams {
        IsolationForestParams {
            n_estimators: self.if_trees.max(MIN_TRAIN_TREES),
            ..self.init_params()
        }
    }
}
