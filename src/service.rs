use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::features::extract::{extract_vector, row_from_mapping, ScoreRequest};
use crate::features::schema::{FeatureVector, FEATURES_ORDER};
use crate::lifecycle::manager::ModelManager;
use crate::utils::attribution::top_contributors;
use crate::utils::normalize::{normalize_anomaly, round_to};

/// Decimal places kept in the reported score.
pub const SCORE_DIGITS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
    pub top: Vec<String>,
}

/// Rows are keyed by schema names. `abuse` is accepted but not fitted on:
/// the forest is trained on legitimate traffic only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    #[serde(default)]
    pub legit: Vec<Map<String, Value>>,
    #[serde(default)]
    pub abuse: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub ok: bool,
    pub trained_on: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub ok: bool,
    pub port: u16,
    pub model_path: String,
    pub if_trees: usize,
    pub if_contamination: f64,
    pub features_order: Vec<String>,
}

/// One request addressed to [`AnomalyService::dispatch`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Score(ScoreRequest),
    Train(TrainRequest),
    Health,
    Version,
}

/// Scoring and training over one explicitly owned model slot.
pub struct AnomalyService {
    settings: Settings,
    manager: ModelManager,
}

impl AnomalyService {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let manager = ModelManager::from_settings(&settings);
        Ok(AnomalyService { settings, manager })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// Never fails on input shape; only a model that cannot be built or
    /// evaluated produces an error.
    pub fn score(&self, req: &ScoreRequest) -> Result<ScoreResponse> {
        let x = extract_vector(req);
        let raw = self.manager.score(&x)?;
        let score = normalize_anomaly(raw);
        let top = top_contributors(&x, self.settings.top_k);
        debug!(?x, raw, score, "score request");

        Ok(ScoreResponse {
            score: round_to(score, SCORE_DIGITS),
            top: top.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn train(&self, req: &TrainRequest) -> Result<TrainResponse> {
        let rows: Vec<FeatureVector> = req.legit.iter().map(row_from_mapping).collect();
        info!(
            legit = req.legit.len(),
            abuse_ignored = req.abuse.len(),
            "train request"
        );
        let trained_on = self.manager.train(&rows)?;
        Ok(TrainResponse {
            ok: true,
            trained_on,
        })
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse { ok: true }
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            ok: true,
            port: self.settings.port,
            model_path: self.settings.model_path.display().to_string(),
            if_trees: self.settings.if_trees,
            if_contamination: self.settings.if_contamination,
            features_order: FEATURES_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Runs one operation and renders its response as JSON.
    pub fn dispatch(&self, op: &Operation) -> Result<Value> {
        let value = match op {
            Operation::Score(req) => serde_json::to_value(self.score(req)?),
            Operation::Train(req) => serde_json::to_value(self.train(req)?),
            Operation::Health => serde_json::to_value(self.health()),
            Operation::Version => serde_json::to_value(self.version()),
        };
        value.map_err(|e| crate::error::Error::Encode(e.to_string()))
    }
}
