//! Anomaly scoring for coupon redemptions.
//!
//! A request is flattened into a fixed five-dimensional row
//! ([`features::extract`]), scored by an isolation forest
//! ([`models::iforest`]) owned by a [`lifecycle::manager::ModelManager`],
//! normalized onto [0, 1] and explained by its largest deviations from a
//! reference point ([`utils`]).

pub mod config;
pub mod error;
pub mod features;
pub mod lifecycle;
pub mod models;
pub mod service;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::Settings;
pub use error::{Error, Result};
pub use features::extract::{extract_vector, ScoreRequest};
pub use features::schema::{Feature, FeatureVector, FEATURES_ORDER, REFERENCE_CENTER};
pub use lifecycle::manager::ModelManager;
pub use models::base_model::{Detector, OutlierModel};
pub use models::iforest::{IsolationForest, IsolationForestParams};
pub use service::{AnomalyService, Operation, ScoreResponse, TrainRequest, TrainResponse};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python bindings, built with `--features python`.
#[cfg(feature = "python")]
#[pymodule]
fn coupon_anomaly(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<python::AnomalyScorer>()?;
    Ok(())
}
