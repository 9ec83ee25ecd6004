// src/python.rs

use std::path::PathBuf;

use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde_json::Value;

use crate::config::Settings;
use crate::error::Error;
use crate::features::extract::ScoreRequest;
use crate::features::schema::{FeatureVector, N_FEATURES};
use crate::service::AnomalyService;

fn runtime_err(err: Error) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

#[pyclass]
pub struct AnomalyScorer {
    inner: AnomalyService,
}

#[pymethods]
impl AnomalyScorer {
    #[new]
    #[pyo3(signature = (
        model_path = None,
        n_estimators = 100,
        contamination = 0.05,
        random_state = 42
    ))]
    fn new(
        model_path: Option<PathBuf>,
        n_estimators: usize,
        contamination: f64,
        random_state: u64,
    ) -> PyResult<Self> {
        let defaults = Settings::default();
        let settings = Settings {
            model_path: model_path.unwrap_or(defaults.model_path.clone()),
            if_trees: n_estimators,
            if_contamination: contamination,
            seed: random_state,
            ..defaults
        };
        let inner = AnomalyService::new(settings)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(AnomalyScorer { inner })
    }

    /// Scores a positional row (length 4 or at least 5). Returns the rounded
    /// score and the top contributing feature names.
    fn score(&self, x: PyReadonlyArray1<f64>) -> PyResult<(f64, Vec<String>)> {
        let xs = x.as_slice()?;
        let req = ScoreRequest {
            x: Some(Value::Array(xs.iter().map(|&v| Value::from(v)).collect())),
            ..ScoreRequest::default()
        };
        let resp = self.inner.score(&req).map_err(runtime_err)?;
        Ok((resp.score, resp.top))
    }

    /// Scores a JSON request object and returns the JSON response.
    fn score_json(&self, request: &str) -> PyResult<String> {
        let value: Value = serde_json::from_str(request)
            .map_err(|e| PyValueError::new_err(format!("invalid JSON: {e}")))?;
        let resp = self
            .inner
            .score(&ScoreRequest::from_value(value))
            .map_err(runtime_err)?;
        serde_json::to_string(&resp).map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    /// Retrains on an (n, 5) matrix of legitimate rows; an empty matrix
    /// retrains on synthetic data. Returns the number of rows fitted.
    fn train(&self, legit: PyReadonlyArray2<f64>) -> PyResult<usize> {
        let view = legit.as_array();
        if view.nrows() > 0 && view.ncols() != N_FEATURES {
            return Err(PyValueError::new_err(format!(
                "Input feature count mismatch. Expected {}, got {}",
                N_FEATURES,
                view.ncols()
            )));
        }

        let rows: Vec<FeatureVector> = view
            .rows()
            .into_iter()
            .map(|r| {
                let mut row = [0.0; N_FEATURES];
                row.iter_mut().zip(r.iter()).for_each(|(dst, src)| *dst = *src);
                FeatureVector::new(row)
            })
            .collect();
        self.inner.manager().train(&rows).map_err(runtime_err)
    }

    fn version(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner.version())
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }
}
