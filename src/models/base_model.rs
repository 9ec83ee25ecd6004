use ndarray::ArrayView2;

use crate::error::Result;

/// A fitted outlier model. Only the decision function is relied upon.
pub trait OutlierModel: Send + Sync {
    /// Row width the model was fitted on.
    fn n_features(&self) -> usize;

    /// Raw outlier score for one row. Negative means more anomalous than
    /// the expected contamination share of the training data.
    fn decision_function(&self, x: &[f64]) -> Result<f64>;

    /// Default: score a batch.
    fn decision_function_batch(&self, xs: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        xs.rows()
            .into_iter()
            .map(|row| self.decision_function(&row.to_vec()))
            .collect()
    }
}

/// Fits a fresh [`OutlierModel`] from a sample matrix (one row per sample).
pub trait Detector {
    type Model: OutlierModel;

    fn fit(&self, samples: ArrayView2<'_, f64>) -> Result<Self::Model>;
}
