use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::features::schema::{FeatureVector, N_FEATURES};
use crate::lifecycle::store::ModelStore;
use crate::models::base_model::{Detector, OutlierModel};
use crate::models::iforest::IsolationForestParams;
use crate::utils::synthetic::synthetic_population;

/// How a [`ModelManager`] builds models.
#[derive(Debug, Clone)]
pub struct LifecyclePlan<D> {
    /// Detector for cold-start initialization.
    pub init: D,
    /// Detector for explicit retraining.
    pub train: D,
    pub init_rows: usize,
    pub train_rows: usize,
    pub synthetic_seed: u64,
}

impl LifecyclePlan<IsolationForestParams> {
    pub fn from_settings(settings: &Settings) -> Self {
        LifecyclePlan {
            init: settings.init_params(),
            train: settings.train_params(),
            init_rows: settings.init_rows,
            train_rows: settings.train_rows,
            synthetic_seed: settings.seed,
        }
    }
}

/// Owns the current model.
///
/// Starts unloaded. The first score loads the persisted artifact or, failing
/// that, fits one on synthetic data. Readers always see a complete model:
/// `train` publishes its replacement in one atomic swap, so a score racing a
/// train is answered by either the old or the new model. Initialization and
/// replacement are serialized by `write_lock`; the last train wins.
pub struct ModelManager<D: Detector = IsolationForestParams> {
    plan: LifecyclePlan<D>,
    store: ModelStore,
    current: ArcSwapOption<D::Model>,
    write_lock: Mutex<()>,
}

impl ModelManager<IsolationForestParams> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            LifecyclePlan::from_settings(settings),
            ModelStore::new(&settings.model_path),
        )
    }
}

impl<D> ModelManager<D>
where
    D: Detector,
    D::Model: Serialize + DeserializeOwned,
{
    pub fn new(plan: LifecyclePlan<D>, store: ModelStore) -> Self {
        ModelManager {
            plan,
            store,
            current: ArcSwapOption::empty(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Snapshot of the current model, if any.
    pub fn current(&self) -> Option<Arc<D::Model>> {
        self.current.load_full()
    }

    /// Loads the persisted model, or fits and persists a synthetic one when
    /// the artifact is missing, unreadable or of the wrong width.
    pub fn load_or_init(&self) -> Result<Arc<D::Model>> {
        let _guard = self.lock();
        self.load_or_init_locked()
    }

    fn load_or_init_locked(&self) -> Result<Arc<D::Model>> {
        let model = match self.load_persisted() {
            Ok(model) => {
                info!(path = %self.store.path().display(), "model loaded");
                model
            }
            Err(err) => {
                if self.store.exists() {
                    warn!(path = %self.store.path().display(), error = %err, "discarding persisted model");
                }
                info!(rows = self.plan.init_rows, "initializing new model");
                let samples = synthetic_population(self.plan.init_rows, self.plan.synthetic_seed);
                let model = self.plan.init.fit(samples.view())?;
                self.store.save(&model)?;
                info!(path = %self.store.path().display(), "model initialized and saved");
                model
            }
        };

        let model = Arc::new(model);
        self.current.store(Some(Arc::clone(&model)));
        Ok(model)
    }

    fn load_persisted(&self) -> Result<D::Model> {
        let model: D::Model = self.store.load()?;
        if model.n_features() != N_FEATURES {
            return Err(Error::DimensionMismatch {
                expected: N_FEATURES,
                actual: model.n_features(),
            });
        }
        Ok(model)
    }

    /// Current model, running [`Self::load_or_init`] first when unloaded.
    pub fn ensure_loaded(&self) -> Result<Arc<D::Model>> {
        if let Some(model) = self.current.load_full() {
            return Ok(model);
        }
        let _guard = self.lock();
        // Another caller may have finished initializing while we waited.
        if let Some(model) = self.current.load_full() {
            return Ok(model);
        }
        self.load_or_init_locked()
    }

    /// Raw decision-function score for one row.
    pub fn score(&self, x: &FeatureVector) -> Result<f64> {
        let model = self.ensure_loaded()?;
        let raw = model.decision_function(x.as_slice())?;
        debug!(raw, "scored row");
        Ok(raw)
    }

    /// Fits a brand-new model on `rows`, or on synthetic data when `rows` is
    /// empty, persists it and makes it current. Returns the rows used.
    pub fn train(&self, rows: &[FeatureVector]) -> Result<usize> {
        let samples = if rows.is_empty() {
            synthetic_population(self.plan.train_rows, self.plan.synthetic_seed)
        } else {
            Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i].as_slice()[j])
        };
        let trained_on = samples.nrows();

        let _guard = self.lock();
        let model = self.plan.train.fit(samples.view())?;
        self.store.save(&model)?;
        self.current.store(Some(Arc::new(model)));
        info!(trained_on, synthetic = rows.is_empty(), "model retrained");
        Ok(trained_on)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::schema::REFERENCE_CENTER;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            model_path: dir.path().join("model.bin"),
            if_trees: 30,
            ..Settings::default()
        }
    }

    #[test]
    fn cold_start_fits_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));
        assert!(!manager.is_loaded());
        assert!(!manager.store().exists());

        let raw = manager.score(&FeatureVector::new(REFERENCE_CENTER)).unwrap();
        assert!(raw.is_finite());
        assert!(manager.is_loaded());
        assert!(manager.store().exists());
    }

    #[test]
    fn second_load_is_a_noop_on_scores() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));
        let probe = FeatureVector::new([3.0, 4.0, 2.0, 1.0, 40.0]);

        let first = manager.load_or_init().unwrap();
        let a = manager.score(&probe).unwrap();
        let second = manager.load_or_init().unwrap();
        let b = manager.score(&probe).unwrap();

        assert_eq!(*first, *second);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn restart_reloads_the_persisted_model() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir);
        let trained = ModelManager::from_settings(&s);
        trained.train(&[]).unwrap();
        let before = trained.current().unwrap();

        let restarted = ModelManager::from_settings(&s);
        let after = restarted.load_or_init().unwrap();
        assert_eq!(*before, *after);
    }

    #[test]
    fn corrupt_artifact_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir);
        std::fs::write(&s.model_path, b"not a model").unwrap();

        let manager = ModelManager::from_settings(&s);
        let model = manager.load_or_init().unwrap();
        assert_eq!(model.n_features(), N_FEATURES);

        let reloaded: crate::models::iforest::IsolationForest = manager.store().load().unwrap();
        assert_eq!(reloaded, *model);
    }

    #[test]
    fn independent_cold_starts_agree_bit_for_bit() {
        let a_dir = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        let a = ModelManager::from_settings(&settings(&a_dir));
        let b = ModelManager::from_settings(&settings(&b_dir));
        let probe = FeatureVector::new([10.0, 0.0, 3.0, 2.0, 12.0]);

        assert_eq!(
            a.score(&probe).unwrap().to_bits(),
            b.score(&probe).unwrap().to_bits()
        );
    }

    #[test]
    fn train_counts_supplied_or_synthetic_rows() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));

        assert_eq!(manager.train(&[]).unwrap(), 300);

        let rows: Vec<FeatureVector> = (0..12)
            .map(|i| FeatureVector::new([100.0 + f64::from(i), 1.0, 0.0, 0.0, 5.0]))
            .collect();
        assert_eq!(manager.train(&rows).unwrap(), 12);
        assert_eq!(manager.current().unwrap().n_trees(), 50);
    }

    #[test]
    fn train_fits_rows_in_schema_order() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir);
        let manager = ModelManager::from_settings(&s);

        let rows: Vec<FeatureVector> = (0..16)
            .map(|i| {
                let t = f64::from(i);
                FeatureVector::new([90.0 + t, 1.0, t % 3.0, 0.0, 5.0 + t / 4.0])
            })
            .collect();
        manager.train(&rows).unwrap();

        let matrix = Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i].values()[j]);
        let expected = s.train_params().fit(matrix.view()).unwrap();
        assert_eq!(*manager.current().unwrap(), expected);
    }

    #[test]
    fn racing_first_scores_share_one_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));
        let probe = FeatureVector::new([40.0, 2.0, 1.0, 1.0, 9.0]);

        let results: Vec<(u64, Arc<crate::models::iforest::IsolationForest>)> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|_| {
                        scope.spawn(|| {
                            let raw = manager.score(&probe).unwrap();
                            (raw.to_bits(), manager.current().unwrap())
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

        let (bits, model) = &results[0];
        for (other_bits, other_model) in &results {
            assert_eq!(other_bits, bits);
            assert!(Arc::ptr_eq(other_model, model));
        }
    }

    #[test]
    fn scores_during_retrain_see_a_whole_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));
        let probe = FeatureVector::new([0.0, 30.0, 20.0, 10.0, 500.0]);

        std::thread::scope(|scope| {
            for i in 0..3 {
                let manager = &manager;
                scope.spawn(move || {
                    let rows: Vec<FeatureVector> = (0..40)
                        .map(|j| {
                            let t = f64::from(i * 40 + j);
                            FeatureVector::new([100.0 + t, 1.0, 0.0, t % 2.0, 5.0])
                        })
                        .collect();
                    assert_eq!(manager.train(&rows).unwrap(), 40);
                });
            }
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let raw = manager.score(&probe).unwrap();
                        assert!(raw.is_finite());
                        assert!((-1.0..=1.0).contains(&raw), "raw score {raw}");
                    }
                });
            }
        });

        assert_eq!(manager.current().unwrap().n_trees(), 50);
    }

    #[test]
    fn train_replaces_the_current_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_settings(&settings(&dir));
        let before = manager.load_or_init().unwrap();

        let rows = vec![FeatureVector::new([1.0, 2.0, 3.0, 4.0, 5.0]); 20];
        manager.train(&rows).unwrap();
        let after = manager.current().unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_ne!(*before, *after);
    }
}
