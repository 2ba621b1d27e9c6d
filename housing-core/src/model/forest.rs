//! Bagged ensemble of regression trees.
//!
//! Trees are fitted in parallel with rayon. Each tree draws its bootstrap
//! sample from its own RNG (see [`SeedHierarchy`]), so results do not depend
//! on the thread pool size.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::features::FeatureMatrix;
use super::tree::{RegressionTree, TreeParams};
use super::{ModelError, Regressor};
use crate::rng::SeedHierarchy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub random_state: u64,
    pub bootstrap: bool,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            random_state: 42,
            bootstrap: true,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl ForestParams {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub const NAME: &'static str = "RandomForestRegressor";

    pub fn fit(params: &ForestParams, x: &FeatureMatrix, y: &[f64]) -> Result<Self, ModelError> {
        if params.n_estimators == 0 {
            return Err(ModelError::InvalidParams(
                "n_estimators must be at least 1".into(),
            ));
        }
        let n = x.n_rows();
        if n != y.len() {
            return Err(ModelError::FeatureMismatch {
                expected: n,
                actual: y.len(),
            });
        }
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }

        let seeds = SeedHierarchy::new(params.random_state);
        let tree_params = params.tree_params();

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_index| {
                let samples: Vec<usize> = if params.bootstrap {
                    let mut rng = seeds.rng_for_tree(tree_index);
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, &samples, &tree_params)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            params: params.clone(),
            n_features: x.n_features(),
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a model previously written with [`RandomForest::to_json`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl Regressor for RandomForest {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Mean of the per-tree predictions for every row.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if x.n_features() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                actual: x.n_features(),
            });
        }
        let n_trees = self.trees.len() as f64;
        let predictions = (0..x.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let y = (0..n).map(|i| 100.0 + 3.0 * i as f64).collect();
        (FeatureMatrix::from_rows(2, &rows).unwrap(), y)
    }

    fn small(n_estimators: usize, seed: u64) -> ForestParams {
        ForestParams {
            n_estimators,
            random_state: seed,
            ..ForestParams::default()
        }
    }

    #[test]
    fn defaults_match_the_production_model() {
        let p = ForestParams::default();
        assert_eq!(p.n_estimators, 400);
        assert_eq!(p.random_state, 42);
        assert!(p.bootstrap);
        assert_eq!(p.max_depth, None);
    }

    #[test]
    fn same_seed_same_predictions() {
        let (x, y) = linear_data(40);
        let a = RandomForest::fit(&small(16, 42), &x, &y).unwrap();
        let b = RandomForest::fit(&small(16, 42), &x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn different_seed_changes_the_ensemble() {
        let (x, y) = linear_data(40);
        let a = RandomForest::fit(&small(8, 1), &x, &y).unwrap();
        let b = RandomForest::fit(&small(8, 2), &x, &y).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fits_training_data_closely() {
        let (x, y) = linear_data(60);
        let forest = RandomForest::fit(&small(32, 42), &x, &y).unwrap();
        let pred = forest.predict(&x).unwrap();
        let mae = pred.iter().zip(&y).map(|(p, t)| (p - t).abs()).sum::<f64>() / y.len() as f64;
        assert!(mae < 5.0, "mae {mae}");
    }

    #[test]
    fn without_bootstrap_trees_are_identical() {
        let (x, y) = linear_data(20);
        let params = ForestParams {
            bootstrap: false,
            ..small(3, 42)
        };
        let forest = RandomForest::fit(&params, &x, &y).unwrap();
        assert_eq!(forest.trees[0], forest.trees[1]);
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn json_round_trip_preserves_predictions() {
        let (x, y) = linear_data(30);
        let forest = RandomForest::fit(&small(4, 42), &x, &y).unwrap();
        let restored = RandomForest::from_json(&forest.to_json().unwrap()).unwrap();
        assert_eq!(forest.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn load_reads_a_saved_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (x, y) = linear_data(30);
        let forest = RandomForest::fit(&small(4, 42), &x, &y).unwrap();
        std::fs::write(&path, forest.to_json().unwrap()).unwrap();

        let loaded = RandomForest::load(&path).unwrap();
        assert_eq!(loaded.n_trees(), 4);
        assert_eq!(forest.predict(&x).unwrap(), loaded.predict(&x).unwrap());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RandomForest::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn rejects_wrong_feature_count() {
        let (x, y) = linear_data(10);
        let forest = RandomForest::fit(&small(2, 42), &x, &y).unwrap();
        let narrow = FeatureMatrix::from_rows(1, &[vec![1.0]]).unwrap();
        assert!(matches!(
            forest.predict(&narrow),
            Err(ModelError::FeatureMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn rejects_empty_training_set_and_zero_trees() {
        let empty = FeatureMatrix::from_rows(2, &[]).unwrap();
        assert!(matches!(
            RandomForest::fit(&small(2, 42), &empty, &[]),
            Err(ModelError::EmptyTrainingSet)
        ));
        let (x, y) = linear_data(5);
        assert!(matches!(
            RandomForest::fit(&small(0, 42), &x, &y),
            Err(ModelError::InvalidParams(_))
        ));
    }
}
