//! Gradient-Boosted Regression Trees
//!
//! Squared-error boosting on top of SmartCore's CART regressor. Each stage
//! fits a shallow tree to the residuals of the ensemble so far and is added
//! with a fixed shrinkage (learning rate).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;

use super::ModelMetadata;
use crate::config::GbmConfig;
use crate::domain::ModelKind;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Boosted ensemble of regression trees
#[derive(Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub metadata: ModelMetadata,
    pub params: GbmConfig,
    feature_names: Vec<String>,
    /// Initial prediction (mean of the training target)
    base_score: f64,
    trees: Vec<Tree>,
}

impl fmt::Debug for GradientBoostedTrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBoostedTrees")
            .field("metadata", &self.metadata)
            .field("params", &self.params)
            .field("n_features", &self.feature_names.len())
            .field("base_score", &self.base_score)
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

impl GradientBoostedTrees {
    fn tree_parameters(params: &GbmConfig) -> DecisionTreeRegressorParameters {
        DecisionTreeRegressorParameters::default()
            .with_max_depth(params.max_depth)
            .with_min_samples_leaf(params.min_samples_leaf)
            .with_min_samples_split(params.min_samples_split)
    }

    /// Fit the ensemble on already-scaled feature rows
    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        params: GbmConfig,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }

        if params.n_estimators == 0 || params.learning_rate <= 0.0 {
            anyhow::bail!(
                "Invalid boosting parameters: n_estimators={}, learning_rate={}",
                params.n_estimators,
                params.learning_rate
            );
        }

        let x_matrix = to_matrix(x, feature_names.len())?;
        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut ensemble = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let tree_params = Self::tree_parameters(&params);

        for stage in 0..params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&ensemble).map(|(t, f)| t - f).collect();

            let tree = Tree::fit(&x_matrix, &residuals, tree_params.clone())
                .map_err(|e| anyhow::anyhow!("Boosting stage {} failed: {:?}", stage, e))?;
            let update = tree
                .predict(&x_matrix)
                .map_err(|e| anyhow::anyhow!("Prediction failed in stage {}: {:?}", stage, e))?;

            for (f, u) in ensemble.iter_mut().zip(update) {
                *f += params.learning_rate * u;
            }
            trees.push(tree);
        }

        tracing::debug!(
            stages = trees.len(),
            samples = y.len(),
            base_score,
            "gradient boosting fitted"
        );

        Ok(Self {
            metadata: ModelMetadata::new(ModelKind::GradientBoosting, y.len()),
            params,
            feature_names,
            base_score,
            trees,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predict every row in one batch
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }

        let x_matrix = to_matrix(x, self.feature_names.len())?;
        let mut out = vec![self.base_score; x.len()];
        for tree in &self.trees {
            let update = tree
                .predict(&x_matrix)
                .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))?;
            for (o, u) in out.iter_mut().zip(update) {
                *o += self.params.learning_rate * u;
            }
        }
        Ok(out)
    }
}

fn to_matrix(x: &[Vec<f64>], n_features: usize) -> Result<DenseMatrix<f64>> {
    let mut flat_data = Vec::with_capacity(x.len() * n_features);
    for row in x {
        if row.len() != n_features {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                n_features,
                row.len()
            );
        }
        flat_data.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(x.len(), n_features, flat_data, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn small_params() -> GbmConfig {
        GbmConfig {
            n_estimators: 30,
            max_depth: 3,
            ..GbmConfig::default()
        }
    }

    fn synthetic() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2x1 + 3x2
        let mut x = Vec::new();
        let mut y = Vec::new();
        for a in 0..8 {
            for b in 0..8 {
                x.push(vec![a as f64, b as f64]);
                y.push(2.0 * a as f64 + 3.0 * b as f64);
            }
        }
        (x, y)
    }

    #[test]
    fn test_boosting_reduces_error() {
        let (x, y) = synthetic();
        let model = GradientBoostedTrees::train(&x, &y, small_params(), names(2)).unwrap();

        assert_eq!(model.n_trees(), 30);
        assert_eq!(model.metadata.training_samples, 64);

        let predictions = model.predict(&x).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let baseline: f64 = y.iter().map(|t| (t - mean).abs()).sum::<f64>() / y.len() as f64;
        let fitted: f64 = y
            .iter()
            .zip(&predictions)
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(fitted < baseline / 4.0, "fitted={fitted} baseline={baseline}");
    }

    #[test]
    fn test_single_stage_moves_towards_target() {
        let (x, y) = synthetic();
        let params = GbmConfig {
            n_estimators: 1,
            ..small_params()
        };
        let model = GradientBoostedTrees::train(&x, &y, params, names(2)).unwrap();
        let p = model.predict(&[vec![7.0, 7.0]]).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert!(p[0] > mean && p[0] < 35.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(GradientBoostedTrees::train(&[], &[], small_params(), names(2)).is_err());
        assert!(GradientBoostedTrees::train(&[vec![1.0, 2.0]], &[1.0, 2.0], small_params(), names(2)).is_err());

        let (x, y) = synthetic();
        let model = GradientBoostedTrees::train(&x, &y, small_params(), names(2)).unwrap();
        assert!(model.predict(&[vec![1.0]]).is_err());
        assert!(model.predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_bincode_round_trip_is_bit_identical() {
        let (x, y) = synthetic();
        let model = GradientBoostedTrees::train(&x, &y, small_params(), names(2)).unwrap();
        let bytes = bincode::serialize(&model).unwrap();
        let restored: GradientBoostedTrees = bincode::deserialize(&bytes).unwrap();

        let probe = vec![vec![1.5, 6.5], vec![3.0, 0.0], vec![-4.0, 20.0]];
        let before = model.predict(&probe).unwrap();
        let after = restored.predict(&probe).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
