//! Grid search with k-fold cross-validation.
//!
//! Candidates are scored in parallel on the rayon pool. The lowest mean
//! validation RMSE wins; ties go to the candidate that comes first in the
//! grid.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use farelab_core::features::FeatureMatrix;
use farelab_core::models::{
    BoostingParams, ForestParams, LinearParams, ModelError, ModelParams, Regressor, TrainedModel,
};

use crate::metrics::rmse;
use crate::split::k_fold;

/// Cross-validation score of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ModelParams,
    pub cv_rmse: f64,
    pub fold_rmse: Vec<f64>,
}

/// Result of a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub best: ModelParams,
    pub best_cv_rmse: f64,
    /// Every candidate, in grid order.
    pub candidates: Vec<CandidateScore>,
}

/// Candidate grid for a family. Parameters not swept keep their `base` value.
pub fn param_grid(base: &ModelParams) -> Vec<ModelParams> {
    match base {
        ModelParams::Linear(_) => [0.01, 0.1, 1.0, 10.0, 100.0]
            .into_iter()
            .map(|alpha| ModelParams::Linear(LinearParams { alpha }))
            .collect(),
        ModelParams::RandomForest(p) => {
            let mut grid = Vec::new();
            for max_depth in [8, 12, 16] {
                for max_features in [0.33, 0.5, 0.8] {
                    grid.push(ModelParams::RandomForest(ForestParams {
                        max_depth,
                        max_features,
                        ..p.clone()
                    }));
                }
            }
            grid
        }
        ModelParams::GradientBoosting(p) => {
            let mut grid = Vec::new();
            for learning_rate in [0.05, 0.1, 0.2] {
                for max_depth in [3, 4, 6] {
                    grid.push(ModelParams::GradientBoosting(BoostingParams {
                        learning_rate,
                        max_depth,
                        ..p.clone()
                    }));
                }
            }
            grid
        }
    }
}

/// Validation RMSE on each fold.
pub fn cross_val_rmse(
    params: &ModelParams,
    data: &FeatureMatrix,
    folds: &[(Vec<usize>, Vec<usize>)],
) -> Result<Vec<f64>, ModelError> {
    folds
        .iter()
        .map(|(train_idx, valid_idx)| {
            let train = data.select(train_idx);
            let valid = data.select(valid_idx);
            let mut model = TrainedModel::from_params(params)?;
            model.fit(&train.rows, &train.targets)?;
            let pred = model.predict(&valid.rows)?;
            Ok(rmse(&valid.targets, &pred))
        })
        .collect()
}

/// Score every candidate of `param_grid(base)` with `k`-fold CV.
pub fn grid_search(
    base: &ModelParams,
    data: &FeatureMatrix,
    k: usize,
    seed: u64,
) -> Result<TuningOutcome, ModelError> {
    if data.len() < k.max(2) {
        return Err(ModelError::EmptyInput);
    }
    let folds = k_fold(data.len(), k, seed);
    let grid = param_grid(base);

    let candidates: Vec<CandidateScore> = grid
        .into_par_iter()
        .map(|params| -> Result<CandidateScore, ModelError> {
            let fold_rmse = cross_val_rmse(&params, data, &folds)?;
            let cv_rmse = fold_rmse.iter().sum::<f64>() / fold_rmse.len() as f64;
            debug!(params = %params.describe(), cv_rmse, "scored candidate");
            Ok(CandidateScore {
                params,
                cv_rmse,
                fold_rmse,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Strict `<` keeps the first of equal scores.
    let mut best = 0;
    for (i, c) in candidates.iter().enumerate() {
        if c.cv_rmse < candidates[best].cv_rmse {
            best = i;
        }
    }
    let winner = &candidates[best];
    tracing::info!(
        candidates = candidates.len(),
        best = %winner.params.describe(),
        cv_rmse = winner.cv_rmse,
        "grid search complete"
    );

    Ok(TuningOutcome {
        best: winner.params.clone(),
        best_cv_rmse: winner.cv_rmse,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use farelab_core::features::FeatureEncoder;
    use farelab_core::synthetic::synthetic_flights;

    fn data(n: usize) -> FeatureMatrix {
        let records = synthetic_flights(n, 11);
        FeatureEncoder::fit(&records).unwrap().transform(&records)
    }

    #[test]
    fn grids_keep_unswept_params() {
        let base = ModelParams::RandomForest(ForestParams {
            n_trees: 7,
            ..ForestParams::default()
        });
        let grid = param_grid(&base);
        assert_eq!(grid.len(), 9);
        for p in &grid {
            match p {
                ModelParams::RandomForest(f) => assert_eq!(f.n_trees, 7),
                other => panic!("wrong family {other:?}"),
            }
        }
        assert_eq!(param_grid(&ModelParams::Linear(LinearParams::default())).len(), 5);
        assert_eq!(param_grid(&ModelParams::GradientBoosting(BoostingParams::default())).len(), 9);
    }

    #[test]
    fn linear_search_picks_minimum_and_keeps_grid_order() {
        let m = data(120);
        let out = grid_search(&ModelParams::Linear(LinearParams::default()), &m, 3, 1).unwrap();
        assert_eq!(out.candidates.len(), 5);

        let alphas: Vec<f64> = out
            .candidates
            .iter()
            .map(|c| match &c.params {
                ModelParams::Linear(p) => p.alpha,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(alphas, vec![0.01, 0.1, 1.0, 10.0, 100.0]);

        let min = out
            .candidates
            .iter()
            .map(|c| c.cv_rmse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(out.best_cv_rmse, min);
        assert!(out.candidates.iter().all(|c| c.fold_rmse.len() == 3));
    }

    #[test]
    fn search_is_deterministic() {
        let m = data(80);
        let base = ModelParams::GradientBoosting(BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        });
        let a = grid_search(&base, &m, 3, 5).unwrap();
        let b = grid_search(&base, &m, 3, 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let m = data(2);
        assert!(grid_search(&ModelParams::Linear(LinearParams::default()), &m, 3, 1).is_err());
    }
}
