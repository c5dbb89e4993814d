//! Interface between the assembled dataset and a secure logistic regression solver.
pub mod gd;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::AssembledDataset;
use crate::error::SessionError;
use crate::party::error::MpcError;
use crate::party::MainParty;
use crate::share::z64::Z64;
use crate::share::RssShareVec;

/// Regularization of the weights, the intercept is never penalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    None,
    L1,
    L2,
    Elastic,
}

/// The polynomial standing in for the sigmoid of the logistic loss: `exact` is a cubic fit,
/// `approx` the first-order expansion at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exponentiation {
    Exact,
    Approx,
}

/// The training section of a job, identical on all parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub penalty: Penalty,
    /// Regularization strength.
    pub alpha: f64,
    /// Share of the L1 term in the elastic net penalty.
    pub l1_ratio: f64,
    /// Convergence threshold on the norm of the weight update.
    pub tolerance: f64,
    /// The modes to train, one model each, in this order.
    pub exponentiation: Vec<Exponentiation>,
    pub learning_rate: f64,
    pub max_iterations: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            penalty: Penalty::None,
            alpha: 1.0,
            l1_ratio: 0.5,
            tolerance: 1e-4,
            exponentiation: vec![Exponentiation::Exact, Exponentiation::Approx],
            learning_rate: 0.5,
            max_iterations: 100,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        let positive = [
            ("alpha", self.alpha),
            ("tolerance", self.tolerance),
            ("learning_rate", self.learning_rate),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(TrainingError::InvalidParameters(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(TrainingError::InvalidParameters(format!(
                "l1_ratio must be in [0, 1], got {}",
                self.l1_ratio
            )));
        }
        if self.max_iterations == 0 {
            return Err(TrainingError::InvalidParameters(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.exponentiation.is_empty() {
            return Err(TrainingError::InvalidParameters(
                "no exponentiation mode requested".to_string(),
            ));
        }
        Ok(())
    }

    /// The parameters of the run for one exponentiation mode.
    pub fn params(&self, exponentiation: Exponentiation) -> TrainingParams {
        TrainingParams {
            penalty: self.penalty,
            alpha: self.alpha,
            l1_ratio: self.l1_ratio,
            tolerance: self.tolerance,
            exponentiation,
            learning_rate: self.learning_rate,
            max_iterations: self.max_iterations,
        }
    }
}

/// The parameters of a single training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub penalty: Penalty,
    pub alpha: f64,
    pub l1_ratio: f64,
    pub tolerance: f64,
    pub exponentiation: Exponentiation,
    pub learning_rate: f64,
    pub max_iterations: usize,
}

impl TrainingParams {
    /// Strengths `(l1, l2)` of the penalty `l1 |w|_1 + l2 / 2 |w|^2`.
    pub fn penalty_weights(&self) -> (f64, f64) {
        match self.penalty {
            Penalty::None => (0.0, 0.0),
            Penalty::L1 => (self.alpha, 0.0),
            Penalty::L2 => (0.0, self.alpha),
            Penalty::Elastic => (
                self.alpha * self.l1_ratio,
                self.alpha * (1.0 - self.l1_ratio),
            ),
        }
    }

    /// The penalty of plaintext `weights`, intercept first.
    pub fn penalty_of(&self, weights: &[f64]) -> f64 {
        let (l1, l2) = self.penalty_weights();
        let penalized = weights.get(1..).unwrap_or(&[]);
        let abs: f64 = penalized.iter().map(|w| w.abs()).sum();
        let squares: f64 = penalized.iter().map(|w| w * w).sum();
        l1 * abs + l2 / 2.0 * squares
    }
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Mpc(#[from] MpcError),
}

/// Secret-shared weights, intercept first.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub weights: RssShareVec<Z64>,
    pub iterations: usize,
    pub converged: bool,
    /// Opened mean training loss at the final weights, without the penalty.
    pub loss: Option<f64>,
}

/// A secure logistic regression solver.
pub trait Trainer: Sync {
    fn solver_name(&self) -> &str;

    /// Checks locally whether the solver can run with `params`.
    fn check(&self, params: &TrainingParams) -> Result<(), TrainingError>;

    fn train(
        &self,
        party: &mut MainParty,
        data: &AssembledDataset,
        params: &TrainingParams,
    ) -> Result<TrainedModel, TrainingError>;
}

fn training_failed(trainer: &dyn Trainer, cause: impl ToString) -> SessionError {
    SessionError::TrainingFailed {
        solver: trainer.solver_name().to_string(),
        cause: cause.to_string(),
    }
}

/// Runs `trainer` on the assembled dataset and relays its weights.
pub fn invoke(
    trainer: &dyn Trainer,
    party: &mut MainParty,
    data: &AssembledDataset,
    params: &TrainingParams,
) -> Result<TrainedModel, SessionError> {
    trainer
        .check(params)
        .map_err(|err| training_failed(trainer, err))?;
    log::info!(
        "P{}: training {}x{} with {} ({:?})",
        party.i,
        data.samples(),
        data.covariates(),
        trainer.solver_name(),
        params.exponentiation
    );
    let model = trainer.train(party, data, params).map_err(|err| match err {
        TrainingError::Mpc(err) => SessionError::from(err),
        err => training_failed(trainer, err),
    })?;
    if model.weights.len() != data.covariates() + 1 {
        return Err(training_failed(
            trainer,
            format!(
                "returned {} weights for {} covariates",
                model.weights.len(),
                data.covariates()
            ),
        ));
    }
    if !model.converged {
        log::warn!(
            "P{}: {} stopped after {} iterations without reaching the tolerance",
            party.i,
            trainer.solver_name(),
            model.iterations
        );
    }
    Ok(model)
}
