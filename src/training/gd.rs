//! Logistic regression by gradient descent on replicated shares.
//!
//! The sigmoid is replaced by an odd polynomial `σ(t) ≈ 1/2 + a t - b t³`, so one iteration only
//! needs multiplications, truncations and, for an L1 term, comparisons. `approx` uses the
//! first-order expansion at 0, `exact` a least-squares cubic fit on `[-8, 8]`. With labels in
//! `{-1, 1}` and margins `m_i = <x_i, w>` an iteration computes
//! ```text
//! v_i = y_i σ(-y_i m_i) = y_i / 2 - a m_i + b m_i³
//! z   = w + η/n Σ_i v_i x_i - η l2 w
//! w  <- sign(z) max(|z| - η l1, 0)
//! ```
//! which descends the mean of `ℓ(t) = ln 2 - t/2 + a t²/2 - b t⁴/4` over `t_i = y_i m_i` plus
//! the penalty. The intercept, the first weight, is not penalized. Apart from the final weights
//! only the norm of each update and the final mean loss are opened.
use std::f64::consts::LN_2;

use rayon::prelude::*;

use crate::assembly::{AssembledDataset, SharedMatrix};
use crate::party::error::MpcResult;
use crate::party::MainParty;
use crate::protocols::mul::local_product;
use crate::protocols::{mul_trunc, open_one, relu, truncate, truncate_additive};
use crate::share::fixed::{decode_with, encode, encode_with, FixedPointError, FRACTIONAL_BITS};
use crate::share::z64::Z64;
use crate::share::{HasZero, InnerProduct, RssShare, RssShareVec};

use super::{Exponentiation, TrainedModel, Trainer, TrainingError, TrainingParams};

pub const SOLVER_NAME: &str = "rep3-gd";

/// Precision of the public step constants.
const STEP_BITS: u32 = 32;

/// Coefficients of `σ(t) ≈ 1/2 + linear t - cubic t³`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sigmoid {
    pub linear: f64,
    pub cubic: f64,
}

impl Sigmoid {
    pub fn of(exponentiation: Exponentiation) -> Self {
        match exponentiation {
            Exponentiation::Approx => Self {
                linear: 0.25,
                cubic: 0.0,
            },
            Exponentiation::Exact => Self {
                linear: 0.15012,
                cubic: 0.001593,
            },
        }
    }

    /// `ℓ(t) = ln 2 - t/2 + linear t²/2 - cubic t⁴/4`, whose derivative is `-σ(-t)`.
    pub fn loss(&self, t: f64) -> f64 {
        LN_2 - t / 2.0 + self.linear * t * t / 2.0 - self.cubic * t.powi(4) / 4.0
    }
}

/// The public fixed-point constants of the update and the loss.
struct Coefficients {
    half: Z64,
    linear: Z64,
    cubic: Option<Z64>,
    half_linear: Z64,
    quarter_cubic: Option<Z64>,
}

impl Coefficients {
    fn new(sigmoid: Sigmoid) -> Result<Self, FixedPointError> {
        let cubic = |scale: f64| -> Result<Option<Z64>, FixedPointError> {
            if sigmoid.cubic == 0.0 {
                Ok(None)
            } else {
                encode(sigmoid.cubic * scale).map(Some)
            }
        };
        Ok(Self {
            half: encode(0.5)?,
            linear: encode(sigmoid.linear)?,
            cubic: cubic(1.0)?,
            half_linear: encode(sigmoid.linear / 2.0)?,
            quarter_cubic: cubic(0.25)?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GradientDescent;

fn invalid<E: ToString>(err: E) -> TrainingError {
    TrainingError::InvalidParameters(err.to_string())
}

/// `<x_i, w>` for every row, the intercept column is implicit.
fn margins(
    party: &mut MainParty,
    features: &SharedMatrix,
    one: RssShare<Z64>,
    weights: &[RssShare<Z64>],
) -> MpcResult<RssShareVec<Z64>> {
    let Some((intercept, weights)) = weights.split_first() else {
        return Ok(Vec::new());
    };
    let bias = local_product(&one, intercept);
    let sums: Vec<Z64> = party.run_local(|| {
        (0..features.rows())
            .into_par_iter()
            .map(|r| Z64::weak_inner_product(features.row(r), weights) + bias)
            .collect()
    });
    truncate_additive(party, sums, FRACTIONAL_BITS)
}

/// `v_i = y_i / 2 - a m_i + b m_i³`, using `y_i² = 1`.
fn residuals(
    party: &mut MainParty,
    coefficients: &Coefficients,
    labels: &[RssShare<Z64>],
    m: &[RssShare<Z64>],
) -> MpcResult<RssShareVec<Z64>> {
    let mut terms: RssShareVec<Z64> = labels
        .iter()
        .zip(m)
        .map(|(y, m)| *y * coefficients.half - *m * coefficients.linear)
        .collect();
    if let Some(cubic) = coefficients.cubic {
        let squares = mul_trunc(party, m, m, FRACTIONAL_BITS)?;
        let cubes = mul_trunc(party, &squares, m, FRACTIONAL_BITS)?;
        for (term, cube) in terms.iter_mut().zip(cubes) {
            *term += cube * cubic;
        }
    }
    truncate(party, &terms, FRACTIONAL_BITS)
}

/// `Σ_i v_i x_ij` for the intercept column and every feature column.
fn gradient_sums(
    party: &mut MainParty,
    columns: &[RssShareVec<Z64>],
    one: RssShare<Z64>,
    v: &[RssShare<Z64>],
) -> MpcResult<RssShareVec<Z64>> {
    let mut sums = vec![v
        .iter()
        .fold(Z64::ZERO, |acc, v| acc + local_product(&one, v))];
    sums.extend(party.run_local(|| {
        columns
            .par_iter()
            .map(|column| Z64::weak_inner_product(column, v))
            .collect::<Vec<_>>()
    }));
    truncate_additive(party, sums, FRACTIONAL_BITS)
}

/// `sign(z) max(|z| - λ, 0) = relu(z - λ) - relu(-z - λ)` element-wise.
fn soft_threshold(
    party: &mut MainParty,
    z: &[RssShare<Z64>],
    threshold: RssShare<Z64>,
) -> MpcResult<RssShareVec<Z64>> {
    let mut shifted: RssShareVec<Z64> = z.iter().map(|z| *z - threshold).collect();
    shifted.extend(z.iter().map(|z| -*z - threshold));
    let mut upper = relu(party, &shifted)?;
    let lower = upper.split_off(z.len());
    Ok(upper.into_iter().zip(lower).map(|(u, l)| u - l).collect())
}

/// Opens the euclidean norm of the update.
fn update_norm(party: &mut MainParty, delta: &[RssShare<Z64>]) -> MpcResult<f64> {
    let squared = Z64::weak_inner_product(delta, delta);
    // no truncation, the opened value carries twice the fractional bits
    let mut shared = truncate_additive(party, vec![squared], 0)?;
    let squared = open_one(party, shared.pop().unwrap_or(RssShare::ZERO))?;
    Ok(decode_with(squared, 2 * FRACTIONAL_BITS).max(0.0).sqrt())
}

/// Opens the mean of `ℓ(y_i m_i)` over all samples.
fn mean_loss(
    party: &mut MainParty,
    coefficients: &Coefficients,
    labels: &[RssShare<Z64>],
    m: &[RssShare<Z64>],
) -> MpcResult<f64> {
    let n = m.len();
    let mut lhs = m.to_vec();
    lhs.extend_from_slice(labels);
    let mut rhs = m.to_vec();
    rhs.extend_from_slice(m);
    let mut squares = mul_trunc(party, &lhs, &rhs, FRACTIONAL_BITS)?;
    let margins_signed = squares.split_off(n);

    let mut total = RssShare::ZERO;
    for (square, t) in squares.iter().zip(&margins_signed) {
        total += *square * coefficients.half_linear - *t * coefficients.half;
    }
    if let Some(quarter_cubic) = coefficients.quarter_cubic {
        for fourth in mul_trunc(party, &squares, &squares, FRACTIONAL_BITS)? {
            total -= fourth * quarter_cubic;
        }
    }
    // the sum carries twice the fractional bits
    let total = open_one(party, total)?;
    Ok(LN_2 + decode_with(total, 2 * FRACTIONAL_BITS) / n.max(1) as f64)
}

impl Trainer for GradientDescent {
    fn solver_name(&self) -> &str {
        SOLVER_NAME
    }

    fn check(&self, params: &TrainingParams) -> Result<(), TrainingError> {
        for (name, value) in [
            ("alpha", params.alpha),
            ("tolerance", params.tolerance),
            ("learning_rate", params.learning_rate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrainingError::InvalidParameters(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&params.l1_ratio) {
            return Err(TrainingError::InvalidParameters(format!(
                "l1_ratio must be in [0, 1], got {}",
                params.l1_ratio
            )));
        }
        if params.max_iterations == 0 {
            return Err(TrainingError::InvalidParameters(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn train(
        &self,
        party: &mut MainParty,
        data: &AssembledDataset,
        params: &TrainingParams,
    ) -> Result<TrainedModel, TrainingError> {
        self.check(params)?;
        let n = data.samples();
        if n == 0 {
            return Err(TrainingError::InvalidParameters(
                "cannot train on an empty dataset".to_string(),
            ));
        }
        let coefficients =
            Coefficients::new(Sigmoid::of(params.exponentiation)).map_err(invalid)?;
        let (l1, l2) = params.penalty_weights();
        let step = encode_with(params.learning_rate / n as f64, STEP_BITS).map_err(invalid)?;
        let decay = encode_with(params.learning_rate * l2, STEP_BITS).map_err(invalid)?;
        let threshold = if l1 > 0.0 {
            let threshold = encode(params.learning_rate * l1).map_err(invalid)?;
            Some(party.constant(threshold))
        } else {
            None
        };
        let one = party.constant(encode(1.0).map_err(invalid)?);
        let columns: Vec<RssShareVec<Z64>> = (0..data.covariates())
            .map(|c| data.features.column(c).copied().collect())
            .collect();

        let mut weights = vec![RssShare::ZERO; data.covariates() + 1];
        let mut iterations = params.max_iterations;
        let mut converged = false;
        for iteration in 1..=params.max_iterations {
            let m = margins(party, &data.features, one, &weights)?;
            let v = residuals(party, &coefficients, &data.labels, &m)?;
            let sums = gradient_sums(party, &columns, one, &v)?;

            let scaled: RssShareVec<Z64> = sums
                .into_iter()
                .zip(&weights)
                .enumerate()
                .map(|(j, (sum, w))| {
                    if j == 0 {
                        sum * step
                    } else {
                        sum * step - *w * decay
                    }
                })
                .collect();
            let mut next: RssShareVec<Z64> = truncate(party, &scaled, STEP_BITS)?
                .into_iter()
                .zip(&weights)
                .map(|(d, w)| *w + d)
                .collect();
            if let Some(threshold) = threshold {
                let shrunk = soft_threshold(party, &next[1..], threshold)?;
                next.truncate(1);
                next.extend(shrunk);
            }
            let delta: RssShareVec<Z64> = next.iter().zip(&weights).map(|(n, w)| *n - *w).collect();
            weights = next;

            let norm = update_norm(party, &delta)?;
            log::debug!("P{}: iteration {}, update norm {:.6}", party.i, iteration, norm);
            if norm < params.tolerance {
                log::info!("P{}: converged after {} iterations", party.i, iteration);
                iterations = iteration;
                converged = true;
                break;
            }
        }

        let m = margins(party, &data.features, one, &weights)?;
        let loss = mean_loss(party, &coefficients, &data.labels, &m)?;
        log::info!("P{}: mean training loss {:.6}", party.i, loss);
        Ok(TrainedModel {
            weights,
            iterations,
            converged,
            loss: Some(loss),
        })
    }
}
