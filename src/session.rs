//! One training session of a party, from local validation to the opened weights.
use std::time::Duration;

use serde::Serialize;

use crate::assembly::adapter::{adapt, EncodedInput};
use crate::assembly::roles::{LocalDataset, RoleAssignment};
use crate::assembly::{assemble, AssembledDataset};
use crate::error::SessionError;
use crate::network::ConnectedParty;
use crate::party::MainParty;
use crate::protocols::{confirm, open};
use crate::share::fixed::{decode, FRACTIONAL_BITS};
use crate::training::{invoke, Exponentiation, Trainer, TrainingConfig};

/// Everything the parties must agree on before a session starts.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub roles: RoleAssignment,
    pub training: TrainingConfig,
    /// Bound on every wait for a peer.
    pub timeout: Option<Duration>,
    /// Number of worker threads for local computation, `None` for the calling thread only.
    pub threads: Option<usize>,
}

#[derive(Serialize)]
struct ProtocolDescription<'a> {
    roles: &'a RoleAssignment,
    fractional_bits: u32,
    training: &'a TrainingConfig,
}

/// The string compared with both neighbours at setup. Differing parameters make setup fail.
pub fn protocol_string(params: &SessionParams) -> Result<String, SessionError> {
    serde_json::to_string(&ProtocolDescription {
        roles: &params.roles,
        fractional_bits: FRACTIONAL_BITS,
        training: &params.training,
    })
    .map_err(|err| SessionError::ConfigMismatch(err.to_string()))
}

/// The result of training with one exponentiation mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelOutput {
    pub exponentiation: Exponentiation,
    pub solver: String,
    /// Opened weights, intercept first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
    /// Mean training loss of the solver plus the penalty, at the opened weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelOutput {
    fn failed(exponentiation: Exponentiation, solver: &str, error: String) -> Self {
        Self {
            exponentiation,
            solver: solver.to_string(),
            weights: None,
            iterations: 0,
            converged: false,
            objective: None,
            error: Some(error),
        }
    }
}

/// What a party reports at the end of a successful session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutput {
    pub party: usize,
    pub samples: usize,
    pub covariates: usize,
    pub models: Vec<ModelOutput>,
}

struct Prepared {
    encoded: EncodedInput,
    /// Requested modes with the reason why the trainer cannot run them.
    modes: Vec<(Exponentiation, Option<String>)>,
}

/// Validates and encodes the local data. Does not communicate.
fn prepare(
    i: usize,
    params: &SessionParams,
    data: &LocalDataset,
    trainer: &dyn Trainer,
) -> Result<Prepared, SessionError> {
    let training_failed = |cause: String| SessionError::TrainingFailed {
        solver: trainer.solver_name().to_string(),
        cause,
    };
    params.roles.check_dataset(i, data)?;
    params
        .training
        .validate()
        .map_err(|err| training_failed(err.to_string()))?;
    let encoded = adapt(i, data)?;
    let modes: Vec<_> = params
        .training
        .exponentiation
        .iter()
        .map(|&mode| {
            let unsupported = trainer
                .check(&params.training.params(mode))
                .err()
                .map(|err| err.to_string());
            (mode, unsupported)
        })
        .collect();
    if modes.iter().all(|(_, unsupported)| unsupported.is_some()) {
        let causes: Vec<&str> = modes.iter().filter_map(|(_, u)| u.as_deref()).collect();
        return Err(training_failed(causes.join("; ")));
    }
    Ok(Prepared { encoded, modes })
}

fn train_models(
    party: &mut MainParty,
    data: &AssembledDataset,
    params: &SessionParams,
    modes: Vec<(Exponentiation, Option<String>)>,
    trainer: &dyn Trainer,
) -> Result<Vec<ModelOutput>, SessionError> {
    let mut models = Vec::with_capacity(modes.len());
    for (mode, unsupported) in modes {
        if let Some(cause) = unsupported {
            log::warn!("P{}: skipping {:?}: {}", party.i, mode, cause);
            models.push(ModelOutput::failed(mode, trainer.solver_name(), cause));
            continue;
        }
        let training = params.training.params(mode);
        match invoke(trainer, party, data, &training) {
            Ok(model) => {
                let weights: Vec<f64> = open(party, &model.weights)?
                    .into_iter()
                    .map(decode)
                    .collect();
                let objective = model.loss.map(|loss| loss + training.penalty_of(&weights));
                models.push(ModelOutput {
                    exponentiation: mode,
                    solver: trainer.solver_name().to_string(),
                    weights: Some(weights),
                    iterations: model.iterations,
                    converged: model.converged,
                    objective,
                    error: None,
                });
            }
            Err(err @ SessionError::TrainingFailed { .. }) => {
                log::warn!("P{}: {}", party.i, err);
                models.push(ModelOutput::failed(mode, trainer.solver_name(), err.to_string()));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(models)
}

fn run_session(
    party: &mut MainParty,
    params: &SessionParams,
    prepared: Prepared,
    trainer: &dyn Trainer,
) -> Result<SessionOutput, SessionError> {
    let data = assemble(party, &params.roles, prepared.encoded)?;
    if data.samples() == 0 {
        return Err(SessionError::EmptyDataset);
    }
    let models = train_models(party, &data, params, prepared.modes, trainer)?;
    Ok(SessionOutput {
        party: party.i,
        samples: data.samples(),
        covariates: data.covariates(),
        models,
    })
}

/// Closes the session: gracefully unless the channels are in an unknown state.
fn close<T>(party: MainParty, result: Result<T, SessionError>) -> Result<T, SessionError> {
    match result {
        Err(err) if err.is_transport_failure() => {
            party.abort();
            Err(err)
        }
        result => match party.teardown() {
            Ok(_) => result,
            Err(err) => match result {
                Ok(_) => Err(err.into()),
                Err(session_err) => {
                    log::debug!("teardown after failed session: {}", err);
                    Err(session_err)
                }
            },
        },
    }
}

/// Runs a complete session on `connected` with the local `data` of the party.
///
/// Local validation happens before the first message and its outcome is announced to the
/// peers, so a party with invalid data stops all parties before anything is shared.
pub fn run_party(
    connected: ConnectedParty,
    params: &SessionParams,
    data: &LocalDataset,
    trainer: &dyn Trainer,
) -> Result<SessionOutput, SessionError> {
    let i = connected.i;
    let prepared = prepare(i, params, data, trainer);
    let prot_string = protocol_string(params)?;
    let mut party = MainParty::setup(connected, params.threads, Some(prot_string), params.timeout)?;

    let result = confirm(&mut party, prepared)
        .and_then(|prepared| run_session(&mut party, params, prepared, trainer));
    close(party, result)
}
