//! Agreement on the public shape of the assembled dataset.
//!
//! Every party inputs its local sample count as a secret. Only the maximum over all parties is
//! opened, so a party learns neither which nor how many parties hold data.
use crate::error::SessionError;
use crate::party::error::MpcError;
use crate::party::MainParty;
use crate::protocols::{input_from, max, open, Contribution};
use crate::share::bits64::Bits64;
use crate::share::fixed::encode_integer;
use crate::share::z64::Z64;
use crate::share::{HasZero, RssShareVec};

use super::roles::{RoleAssignment, N_PARTIES};

/// The opened sample counts of both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgreedLengths {
    pub features: usize,
    pub labels: usize,
}

fn to_usize(value: u64) -> Result<usize, SessionError> {
    usize::try_from(value).map_err(|_| {
        SessionError::Mpc(MpcError::InvalidParameters(format!(
            "agreed value {} does not fit the platform",
            value
        )))
    })
}

/// Computes the element-wise maximum of `counts` over all parties and opens it.
///
/// All parties must pass the same number of counts.
pub fn agree_maxima(party: &mut MainParty, counts: &[usize]) -> Result<Vec<usize>, SessionError> {
    let local: Vec<Bits64> = counts.iter().map(|c| Bits64(*c as u64)).collect();
    let placeholder = vec![Bits64::ZERO; local.len()];
    let mut inputs: Vec<RssShareVec<Bits64>> = Vec::with_capacity(N_PARTIES);
    for sender in 0..N_PARTIES {
        let contribution = if sender == party.i {
            Contribution::Real(&local)
        } else {
            Contribution::Placeholder(&placeholder)
        };
        inputs.push(input_from(party, sender, contribution)?);
    }
    let mut maxima = inputs.remove(0);
    for other in inputs {
        maxima = max(party, &maxima, &other)?;
    }
    open(party, &maxima)?
        .into_iter()
        .map(|m| to_usize(m.0))
        .collect()
}

/// Agrees on the sample count of one side.
pub fn agree_length(party: &mut MainParty, local_len: usize) -> Result<usize, SessionError> {
    let agreed = agree_maxima(party, &[local_len])?;
    Ok(agreed[0])
}

/// Agrees on the sample counts of the feature side and the label side, independently.
pub fn agree_lengths(
    party: &mut MainParty,
    local_features: usize,
    local_labels: usize,
) -> Result<AgreedLengths, SessionError> {
    let agreed = agree_maxima(party, &[local_features, local_labels])?;
    let lengths = AgreedLengths {
        features: agreed[0],
        labels: agreed[1],
    };
    log::info!(
        "P{}: agreed on {} feature rows and {} labels",
        party.i,
        lengths.features,
        lengths.labels
    );
    Ok(lengths)
}

/// Each feature sender announces its number of covariates, in the order of the role
/// assignment. A feature sender without data announces 0.
pub fn agree_widths(
    party: &mut MainParty,
    roles: &RoleAssignment,
    local_width: Option<usize>,
) -> Result<Vec<usize>, SessionError> {
    let mine = [encode_integer(local_width.unwrap_or(0) as u64)];
    let placeholder = [Z64::ZERO];
    let mut shared = Vec::with_capacity(roles.feature_senders().len());
    for &sender in roles.feature_senders() {
        let contribution = if sender == party.i {
            Contribution::Real(&mine[..])
        } else {
            Contribution::Placeholder(&placeholder[..])
        };
        shared.extend(input_from(party, sender, contribution)?);
    }
    let widths = open(party, &shared)?
        .into_iter()
        .map(|w| to_usize(w.0))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("P{}: feature senders hold {:?} covariates", party.i, widths);
    Ok(widths)
}
