use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::party::error::MpcError;

/// The two sides of a vertically partitioned dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Features,
    Labels,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Features => write!(f, "features"),
            Self::Labels => write!(f, "labels"),
        }
    }
}

fn describe_party(party: &Option<usize>) -> String {
    match party {
        Some(i) => format!("P{}", i),
        None => "the session".to_string(),
    }
}

/// Errors of a training session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("P{party}: label {value} is neither in {{0, 1}} nor in {{-1, 1}}")]
    InvalidLabelDomain { party: usize, value: f64 },
    #[error("P{party}: feature value {value} at row {row}, column {column} cannot be encoded")]
    InvalidFeatureValue {
        party: usize,
        row: usize,
        column: usize,
        value: f64,
    },
    #[error("P{party} is not authorized to provide {side}")]
    RoleViolation { party: usize, side: Side },
    #[error("invalid role assignment: {0}")]
    InvalidRoleAssignment(String),
    #[error("{}: expected {expected} rows of {side}, found {actual}", describe_party(.party))]
    LengthMismatch {
        /// The party whose data is inconsistent, `None` if the agreed lengths disagree.
        party: Option<usize>,
        side: Side,
        expected: usize,
        actual: usize,
    },
    #[error("the agreed dataset is empty")]
    EmptyDataset,
    #[error("training with {solver} failed: {cause}")]
    TrainingFailed { solver: String, cause: String },
    #[error("session aborted by {}", describe_party(.party))]
    SessionAborted { party: Option<usize> },
    #[error("no message from P{party} after {}s", .waited.as_secs_f32())]
    Timeout { party: usize, waited: Duration },
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),
    #[error(transparent)]
    Mpc(MpcError),
}

impl SessionError {
    /// The party the error is attributed to, if known.
    pub fn party(&self) -> Option<usize> {
        match self {
            Self::InvalidLabelDomain { party, .. }
            | Self::InvalidFeatureValue { party, .. }
            | Self::RoleViolation { party, .. }
            | Self::Timeout { party, .. } => Some(*party),
            Self::LengthMismatch { party, .. } | Self::SessionAborted { party } => *party,
            Self::Mpc(err) => err.peer(),
            _ => None,
        }
    }

    /// True if the channels to the peers are in an unknown state.
    pub fn is_transport_failure(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::SessionAborted { party } => party.is_none(),
            Self::Mpc(err) => err.is_transport_failure(),
            _ => false,
        }
    }
}

impl From<MpcError> for SessionError {
    fn from(err: MpcError) -> Self {
        match err {
            MpcError::PeerAborted { party } => Self::SessionAborted { party: Some(party) },
            MpcError::Timeout { party, waited } => Self::Timeout { party, waited },
            MpcError::ProtocolMismatch(message) => Self::ConfigMismatch(message),
            err => Self::Mpc(err),
        }
    }
}
