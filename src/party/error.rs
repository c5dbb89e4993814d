use std::io;
use std::time::Duration;

use thiserror::Error;

pub type MpcResult<T> = Result<T, MpcError>;

#[derive(Debug, Error)]
pub enum MpcError {
    #[error("commitment could not be opened")]
    Commitment,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer announced that it stops the session.
    #[error("P{party} aborted the session")]
    PeerAborted { party: usize },
    /// The channel to the peer was closed before the expected message arrived.
    #[error("channel to P{party} closed")]
    ChannelClosed { party: usize },
    #[error("no message from P{party} after {}s", waited.as_secs_f32())]
    Timeout { party: usize, waited: Duration },
    #[error("protocol configuration mismatch: {0}")]
    ProtocolMismatch(String),
    /// Real input was offered by a party that is not the designated sender.
    #[error("P{party} cannot provide input on behalf of P{sender}")]
    UnauthorizedInput { party: usize, sender: usize },
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

impl MpcError {
    /// Returns the index of the peer that caused the error, if known.
    pub fn peer(&self) -> Option<usize> {
        match self {
            Self::PeerAborted { party }
            | Self::ChannelClosed { party }
            | Self::Timeout { party, .. } => Some(*party),
            _ => None,
        }
    }

    /// True if the error leaves the channels in an unknown state, i.e. the party must abort
    /// instead of closing gracefully.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ChannelClosed { .. } | Self::Timeout { .. }
        )
    }
}
