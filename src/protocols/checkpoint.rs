//! Explicit abort notification between the parties.
use std::fmt;

use crate::network::task::Direction;
use crate::party::error::{MpcError, MpcResult};
use crate::party::MainParty;

const STATUS_OK: u8 = 0;
const STATUS_ABORT: u8 = 1;

/// Exchanges the local status with both neighbours.
///
/// Returns [MpcError::PeerAborted] if a neighbour reports a failure. A party that failed locally
/// calls this with `ok = false`, the result then only tells whether the notification was
/// delivered.
pub fn checkpoint(party: &mut MainParty, ok: bool) -> MpcResult<()> {
    let status = if ok { STATUS_OK } else { STATUS_ABORT };
    let rcv_next = party.io().receive(Direction::Next, 1);
    let rcv_prev = party.io().receive(Direction::Previous, 1);
    party.io().send(Direction::Next, vec![status]);
    party.io().send(Direction::Previous, vec![status]);
    let status_next = rcv_next.recv()?;
    let status_prev = rcv_prev.recv()?;
    party.wait_for_completion()?;

    for (direction, status) in [(Direction::Next, status_next), (Direction::Previous, status_prev)] {
        if status.first() != Some(&STATUS_OK) {
            let peer = party.io().peer(direction);
            log::warn!("P{} received an abort from P{}", party.i, peer);
            return Err(MpcError::PeerAborted { party: peer });
        }
    }
    Ok(())
}

/// Announces the outcome of a local step, so that the parties either all continue or all stop.
///
/// A local error is returned as is, a failed notification is only logged.
pub fn confirm<T, E>(party: &mut MainParty, local: Result<T, E>) -> Result<T, E>
where
    E: From<MpcError> + fmt::Display,
{
    match local {
        Ok(value) => {
            checkpoint(party, true)?;
            Ok(value)
        }
        Err(err) => {
            log::warn!("P{}: {}", party.i, err);
            if let Err(notify) = checkpoint(party, false) {
                log::debug!("P{}: abort notification incomplete: {}", party.i, notify);
            }
            Err(err)
        }
    }
}
