//! Secret sharing of values known to exactly one party.
use itertools::izip;

use crate::network::task::Direction;
use crate::party::error::{MpcError, MpcResult};
use crate::party::MainParty;
use crate::share::{Ring, RssShareVec};

/// What a party brings to an input step of a designated sender.
#[derive(Debug, Clone, Copy)]
pub enum Contribution<'a, R> {
    /// The sender's values.
    Real(&'a [R]),
    /// Values of the right shape from a party that is not the sender. They are never sent.
    Placeholder(&'a [R]),
}

impl<'a, R> Contribution<'a, R> {
    pub fn len(&self) -> usize {
        match self {
            Self::Real(values) | Self::Placeholder(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Secret-shares the values of `sender`.
///
/// Only the sender may contribute [Contribution::Real], all other parties must contribute a
/// [Contribution::Placeholder] of the same length. A violation is reported before anything is
/// sent.
///
/// The parties derive a random sharing `[r]` from their correlated randomness. The sender's
/// previous party reveals the share the sender is missing, so the sender learns `r` and sends
/// `x - r` folded into its share for the next party.
pub fn input_from<R: Ring>(
    party: &mut MainParty,
    sender: usize,
    contribution: Contribution<R>,
) -> MpcResult<RssShareVec<R>> {
    if sender >= 3 {
        return Err(MpcError::InvalidParameters(format!(
            "invalid input sender P{}",
            sender
        )));
    }
    let values = match (party.i == sender, contribution) {
        (true, Contribution::Real(values)) => Some(values),
        (false, Contribution::Placeholder(_)) => None,
        (false, Contribution::Real(_)) => {
            return Err(MpcError::UnauthorizedInput {
                party: party.i,
                sender,
            })
        }
        (true, Contribution::Placeholder(_)) => {
            return Err(MpcError::InvalidParameters(format!(
                "P{} is the sender and must contribute real values",
                sender
            )))
        }
    };

    let n = contribution.len();
    let mut shares = party.generate_random::<R>(n);
    if let Some(values) = values {
        // receive the missing share of r from P-1
        let missing = party.receive_field::<R>(Direction::Previous, n).rcv()?;
        for (share, x, m) in izip!(shares.iter_mut(), values, missing) {
            let correction = *x - (share.si + share.sii + m);
            share.sii += correction;
        }
        // send sii to P+1
        party.send_field::<R>(Direction::Next, shares.iter().map(|s| &s.sii), n);
    } else if party.i == (sender + 2) % 3 {
        // the sender is P+1
        party.send_field::<R>(Direction::Next, shares.iter().map(|s| &s.si), n);
    } else {
        // the sender is P-1
        let corrected = party.receive_field::<R>(Direction::Previous, n).rcv()?;
        shares
            .iter_mut()
            .zip(corrected)
            .for_each(|(share, si)| share.si = si);
    }
    party.wait_for_completion()?;
    Ok(shares)
}
