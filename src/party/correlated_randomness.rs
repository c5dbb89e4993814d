use rand::{CryptoRng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::network::CommChannel;
use crate::party::commitment;
use crate::party::error::{MpcError, MpcResult};

const CR_SEC_PARAM: usize = 128 / 8;

/// Randomness source shared between two parties, set up via a short random seed that both
/// parties contribute to.
pub struct SharedRng(ChaCha20Rng);

impl SharedRng {
    /// Commit-then-open coin toss with the party on the other end of `channel`.
    ///
    /// The party with the smaller index speaks first, the channel must still be blocking.
    pub fn setup_pairwise<LocalRng: Rng + CryptoRng>(
        rng: &mut LocalRng,
        channel: &mut CommChannel,
        my_id: usize,
        to_id: usize,
    ) -> MpcResult<Self> {
        let mut seed = [0u8; CR_SEC_PARAM];
        rng.fill_bytes(&mut seed);
        let commitment = commitment::commit(rng, &seed);
        let mut other_commit = [0u8; commitment::COMMITMENT_SIZE];
        let mut other_seed = [0u8; CR_SEC_PARAM];
        if my_id < to_id {
            channel.write(&commitment)?;
            channel.read(&mut other_commit)?;
            channel.write(&seed)?;
            channel.read(&mut other_seed)?;
        } else {
            channel.read(&mut other_commit)?;
            channel.write(&commitment)?;
            channel.read(&mut other_seed)?;
            channel.write(&seed)?;
        }

        commitment::open(&other_commit, &other_seed).map_err(|_| MpcError::Commitment)?;
        let mut common_seed = [0u8; 32];
        for i in 0..CR_SEC_PARAM {
            common_seed[i] = seed[i] ^ other_seed[i];
        }
        Ok(Self(ChaCha20Rng::from_seed(common_seed)))
    }
}

impl AsMut<ChaCha20Rng> for SharedRng {
    fn as_mut(&mut self) -> &mut ChaCha20Rng {
        &mut self.0
    }
}
