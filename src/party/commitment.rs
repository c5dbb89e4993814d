use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

use crate::party::error::{MpcError, MpcResult};

const COMMITMENT_SEC_PARAM: usize = 128 / 8;
const SHA256_OUTPUT_SIZE: usize = 256 / 8;

pub const COMMITMENT_SIZE: usize = COMMITMENT_SEC_PARAM + SHA256_OUTPUT_SIZE;

/// Hash commitment `r || H(r || msg)` with fresh 128-bit randomness `r`.
pub fn commit<Random: Rng + CryptoRng>(rand: &mut Random, msg: &[u8]) -> Vec<u8> {
    let mut commitment = [0u8; COMMITMENT_SIZE];
    rand.fill_bytes(&mut commitment[..COMMITMENT_SEC_PARAM]);
    let mut hasher = Sha256::new();
    hasher.update(&commitment[..COMMITMENT_SEC_PARAM]);
    hasher.update(msg);
    commitment[COMMITMENT_SEC_PARAM..].copy_from_slice(&hasher.finalize());
    commitment.to_vec()
}

pub fn open(commitment: &[u8], msg: &[u8]) -> MpcResult<()> {
    if commitment.len() != COMMITMENT_SIZE {
        return Err(MpcError::Commitment);
    }
    let mut hasher = Sha256::new();
    hasher.update(&commitment[..COMMITMENT_SEC_PARAM]);
    hasher.update(msg);
    let hash = hasher.finalize();
    if commitment[COMMITMENT_SEC_PARAM..] == hash[..] {
        Ok(())
    } else {
        Err(MpcError::Commitment)
    }
}

#[cfg(test)]
mod test {
    use rand::thread_rng;

    use super::{commit, open};
    use crate::party::error::MpcError;

    #[test]
    fn correctness() {
        let mut rng = thread_rng();
        let seed = [0x5au8; 16];
        for _ in 0..10 {
            let commitment = commit(&mut rng, &seed);
            open(&commitment, &seed).unwrap()
        }
    }

    #[test]
    fn soundness() {
        let mut rng = thread_rng();
        let mut seed = [0x5au8; 16].to_vec();
        let mut commitment = commit(&mut rng, &seed);

        // different message
        seed[5] ^= 0x4;
        assert!(matches!(open(&commitment, &seed), Err(MpcError::Commitment)));

        // different commitment
        seed[5] ^= 0x4;
        commitment[3] ^= 0x80;
        assert!(matches!(open(&commitment, &seed), Err(MpcError::Commitment)));

        // truncated commitment
        assert!(matches!(open(&commitment[..10], &seed), Err(MpcError::Commitment)));
    }
}
