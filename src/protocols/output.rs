use crate::network::task::Direction;
use crate::party::error::MpcResult;
use crate::party::MainParty;
use crate::share::{Ring, RssShare};

/// Opens the shared values to all parties.
pub fn open<R: Ring>(party: &mut MainParty, shares: &[RssShare<R>]) -> MpcResult<Vec<R>> {
    let n = shares.len();
    // send si to P+1, it misses exactly this share
    party.send_field::<R>(Direction::Next, shares.iter().map(|s| &s.si), n);
    let siii = party.receive_field::<R>(Direction::Previous, n).rcv()?;
    let values = shares
        .iter()
        .zip(siii)
        .map(|(s, siii)| s.si + s.sii + siii)
        .collect();
    party.wait_for_completion()?;
    Ok(values)
}

pub fn open_one<R: Ring>(party: &mut MainParty, share: RssShare<R>) -> MpcResult<R> {
    let mut values = open(party, &[share])?;
    Ok(values.pop().unwrap_or(R::ZERO))
}

#[cfg(test)]
mod test {
    use rand::thread_rng;

    use crate::party::test_export::localhost_setup;
    use crate::party::RngExt;
    use crate::share::test::secret_share_vector;
    use crate::share::z64::Z64;
    use crate::share::RssShareVec;

    use super::open;

    #[test]
    fn all_parties_learn_the_value() {
        let mut rng = thread_rng();
        let x: Vec<Z64> = Z64::generate(&mut rng, 100);
        let (s1, s2, s3): (RssShareVec<Z64>, RssShareVec<Z64>, RssShareVec<Z64>) =
            secret_share_vector(&mut rng, &x);
        let (o1, o2, o3) = localhost_setup(
            move |p| open(p, &s1).unwrap(),
            move |p| open(p, &s2).unwrap(),
            move |p| open(p, &s3).unwrap(),
            None,
        );
        assert_eq!(o1, x);
        assert_eq!(o2, x);
        assert_eq!(o3, x);
    }
}
