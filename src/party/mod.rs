//! The party object of a three-party replicated secret-sharing session.
//!
//! A [MainParty] owns the correlated randomness with both neighbours and the background I/O
//! layer. It is created by [MainParty::setup] and must be closed by [MainParty::teardown], or
//! by [MainParty::abort] after a transport failure. Dropping a party that was not closed aborts
//! its channels.
mod commitment;
pub mod correlated_randomness;
pub mod error;

use std::borrow::Borrow;
use std::ops::Sub;
use std::thread;
use std::time::Duration;

use rand::{CryptoRng, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sha2::{Digest, Sha256};

use crate::network::task::{Direction, IoLayerOwned};
use crate::network::{self, ConnectedParty, NetSerializable};
use crate::share::{HasZero, RssShare, RssShareVec};

use self::correlated_randomness::SharedRng;
use self::error::{MpcError, MpcResult};

/// Provides methods to generate random values.
pub trait RngExt: Sized + Clone + HasZero {
    /// Fill the given buffer with random elements.
    fn fill<R: Rng + CryptoRng>(rng: &mut R, buf: &mut [Self]);

    /// Generate a random vector of elements of length `n`.
    fn generate<R: Rng + CryptoRng>(rng: &mut R, n: usize) -> Vec<Self> {
        let mut v = vec![Self::ZERO; n];
        Self::fill(rng, &mut v);
        v
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommStats {
    bytes_received: u64,
    bytes_sent: u64,
    rounds: usize,
}

impl CommStats {
    pub fn new(bytes_received: u64, bytes_sent: u64, rounds: usize) -> Self {
        Self {
            bytes_received,
            bytes_sent,
            rounds,
        }
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombinedCommStats {
    pub prev: CommStats,
    pub next: CommStats,
}

impl CombinedCommStats {
    pub fn log_comm_statistics(&self, i: usize) {
        let p_next = (i + 1) % 3;
        let p_prev = (i + 2) % 3;
        log::debug!(
            "Communication to P{}: {} bytes sent, {} bytes received, {} rounds",
            p_next,
            self.next.bytes_sent,
            self.next.bytes_received,
            self.next.rounds
        );
        log::debug!(
            "Communication to P{}: {} bytes sent, {} bytes received, {} rounds",
            p_prev,
            self.prev.bytes_sent,
            self.prev.bytes_received,
            self.prev.rounds
        );
        log::info!(
            "Total communication: {} bytes sent, {} bytes received",
            self.next.bytes_sent + self.prev.bytes_sent,
            self.next.bytes_received + self.prev.bytes_received
        );
    }
}

pub struct MainParty {
    pub i: usize,
    io: IoLayerOwned,
    random_next: SharedRng,
    random_prev: SharedRng,
    thread_pool: Option<ThreadPool>,
}

#[inline]
fn generate_alpha<T: RngExt + Sub<Output = T>, R: Rng + CryptoRng>(
    next: &mut R,
    prev: &mut R,
    n: usize,
) -> impl Iterator<Item = T> {
    T::generate(next, n)
        .into_iter()
        .zip(T::generate(prev, n))
        .map(|(next, prev)| next - prev)
}

#[inline]
fn generate_random<T: RngExt, R: Rng + CryptoRng>(
    next: &mut R,
    prev: &mut R,
    n: usize,
) -> RssShareVec<T> {
    let si = T::generate(prev, n);
    let sii = T::generate(next, n);
    si.into_iter()
        .zip(sii)
        .map(|(si, sii)| RssShare::from(si, sii))
        .collect()
}

/// The share of party `i` of the public value `value`.
#[inline]
pub fn constant<F: HasZero>(i: usize, value: F) -> RssShare<F> {
    if i == 0 {
        RssShare::from(value, F::ZERO)
    } else if i == 2 {
        RssShare::from(F::ZERO, value)
    } else {
        RssShare::from(F::ZERO, F::ZERO)
    }
}

impl MainParty {
    /// Sets up the correlated randomness and the I/O layer.
    ///
    /// - `n_worker_threads` - size of the pool for local computation, `Some(0)` uses all cores
    /// - `prot_string` - describes the setup of this party. It is compared with both neighbours
    ///   to detect inconsistent configurations before any input is shared.
    /// - `timeout` - bounds every wait for a message from a neighbour
    pub fn setup(
        mut party: ConnectedParty,
        n_worker_threads: Option<usize>,
        prot_string: Option<String>,
        timeout: Option<Duration>,
    ) -> MpcResult<Self> {
        let mut rng = ChaCha20Rng::from_entropy();
        party.comm_next.set_timeout(timeout)?;
        party.comm_prev.set_timeout(timeout)?;

        let (rand_next, rand_prev) = match party.i {
            0 => {
                let rand01 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_next, 0, 1)?;
                let rand02 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_prev, 0, 2)?;
                (rand01, rand02)
            }
            1 => {
                let rand01 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_prev, 1, 0)?;
                let rand12 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_next, 1, 2)?;
                (rand12, rand01)
            }
            2 => {
                let rand02 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_next, 2, 0)?;
                let rand12 = SharedRng::setup_pairwise(&mut rng, &mut party.comm_prev, 2, 1)?;
                (rand02, rand12)
            }
            i => {
                return Err(MpcError::InvalidParameters(format!(
                    "invalid party index {}",
                    i
                )))
            }
        };

        let thread_pool = n_worker_threads
            .map(Self::build_thread_pool)
            .transpose()?;

        let party = Self {
            i: party.i,
            io: IoLayerOwned::spawn_io(party.comm_prev, party.comm_next, timeout)?,
            random_next: rand_next,
            random_prev: rand_prev,
            thread_pool,
        };

        if let Some(prot_str) = prot_string {
            party.check_protocol_string(&prot_str)?;
        }
        log::debug!("P{} set up", party.i);
        Ok(party)
    }

    fn check_protocol_string(&self, prot_str: &str) -> MpcResult<()> {
        let prot_str_hash: [u8; 32] = Sha256::digest(prot_str.as_bytes()).into();
        let mut prot_str_hash_next = [0u8; 32];
        let mut prot_str_hash_prev = [0u8; 32];
        let rcv_next = self.io.receive_slice(Direction::Next, &mut prot_str_hash_next);
        let rcv_prev = self.io.receive_slice(Direction::Previous, &mut prot_str_hash_prev);
        self.io.send(Direction::Next, prot_str_hash.to_vec());
        self.io.send(Direction::Previous, prot_str_hash.to_vec());
        rcv_next.rcv()?;
        rcv_prev.rcv()?;
        self.wait_for_completion()?;

        if prot_str_hash != prot_str_hash_next || prot_str_hash != prot_str_hash_prev {
            let message = format!(
                "protocol string of P{} does not match the one of its neighbours, check that all parties use the same roles and training configuration. Protocol string: '{}'",
                self.i, prot_str
            );
            log::warn!("{}", message);
            return Err(MpcError::ProtocolMismatch(message));
        }
        Ok(())
    }

    fn build_thread_pool(n_worker_threads: usize) -> MpcResult<ThreadPool> {
        let n_threads = if n_worker_threads == 0 {
            // spawn as many threads as there are cores
            thread::available_parallelism()?.get()
        } else {
            n_worker_threads
        };
        ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("worker-{}", i))
            .build()
            .map_err(|err| MpcError::InvalidParameters(err.to_string()))
    }

    pub fn io(&self) -> &IoLayerOwned {
        &self.io
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.io.timeout()
    }

    pub fn wait_for_completion(&self) -> MpcResult<()> {
        self.io.wait_for_completion()
    }

    /// Runs local computation on the worker pool, if one was configured.
    pub fn run_local<T: Send, F: FnOnce() -> T + Send>(&self, f: F) -> T {
        match &self.thread_pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// returns alpha_i s.t. alpha_1 + alpha_2 + alpha_3 = 0
    pub fn generate_alpha<T: RngExt + Sub<Output = T>>(
        &mut self,
        n: usize,
    ) -> impl Iterator<Item = T> {
        generate_alpha(self.random_next.as_mut(), self.random_prev.as_mut(), n)
    }

    pub fn generate_random<T: RngExt>(&mut self, n: usize) -> RssShareVec<T> {
        generate_random(self.random_next.as_mut(), self.random_prev.as_mut(), n)
    }

    /// Random elements known to this party and its next party.
    pub fn random_next<T: RngExt>(&mut self, n: usize) -> Vec<T> {
        T::generate(self.random_next.as_mut(), n)
    }

    /// Random elements known to this party and its previous party.
    pub fn random_prev<T: RngExt>(&mut self, n: usize) -> Vec<T> {
        T::generate(self.random_prev.as_mut(), n)
    }

    #[inline]
    pub fn constant<F: HasZero>(&self, value: F) -> RssShare<F> {
        constant(self.i, value)
    }

    // I/O
    pub fn send_field<'a, T: NetSerializable + 'a>(
        &self,
        direction: Direction,
        elements: impl IntoIterator<Item = impl Borrow<T>>,
        len: usize,
    ) {
        self.io.send_field(direction, elements, len)
    }

    pub fn receive_field<T: NetSerializable>(
        &self,
        direction: Direction,
        num_elements: usize,
    ) -> network::NetVectorReceiver<T> {
        self.io.receive_field(direction, num_elements)
    }

    /// Completes all pending communication and closes the channels.
    pub fn teardown(self) -> MpcResult<CombinedCommStats> {
        let i = self.i;
        let (nb_prev, nb_next) = self.io.shutdown()?;
        let mut comm_next = nb_next.into_channel()?;
        let mut comm_prev = nb_prev.into_channel()?;
        match i {
            // 01, then 02
            0 => {
                comm_next.teardown()?;
                comm_prev.teardown()?;
            }
            // 01, then 12
            1 => {
                comm_prev.teardown()?;
                comm_next.teardown()?;
            }
            // 02, then 12
            _ => {
                comm_next.teardown()?;
                comm_prev.teardown()?;
            }
        }
        let stats = CombinedCommStats {
            prev: CommStats::new(
                comm_prev.get_bytes_received(),
                comm_prev.get_bytes_sent(),
                comm_prev.get_rounds(),
            ),
            next: CommStats::new(
                comm_next.get_bytes_received(),
                comm_next.get_bytes_sent(),
                comm_next.get_rounds(),
            ),
        };
        stats.log_comm_statistics(i);
        Ok(stats)
    }

    /// Closes the channels without completing pending communication.
    pub fn abort(self) {
        log::warn!("P{} aborts the session", self.i);
        self.io.abort();
    }
}

/// Exposes useful testing functionalities
pub mod test_export {
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;
    use std::time::Duration;

    use crate::network::{Config, ConnectedParty, CreatedParty};

    use super::MainParty;

    pub const TEST_TIMEOUT: Option<Duration> = Some(Duration::from_secs(20));

    /// Connects three parties on localhost over plain TCP and runs `f1`, `f2`, `f3` in their own
    /// threads.
    pub fn localhost_connect<
        T1: Send,
        F1: Send + FnOnce(ConnectedParty) -> T1,
        T2: Send,
        F2: Send + FnOnce(ConnectedParty) -> T2,
        T3: Send,
        F3: Send + FnOnce(ConnectedParty) -> T3,
    >(
        f1: F1,
        f2: F2,
        f3: F3,
    ) -> (T1, T2, T3) {
        let addr = vec![Ipv4Addr::LOCALHOST; 3];
        let party1 = CreatedParty::bind(0, IpAddr::V4(addr[0]), 0).unwrap();
        let party2 = CreatedParty::bind(1, IpAddr::V4(addr[1]), 0).unwrap();
        let party3 = CreatedParty::bind(2, IpAddr::V4(addr[2]), 0).unwrap();

        let ports = vec![
            party1.port().unwrap(),
            party2.port().unwrap(),
            party3.port().unwrap(),
        ];
        let config = Config::new_insecure(addr, ports);

        let (p1_res, p2_res, p3_res) = thread::scope(|scope| {
            let party1 = {
                let config = config.clone();
                thread::Builder::new()
                    .name("party1".to_string())
                    .spawn_scoped(scope, move || {
                        let party1 = party1.connect(config, TEST_TIMEOUT).unwrap();
                        f1(party1)
                    })
                    .unwrap()
            };

            let party2 = {
                let config = config.clone();
                thread::Builder::new()
                    .name("party2".to_string())
                    .spawn_scoped(scope, move || {
                        let party2 = party2.connect(config, TEST_TIMEOUT).unwrap();
                        f2(party2)
                    })
                    .unwrap()
            };

            let party3 = {
                let config = config.clone();
                thread::Builder::new()
                    .name("party3".to_string())
                    .spawn_scoped(scope, move || {
                        let party3 = party3.connect(config, TEST_TIMEOUT).unwrap();
                        f3(party3)
                    })
                    .unwrap()
            };

            // join the party threads
            (party1.join(), party2.join(), party3.join())
        });

        (
            p1_res.expect("party 1 panicked"),
            p2_res.expect("party 2 panicked"),
            p3_res.expect("party 3 panicked"),
        )
    }

    /// Like [localhost_connect], but sets up a [MainParty] for each thread and tears it down
    /// after the closure returns.
    pub fn localhost_setup<
        T1: Send,
        F1: Send + FnOnce(&mut MainParty) -> T1,
        T2: Send,
        F2: Send + FnOnce(&mut MainParty) -> T2,
        T3: Send,
        F3: Send + FnOnce(&mut MainParty) -> T3,
    >(
        f1: F1,
        f2: F2,
        f3: F3,
        n_threads: Option<usize>,
    ) -> (T1, T2, T3) {
        let _f1 = move |p: ConnectedParty| {
            let mut p = MainParty::setup(p, n_threads, None, TEST_TIMEOUT).unwrap();
            let res = f1(&mut p);
            p.teardown().unwrap();
            res
        };
        let _f2 = move |p: ConnectedParty| {
            let mut p = MainParty::setup(p, n_threads, None, TEST_TIMEOUT).unwrap();
            let res = f2(&mut p);
            p.teardown().unwrap();
            res
        };
        let _f3 = move |p: ConnectedParty| {
            let mut p = MainParty::setup(p, n_threads, None, TEST_TIMEOUT).unwrap();
            let res = f3(&mut p);
            p.teardown().unwrap();
            res
        };
        localhost_connect(_f1, _f2, _f3)
    }

    pub fn simple_localhost_setup<F: Send + Clone + Fn(&mut MainParty) -> T, T: Send>(
        f: F,
    ) -> (T, T, T) {
        localhost_setup(f.clone(), f.clone(), f, None)
    }
}

#[cfg(test)]
mod test {
    use rand::RngCore;

    use crate::network::task::Direction;
    use crate::network::ConnectedParty;

    use super::error::MpcError;
    use super::test_export::{localhost_connect, localhost_setup, simple_localhost_setup, TEST_TIMEOUT};
    use super::MainParty;

    #[test]
    fn correct_party_setup() {
        // every party returns 100 bytes of its next and previous shared randomness
        let ((next1, prev1), (next2, prev2), (next3, prev3)) = simple_localhost_setup(|p| {
            let mut next = [0u8; 100];
            let mut prev = [0u8; 100];
            p.random_next.as_mut().fill_bytes(&mut next);
            p.random_prev.as_mut().fill_bytes(&mut prev);
            (next, prev)
        });
        assert_eq!(next1, prev2);
        assert_eq!(next2, prev3);
        assert_eq!(next3, prev1);
        assert_ne!(next1, next2);
        assert_ne!(next2, next3);
    }

    #[test]
    fn correct_party_teardown() {
        fn send_receive_teardown(p: &mut MainParty) {
            let mut buf = vec![0u8; 16];
            p.io().send(Direction::Next, buf.clone());
            let rcv_buf = p.io().receive_slice(Direction::Previous, &mut buf);
            rcv_buf.rcv().unwrap();
            // localhost_setup calls teardown
        }
        localhost_setup(
            send_receive_teardown,
            send_receive_teardown,
            send_receive_teardown,
            None,
        );
    }

    #[test]
    fn runs_local_computation_on_pool() {
        let (a, b, c) = localhost_setup(
            |p| p.run_local(|| rayon::current_num_threads()),
            |p| p.run_local(|| rayon::current_num_threads()),
            |p| p.run_local(|| rayon::current_num_threads()),
            Some(2),
        );
        assert_eq!((a, b, c), (2, 2, 2));
    }

    #[test]
    fn alpha_is_zero_sharing() {
        use crate::share::z64::Z64;
        let (a1, a2, a3) = simple_localhost_setup(|p| p.generate_alpha::<Z64>(10).collect::<Vec<_>>());
        for i in 0..10 {
            assert_eq!(a1[i] + a2[i] + a3[i], Z64(0));
        }
    }

    #[test]
    fn teardown_reports_statistics() {
        let program = |p: &mut MainParty| {
            p.io().send(Direction::Next, vec![1u8; 32]);
            p.io().receive(Direction::Previous, 32).recv().unwrap();
        };
        let (s1, s2, s3) = localhost_connect(
            move |p: ConnectedParty| {
                let mut p = MainParty::setup(p, None, None, TEST_TIMEOUT).unwrap();
                program(&mut p);
                p.teardown().unwrap()
            },
            move |p: ConnectedParty| {
                let mut p = MainParty::setup(p, None, None, TEST_TIMEOUT).unwrap();
                program(&mut p);
                p.teardown().unwrap()
            },
            move |p: ConnectedParty| {
                let mut p = MainParty::setup(p, None, None, TEST_TIMEOUT).unwrap();
                program(&mut p);
                p.teardown().unwrap()
            },
        );
        for stats in [s1, s2, s3] {
            // the pairwise randomness setup is counted as well
            assert!(stats.next.bytes_sent() >= 32);
            assert!(stats.prev.bytes_received() >= 32);
        }
    }

    #[test]
    fn prot_str_check_correct() {
        // use a different prot string for p3
        let prot_str = "test::prot_str_check_correct".to_string();
        let prot_str3 = "test::prot_str_check_incorrect".to_string();

        let program = |prot_str: String| {
            move |p: ConnectedParty| {
                let main_party_res = MainParty::setup(p, None, Some(prot_str), TEST_TIMEOUT);
                match main_party_res {
                    Ok(_) => panic!("expected error"),
                    Err(MpcError::ProtocolMismatch(_)) => (),
                    Err(err) => panic!("expected ProtocolMismatch, got {}", err),
                }
            }
        };
        let ((), (), ()) = localhost_connect(
            program(prot_str.clone()),
            program(prot_str),
            program(prot_str3),
        );
    }

    #[test]
    fn prot_str_check_accepts_equal_strings() {
        let program = |p: ConnectedParty| {
            let party = MainParty::setup(p, None, Some("same".to_string()), TEST_TIMEOUT).unwrap();
            party.teardown().unwrap();
        };
        localhost_connect(program, program, program);
    }
}
