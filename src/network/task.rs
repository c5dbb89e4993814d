//! Background I/O: one thread per neighbour drives a non-blocking channel.
//!
//! The protocol thread enqueues write and read tasks and blocks only on the receivers of its
//! read tasks or on [IoLayerOwned::wait_for_completion]. Both are bounded by the configured
//! timeout. If a channel fails the I/O thread exits and all pending receivers report
//! [MpcError::ChannelClosed].
use std::{
    borrow::Borrow,
    collections::VecDeque,
    fmt::Debug,
    io::{self, ErrorKind, Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, sync_channel, Receiver, RecvError, RecvTimeoutError, Sender, SyncSender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::party::error::{MpcError, MpcResult};

use super::{non_blocking::NonBlockingCommChannel, receiver, CommChannel, NetSerializable};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

pub enum Task {
    Write {
        data: Vec<u8>,
    },
    Read {
        length: usize,
        mailback: oneshot::Sender<Vec<u8>>,
    },
    Sync,
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Read { length, .. } => write!(f, "Read(len={})", length),
            Task::Write { data } => write!(f, "Write(len={})", data.len()),
            Task::Sync => write!(f, "Sync"),
        }
    }
}

struct ReadTask {
    buffer: Vec<u8>,
    offset: usize,
    mailback: oneshot::Sender<Vec<u8>>,
}

impl ReadTask {
    pub fn new(length: usize, mailback: oneshot::Sender<Vec<u8>>) -> Self {
        Self {
            buffer: vec![0u8; length],
            offset: 0,
            mailback,
        }
    }
}

struct WriteTask {
    buffer: Vec<u8>,
    offset: usize,
}

enum State {
    WaitingForTasks,
    Working {
        sync_requested: bool,
        close_requested: bool,
    },
    Sync {
        close_requested: bool,
    },
    Close,
}

impl State {
    pub fn is_working(&self) -> bool {
        matches!(self, Self::Working { .. })
    }
}

fn is_transient(io_err: &io::Error) -> bool {
    io_err.kind() == ErrorKind::WouldBlock || io_err.kind() == ErrorKind::Interrupted
}

struct IoThreadContext {
    comm: NonBlockingCommChannel,
    task_receiver: Receiver<Task>,
    read_queue: VecDeque<ReadTask>,
    write_queue: VecDeque<WriteTask>,
    sync: SyncSender<()>,
    state: State,
    abort: Arc<AtomicBool>,
}

type IoThreadResult = (NonBlockingCommChannel, io::Result<()>);

impl IoThreadContext {
    pub fn new(
        comm: CommChannel,
        task_channel: Receiver<Task>,
        abort: Arc<AtomicBool>,
    ) -> io::Result<(Self, Receiver<()>)> {
        let (send, receive) = sync_channel(0); // bound 0 creates rendez-vouz channel
        Ok((
            Self {
                comm: NonBlockingCommChannel::from_channel(comm)?,
                task_receiver: task_channel,
                read_queue: VecDeque::new(),
                write_queue: VecDeque::new(),
                sync: send,
                state: State::WaitingForTasks,
                abort,
            },
            receive,
        ))
    }

    fn run(mut self) -> IoThreadResult {
        let res = self.handle_io();
        if let Err(io_err) = &res {
            log::debug!("I/O thread for P{} stopped: {}", self.comm.to, io_err);
        }
        // dropping the remaining context disconnects all pending receivers
        (self.comm, res)
    }

    fn handle_io(&mut self) -> io::Result<()> {
        loop {
            if self.abort.load(Ordering::Acquire) {
                return Err(io::Error::new(ErrorKind::Interrupted, "I/O aborted"));
            }
            match self.state {
                State::WaitingForTasks => match self.task_receiver.recv() {
                    Ok(task) => self.add_task(task),
                    // the sender disconnected, this indicates closing
                    Err(RecvError) => self.state = State::Close,
                },
                State::Working {
                    sync_requested,
                    close_requested,
                } => {
                    if self.read_queue.is_empty()
                        && self.write_queue.is_empty()
                        && !self.comm.stream.wants_write()
                    {
                        self.state = if sync_requested {
                            State::Sync { close_requested }
                        } else if close_requested {
                            State::Close
                        } else {
                            State::WaitingForTasks
                        };
                    } else {
                        let mut progress =
                            Self::non_blocking_write(&mut self.comm, &mut self.write_queue)?;
                        progress |= Self::non_blocking_read(&mut self.comm, &mut self.read_queue)?;
                        if self.comm.stream.wants_write() {
                            progress |= Self::non_blocking_write_tls(&mut self.comm)?;
                        }
                        self.add_new_tasks_non_blocking();
                        if !progress {
                            thread::yield_now();
                        }
                    }
                }
                State::Sync { close_requested } => {
                    if self.sync.send(()).is_err() {
                        // nobody waits for the sync anymore
                        return Ok(());
                    }
                    self.state = if close_requested {
                        State::Close
                    } else {
                        State::WaitingForTasks
                    };
                }
                State::Close => {
                    debug_assert!(self.read_queue.is_empty() && self.write_queue.is_empty());
                    return Ok(());
                }
            }
        }
    }

    fn start_working(&mut self) {
        if !self.state.is_working() {
            self.state = State::Working {
                sync_requested: false,
                close_requested: false,
            }
        }
    }

    fn add_task(&mut self, task: Task) {
        match task {
            Task::Read { length, mailback } => {
                self.read_queue.push_back(ReadTask::new(length, mailback));
                self.start_working();
            }
            Task::Write { data } => {
                self.write_queue.push_back(WriteTask {
                    buffer: data,
                    offset: 0,
                });
                self.start_working();
            }
            Task::Sync => {
                self.state = match self.state {
                    // there are tasks left that will be completed before sync
                    State::Working {
                        close_requested, ..
                    } => State::Working {
                        sync_requested: true,
                        close_requested,
                    },
                    _ => State::Sync {
                        close_requested: false,
                    },
                };
            }
        }
    }

    fn add_new_tasks_non_blocking(&mut self) {
        while self.state.is_working() {
            match self.task_receiver.try_recv() {
                Ok(task) => self.add_task(task),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    if let State::Working { sync_requested, .. } = self.state {
                        self.state = State::Working {
                            sync_requested,
                            close_requested: true,
                        }
                    }
                    return;
                }
            }
        }
    }

    /// Returns true if bytes were read.
    fn non_blocking_read(
        channel: &mut NonBlockingCommChannel,
        read_task_queue: &mut VecDeque<ReadTask>,
    ) -> io::Result<bool> {
        let Some(read_task) = read_task_queue.front_mut() else {
            return Ok(false);
        };
        match channel.stream.read(&mut read_task.buffer[read_task.offset..]) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("P{} closed the connection", channel.to),
            )),
            Ok(n) => {
                read_task.offset += n;
                if read_task.offset >= read_task.buffer.len() {
                    if let Some(t) = read_task_queue.pop_front() {
                        channel.bytes_received += t.buffer.len() as u64;
                        channel.rounds += 1;
                        // the receiver may have given up waiting
                        let _ = t.mailback.send(t.buffer);
                    }
                }
                Ok(true)
            }
            Err(io_err) if is_transient(&io_err) => Ok(false),
            Err(io_err) => Err(io_err),
        }
    }

    /// Returns true if bytes were written.
    fn non_blocking_write(
        channel: &mut NonBlockingCommChannel,
        write_task_queue: &mut VecDeque<WriteTask>,
    ) -> io::Result<bool> {
        let Some(write_task) = write_task_queue.front_mut() else {
            return Ok(false);
        };
        match channel.stream.write(&write_task.buffer[write_task.offset..]) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::WriteZero,
                format!("P{} does not accept data", channel.to),
            )),
            Ok(n) => {
                write_task.offset += n;
                if write_task.offset >= write_task.buffer.len() {
                    channel.bytes_sent += write_task.buffer.len() as u64;
                    channel.rounds += 1;
                    write_task_queue.pop_front();
                }
                Ok(true)
            }
            Err(io_err) if is_transient(&io_err) => Ok(false),
            Err(io_err) => Err(io_err),
        }
    }

    fn non_blocking_write_tls(channel: &mut NonBlockingCommChannel) -> io::Result<bool> {
        // the written bytes have been counted in non_blocking_write
        match channel.stream.write_tls() {
            Ok(n) => Ok(n > 0),
            Err(io_err) if is_transient(&io_err) => Ok(false),
            Err(io_err) => Err(io_err),
        }
    }
}

struct IoThreads {
    task_prev_channel: Sender<Task>,
    task_next_channel: Sender<Task>,
    sync_prev_channel: Receiver<()>,
    sync_next_channel: Receiver<()>,
    io_prev_thread_handle: JoinHandle<IoThreadResult>,
    io_next_thread_handle: JoinHandle<IoThreadResult>,
    abort: Arc<AtomicBool>,
}

impl IoThreads {
    fn abort(self) {
        self.abort.store(true, Ordering::Release);
        let Self {
            task_prev_channel,
            task_next_channel,
            sync_prev_channel,
            sync_next_channel,
            io_prev_thread_handle,
            io_next_thread_handle,
            ..
        } = self;
        // wake up threads blocked on the task or sync channels
        drop((task_prev_channel, task_next_channel));
        drop((sync_prev_channel, sync_next_channel));
        // the channels are closed when the returned contexts are dropped
        let _ = io_prev_thread_handle.join();
        let _ = io_next_thread_handle.join();
    }
}

/// Owner of the two I/O threads of a party.
pub struct IoLayerOwned {
    threads: Option<IoThreads>,
    prev: usize,
    next: usize,
    timeout: Option<Duration>,
}

impl IoLayerOwned {
    /// Spawns the I/O threads. Every wait on a receiver or on a sync is bounded by `timeout`.
    pub fn spawn_io(
        comm_prev: CommChannel,
        comm_next: CommChannel,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let prev = comm_prev.to;
        let next = comm_next.to;
        let abort = Arc::new(AtomicBool::new(false));

        let (send_prev, rcv_prev) = channel();
        let (ctx_prev, sync_receiver_prev) = IoThreadContext::new(comm_prev, rcv_prev, abort.clone())?;

        let (send_next, rcv_next) = channel();
        let (ctx_next, sync_receiver_next) = IoThreadContext::new(comm_next, rcv_next, abort.clone())?;

        let handle_prev = thread::Builder::new()
            .name(format!("io-p{}", prev))
            .spawn(move || ctx_prev.run())?;
        let handle_next = thread::Builder::new()
            .name(format!("io-p{}", next))
            .spawn(move || ctx_next.run())?;

        Ok(Self {
            threads: Some(IoThreads {
                task_prev_channel: send_prev,
                task_next_channel: send_next,
                sync_prev_channel: sync_receiver_prev,
                sync_next_channel: sync_receiver_next,
                io_prev_thread_handle: handle_prev,
                io_next_thread_handle: handle_next,
                abort,
            }),
            prev,
            next,
            timeout,
        })
    }

    /// The index of the party in the given direction.
    pub fn peer(&self, direction: Direction) -> usize {
        match direction {
            Direction::Next => self.next,
            Direction::Previous => self.prev,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn task_channel(&self, direction: Direction) -> Option<&Sender<Task>> {
        self.threads.as_ref().map(|threads| match direction {
            Direction::Previous => &threads.task_prev_channel,
            Direction::Next => &threads.task_next_channel,
        })
    }

    fn submit(&self, direction: Direction, task: Task) {
        let sent = self
            .task_channel(direction)
            .map(|channel| channel.send(task).is_ok())
            .unwrap_or(false);
        if !sent {
            // a dropped read task disconnects its receiver
            log::debug!("I/O to P{} is already closed", self.peer(direction));
        }
    }

    pub fn send(&self, direction: Direction, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.submit(direction, Task::Write { data: bytes });
        }
    }

    pub fn send_field<'a, T: NetSerializable + 'a>(
        &self,
        direction: Direction,
        elements: impl IntoIterator<Item = impl Borrow<T>>,
        len: usize,
    ) {
        self.send(direction, T::as_byte_vec(elements, len))
    }

    fn receive_raw(&self, direction: Direction, length: usize) -> oneshot::Receiver<Vec<u8>> {
        let (send, recv) = oneshot::channel();
        if length > 0 {
            self.submit(
                direction,
                Task::Read {
                    length,
                    mailback: send,
                },
            );
        } else {
            // immediately populate recv
            let _ = send.send(Vec::new());
        }
        recv
    }

    pub fn receive(&self, direction: Direction, length: usize) -> receiver::VecReceiver {
        receiver::VecReceiver::new(
            self.receive_raw(direction, length),
            self.peer(direction),
            self.timeout,
        )
    }

    pub fn receive_slice<'a>(
        &self,
        direction: Direction,
        dst: &'a mut [u8],
    ) -> receiver::SliceReceiver<'a> {
        receiver::SliceReceiver::new(
            self.receive_raw(direction, dst.len()),
            self.peer(direction),
            self.timeout,
            dst,
        )
    }

    pub fn receive_field<T: NetSerializable>(
        &self,
        direction: Direction,
        num_elements: usize,
    ) -> receiver::NetVectorReceiver<T> {
        receiver::NetVectorReceiver::new(
            self.receive_raw(direction, T::serialized_size(num_elements)),
            self.peer(direction),
            self.timeout,
            num_elements,
        )
    }

    fn wait_sync(&self, sync: &Receiver<()>, direction: Direction) -> MpcResult<()> {
        let party = self.peer(direction);
        match self.timeout {
            Some(waited) => sync.recv_timeout(waited).map_err(|err| match err {
                RecvTimeoutError::Timeout => MpcError::Timeout { party, waited },
                RecvTimeoutError::Disconnected => MpcError::ChannelClosed { party },
            }),
            None => sync.recv().map_err(|_| MpcError::ChannelClosed { party }),
        }
    }

    /// Blocks until all enqueued reads and writes are completed.
    pub fn wait_for_completion(&self) -> MpcResult<()> {
        let threads = self.threads.as_ref().ok_or(MpcError::ChannelClosed { party: self.next })?;
        threads
            .task_prev_channel
            .send(Task::Sync)
            .map_err(|_| MpcError::ChannelClosed { party: self.prev })?;
        threads
            .task_next_channel
            .send(Task::Sync)
            .map_err(|_| MpcError::ChannelClosed { party: self.next })?;
        self.wait_sync(&threads.sync_prev_channel, Direction::Previous)?;
        self.wait_sync(&threads.sync_next_channel, Direction::Next)
    }

    /// Completes all pending tasks, stops the I/O threads and returns the channels.
    pub fn shutdown(mut self) -> MpcResult<(NonBlockingCommChannel, NonBlockingCommChannel)> {
        self.wait_for_completion()?;
        let threads = self
            .threads
            .take()
            .ok_or(MpcError::ChannelClosed { party: self.next })?;
        // closing the task channels ends the I/O loops
        drop(threads.task_prev_channel);
        drop(threads.task_next_channel);
        let join = |handle: JoinHandle<IoThreadResult>, party: usize| match handle.join() {
            Ok((comm, Ok(()))) => Ok(comm),
            Ok((_, Err(io_err))) => Err(MpcError::Io(io_err)),
            Err(_) => Err(MpcError::ChannelClosed { party }),
        };
        let comm_prev = join(threads.io_prev_thread_handle, self.prev);
        let comm_next = join(threads.io_next_thread_handle, self.next);
        Ok((comm_prev?, comm_next?))
    }

    /// Stops the I/O threads without waiting for pending tasks and closes the channels.
    pub fn abort(mut self) {
        if let Some(threads) = self.threads.take() {
            threads.abort();
        }
    }
}

impl Drop for IoLayerOwned {
    fn drop(&mut self) {
        if let Some(threads) = self.threads.take() {
            threads.abort();
        }
    }
}

#[cfg(test)]
mod test {
    use std::iter::repeat;
    use std::thread;
    use std::time::Duration;

    use itertools::Itertools;
    use rand::{seq::SliceRandom, thread_rng, CryptoRng, Rng};

    use crate::network::{receiver::VecReceiver, CommChannel};
    use crate::party::error::MpcError;
    use crate::party::test_export::localhost_connect;

    use super::{Direction, IoLayerOwned};

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(10));

    fn setup_comm_channels() -> ((CommChannel, CommChannel), (CommChannel, CommChannel)) {
        let (p1, p2, p3) = localhost_connect(|p| p, |p| p, |p| p);
        // we return p1's channels
        let comm_prev = p1.comm_prev;
        let comm_next = p1.comm_next;
        let comm_prev_receiver = p3.comm_next;
        let comm_next_receiver = p2.comm_prev;
        // close the connection between p2 and p3
        drop(p2.comm_next);
        drop(p3.comm_prev);
        (
            (comm_prev, comm_prev_receiver),
            (comm_next, comm_next_receiver),
        )
    }

    fn check_connected(channel1: &mut CommChannel, channel2: &mut CommChannel) {
        let mut res = [0u8];
        channel1.write(&[0x1]).unwrap();
        channel2.read(&mut res).unwrap();
        assert_eq!(&res, &[0x1]);
        channel2.write(&[0x2]).unwrap();
        channel1.read(&mut res).unwrap();
        assert_eq!(&res, &[0x2]);
    }

    fn random_bytes<R: Rng + CryptoRng>(rng: &mut R, length: usize) -> Vec<u8> {
        let mut buf = vec![0u8; length];
        rng.fill_bytes(&mut buf);
        buf
    }

    #[test]
    fn proper_shutdown_when_empty() {
        let ((comm_prev, mut comm_prev_receiver), (comm_next, mut comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, TIMEOUT).unwrap();
        let (nb_prev, nb_next) = io.shutdown().unwrap();
        let mut comm_prev = nb_prev.into_channel().unwrap();
        let mut comm_next = nb_next.into_channel().unwrap();

        check_connected(&mut comm_prev, &mut comm_prev_receiver);
        check_connected(&mut comm_next, &mut comm_next_receiver);
    }

    #[test]
    fn can_read_write_one() {
        let ((comm_prev, mut comm_prev_receiver), (comm_next, _comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, TIMEOUT).unwrap();

        let mut rng = thread_rng();
        const N: usize = 20_000;

        let data_to_read = random_bytes(&mut rng, N);
        comm_prev_receiver.write(&data_to_read).unwrap();
        let data_to_write = random_bytes(&mut rng, N);

        io.send(Direction::Previous, data_to_write.clone());
        let rcv = io.receive(Direction::Previous, data_to_read.len());
        assert_eq!(data_to_read, rcv.recv().unwrap());

        io.wait_for_completion().unwrap();
        let mut actual_write = vec![0u8; N];
        comm_prev_receiver.read(&mut actual_write).unwrap();
        assert_eq!(data_to_write, actual_write);

        // the order of tasks doesn't matter
        comm_prev_receiver.write(&data_to_read).unwrap();
        let rcv = io.receive(Direction::Previous, data_to_read.len());
        io.send(Direction::Previous, data_to_write.clone());
        assert_eq!(data_to_read, rcv.recv().unwrap());

        io.wait_for_completion().unwrap();
        comm_prev_receiver.read(&mut actual_write).unwrap();
        assert_eq!(data_to_write, actual_write);

        io.shutdown().unwrap();
    }

    #[test]
    fn can_read_write_multiple_blocks_prev() {
        let ((comm_prev, mut comm_prev_receiver), (comm_next, _comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, TIMEOUT).unwrap();

        let mut rng = thread_rng();
        const N: usize = 20_000;
        let write_blocks: Vec<_> = (0..10).map(|_| random_bytes(&mut rng, N)).collect();
        let read_blocks: Vec<_> = (0..10).map(|_| random_bytes(&mut rng, N)).collect();

        let read_blocks_copy = read_blocks.clone();
        let write_blocks_copy = write_blocks.clone();
        let other_thread = thread::spawn(move || {
            for buf in read_blocks_copy {
                comm_prev_receiver.write(&buf).unwrap();
            }
            for buf in write_blocks_copy {
                let mut actual = vec![0u8; buf.len()];
                comm_prev_receiver.read(&mut actual).unwrap();
                assert_eq!(buf, actual);
            }
            comm_prev_receiver
        });

        let mut order: Vec<_> = repeat(true)
            .take(read_blocks.len())
            .chain(repeat(false).take(write_blocks.len()))
            .collect();
        order.shuffle(&mut rng);
        let mut writes = write_blocks.iter();
        let mut reads = read_blocks.iter();
        let mut read_handles = Vec::new();
        for is_read in order {
            if is_read {
                let len = reads.next().map(|b| b.len()).unwrap();
                read_handles.push(io.receive(Direction::Previous, len));
            } else {
                io.send(Direction::Previous, writes.next().unwrap().clone());
            }
        }

        io.wait_for_completion().unwrap();
        let _comm_prev_receiver = other_thread.join().unwrap();

        let actual_reads: Vec<_> = read_handles
            .into_iter()
            .map(|h| h.recv().unwrap())
            .collect();
        assert_eq!(read_blocks, actual_reads);
        io.shutdown().unwrap();
    }

    #[test]
    fn io_layer() {
        let (p1, p2, p3) = localhost_connect(|p| p, |p| p, |p| p);

        let io1 = IoLayerOwned::spawn_io(p1.comm_prev, p1.comm_next, TIMEOUT).unwrap();
        let io2 = IoLayerOwned::spawn_io(p2.comm_prev, p2.comm_next, TIMEOUT).unwrap();
        let io3 = IoLayerOwned::spawn_io(p3.comm_prev, p3.comm_next, TIMEOUT).unwrap();

        fn send(
            io: &IoLayerOwned,
            msg_to_prev: String,
            msg_to_next: String,
        ) -> (VecReceiver, VecReceiver) {
            assert_eq!(msg_to_prev.len(), msg_to_next.len());
            let rcv_prev = io.receive(Direction::Previous, msg_to_prev.len());
            io.send(Direction::Next, msg_to_next.as_bytes().to_vec());
            io.send(Direction::Previous, msg_to_prev.as_bytes().to_vec());
            let rcv_next = io.receive(Direction::Next, msg_to_next.len());
            (rcv_prev, rcv_next)
        }

        fn blow_up(msg: &str) -> String {
            repeat(msg).take(1000).join("")
        }

        let (p3p1, p2p1) = send(&io1, blow_up("P1-P3"), blow_up("P1-P2"));
        let (p1p2, p3p2) = send(&io2, blow_up("P2-P1"), blow_up("P2-P3"));
        let (p2p3, p1p3) = send(&io3, blow_up("P3-P2"), blow_up("P3-P1"));

        assert_eq!(blow_up("P3-P1").as_bytes(), p3p1.recv().unwrap());
        assert_eq!(blow_up("P2-P1").as_bytes(), p2p1.recv().unwrap());
        assert_eq!(blow_up("P1-P2").as_bytes(), p1p2.recv().unwrap());
        assert_eq!(blow_up("P3-P2").as_bytes(), p3p2.recv().unwrap());
        assert_eq!(blow_up("P2-P3").as_bytes(), p2p3.recv().unwrap());
        assert_eq!(blow_up("P1-P3").as_bytes(), p1p3.recv().unwrap());

        io1.shutdown().unwrap();
        io2.shutdown().unwrap();
        io3.shutdown().unwrap();
    }

    #[test]
    fn sending_receiving_empty() {
        let ((comm_prev, _comm_prev_receiver), (comm_next, _comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, TIMEOUT).unwrap();
        io.send(Direction::Next, Vec::new());
        io.send(Direction::Previous, Vec::new());
        let rcv_next = io.receive(Direction::Next, 0);
        let rcv_prev = io.receive(Direction::Previous, 0);

        assert!(rcv_next.recv().unwrap().is_empty());
        assert!(rcv_prev.recv().unwrap().is_empty());
        io.wait_for_completion().unwrap();
        io.shutdown().unwrap();
    }

    #[test]
    fn receive_times_out() {
        let ((comm_prev, _comm_prev_receiver), (comm_next, _comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, Some(Duration::from_millis(100))).unwrap();
        let rcv = io.receive(Direction::Next, 8);
        match rcv.recv() {
            Err(MpcError::Timeout { party, .. }) => assert_eq!(party, 1),
            other => panic!("expected timeout, got {:?}", other),
        }
        // the read task is still pending, so the layer can only be aborted
        io.abort();
    }

    #[test]
    fn closed_peer_disconnects_receivers() {
        let ((comm_prev, comm_prev_receiver), (comm_next, _comm_next_receiver)) =
            setup_comm_channels();
        let io = IoLayerOwned::spawn_io(comm_prev, comm_next, TIMEOUT).unwrap();
        drop(comm_prev_receiver);
        let rcv = io.receive(Direction::Previous, 8);
        match rcv.recv() {
            Err(MpcError::ChannelClosed { party }) => assert_eq!(party, 2),
            other => panic!("expected closed channel, got {:?}", other),
        }
        assert!(io.wait_for_completion().is_err());
    }
}
