use std::marker::PhantomData;
use std::time::Duration;

use oneshot::RecvTimeoutError;

use crate::party::error::{MpcError, MpcResult};

use super::NetSerializable;

/// Waits for the mailback of a read task, bounded by `timeout` if set.
fn wait(inner: oneshot::Receiver<Vec<u8>>, from: usize, timeout: Option<Duration>) -> MpcResult<Vec<u8>> {
    match timeout {
        Some(waited) => inner.recv_timeout(waited).map_err(|err| match err {
            RecvTimeoutError::Timeout => MpcError::Timeout { party: from, waited },
            RecvTimeoutError::Disconnected => MpcError::ChannelClosed { party: from },
        }),
        None => inner
            .recv()
            .map_err(|_| MpcError::ChannelClosed { party: from }),
    }
}

#[must_use]
pub struct NetVectorReceiver<T: NetSerializable> {
    inner: oneshot::Receiver<Vec<u8>>,
    from: usize,
    timeout: Option<Duration>,
    expected_len: usize,
    phantom: PhantomData<T>,
}

impl<T: NetSerializable> NetVectorReceiver<T> {
    pub fn new(
        inner: oneshot::Receiver<Vec<u8>>,
        from: usize,
        timeout: Option<Duration>,
        expected_len: usize,
    ) -> Self {
        Self {
            inner,
            from,
            timeout,
            expected_len,
            phantom: PhantomData,
        }
    }

    pub fn rcv(self) -> MpcResult<Vec<T>> {
        let bytes = wait(self.inner, self.from, self.timeout)?;
        Ok(T::from_byte_vec(bytes, self.expected_len))
    }
}

#[must_use]
pub struct SliceReceiver<'a> {
    inner: oneshot::Receiver<Vec<u8>>,
    from: usize,
    timeout: Option<Duration>,
    slice: &'a mut [u8],
}

impl<'a> SliceReceiver<'a> {
    pub fn new(
        inner: oneshot::Receiver<Vec<u8>>,
        from: usize,
        timeout: Option<Duration>,
        slice: &'a mut [u8],
    ) -> Self {
        Self {
            inner,
            from,
            timeout,
            slice,
        }
    }

    pub fn rcv(self) -> MpcResult<()> {
        let bytes = wait(self.inner, self.from, self.timeout)?;
        self.slice.copy_from_slice(&bytes);
        Ok(())
    }
}

#[must_use]
pub struct VecReceiver {
    inner: oneshot::Receiver<Vec<u8>>,
    from: usize,
    timeout: Option<Duration>,
}

impl VecReceiver {
    pub fn new(inner: oneshot::Receiver<Vec<u8>>, from: usize, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            from,
            timeout,
        }
    }

    pub fn recv(self) -> MpcResult<Vec<u8>> {
        wait(self.inner, self.from, self.timeout)
    }
}
