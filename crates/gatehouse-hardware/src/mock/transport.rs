//! Scripted byte transport for exercising the PN532 adapter.

use crate::error::{HardwareError, Result};
use crate::traits::ReaderTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct TransportState {
    incoming: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
}

/// In-memory transport. Bytes pushed through the handle are returned by
/// [`ReaderTransport::read_available`]; frames written are recorded.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Create a transport and its control handle.
    pub fn new() -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(TransportState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockTransportHandle { state },
        )
    }
}

fn lock(state: &Mutex<TransportState>) -> MutexGuard<'_, TransportState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReaderTransport for MockTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(HardwareError::communication("mock transport write failure"));
        }
        state.written.push(bytes.to_vec());
        Ok(())
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Handle for scripting a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransportHandle {
    /// Queue bytes for the adapter to read.
    pub fn push_incoming(&self, bytes: &[u8]) {
        lock(&self.state).incoming.extend(bytes.iter().copied());
    }

    /// Frames written by the adapter so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}
