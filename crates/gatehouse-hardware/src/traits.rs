//! Hardware device trait definitions.
//!
//! These traits are the seams between the decision loop and the physical gate:
//! a card reader on one side, a lock and a buzzer on the other, and a byte
//! transport underneath the reader. Mock and real implementations are
//! interchangeable behind them.
//!
//! Methods are declared as `fn .. -> impl Future<Output = _> + Send` so that
//! generic callers can move the work onto spawned tasks. Implementations are
//! free to write plain `async fn`.

use crate::error::Result;
use gatehouse_core::CardUid;
use std::future::Future;
use std::time::Duration;

/// A card reader that can be polled for one presented card.
///
/// A read never fails from the caller's point of view. Timeouts, transport
/// faults and malformed replies all come back as `None`, so the decision loop
/// simply tries again on its next cycle.
///
/// # Examples
///
/// ```no_run
/// use gatehouse_hardware::traits::CardReader;
/// use std::time::Duration;
///
/// async fn wait_for_card<R: CardReader>(reader: &mut R) {
///     loop {
///         if let Some(uid) = reader.read(Duration::from_millis(500)).await {
///             println!("card {uid}");
///             break;
///         }
///     }
/// }
/// ```
pub trait CardReader: Send {
    /// Wait up to `timeout` for a card and return its identifier.
    fn read(&mut self, timeout: Duration) -> impl Future<Output = Option<CardUid>> + Send;
}

/// Raw byte transport between the host and a reader chip.
pub trait ReaderTransport: Send {
    /// Write a complete frame to the device.
    fn write_all(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read whatever bytes are currently available.
    ///
    /// Returns `Ok(0)` when the device has nothing to say yet. Implementations
    /// must not block for longer than a short internal poll window.
    fn read_available(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;
}

/// The electrically controlled lock.
///
/// `engaged == true` means the door is locked.
pub trait LockOutput: Send {
    /// Drive the lock relay.
    fn set_engaged(&mut self, engaged: bool) -> impl Future<Output = Result<()>> + Send;
}

/// The feedback buzzer.
pub trait BuzzerOutput: Send {
    /// Switch the tone on or off.
    fn set_tone(&mut self, on: bool) -> impl Future<Output = Result<()>> + Send;
}
