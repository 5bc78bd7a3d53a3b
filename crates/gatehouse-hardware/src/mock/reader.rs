//! Mock card reader driven through a channel.

use crate::error::{HardwareError, Result};
use crate::traits::CardReader;
use gatehouse_core::CardUid;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the handle can make the reader see.
#[derive(Debug, Clone)]
enum ReaderEvent {
    Card(CardUid),
    Fault,
}

/// Mock card reader for testing and development.
///
/// # Examples
///
/// ```
/// use gatehouse_hardware::mock::MockReader;
/// use gatehouse_hardware::traits::CardReader;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> gatehouse_hardware::Result<()> {
///     let (mut reader, handle) = MockReader::new();
///
///     handle.present("0xa1b2c3".parse().unwrap()).await?;
///
///     let uid = reader.read(Duration::from_millis(500)).await;
///     assert_eq!(uid.unwrap().as_str(), "0xa1b2c3");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    event_rx: mpsc::Receiver<ReaderEvent>,
}

impl MockReader {
    /// Create a new mock reader and the handle that feeds it.
    pub fn new() -> (Self, MockReaderHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        (Self { event_rx }, MockReaderHandle { event_tx })
    }
}

impl CardReader for MockReader {
    async fn read(&mut self, timeout: Duration) -> Option<CardUid> {
        match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Ok(Some(ReaderEvent::Card(uid))) => Some(uid),
            Ok(Some(ReaderEvent::Fault)) => None,
            Ok(None) => {
                // every handle is gone; behave like an idle reader
                tokio::time::sleep(timeout).await;
                None
            }
            Err(_) => None,
        }
    }
}

/// Handle for controlling a [`MockReader`].
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    event_tx: mpsc::Sender<ReaderEvent>,
}

impl MockReaderHandle {
    /// Present a card to the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present(&self, uid: CardUid) -> Result<()> {
        self.send(ReaderEvent::Card(uid)).await
    }

    /// Make the next read fail as a transport fault would.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn inject_fault(&self) -> Result<()> {
        self.send(ReaderEvent::Fault).await
    }

    async fn send(&self, event: ReaderEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("mock reader"))
    }
}
