//! PN532 card reader adapter.
//!
//! Drives a PN532 over any [`ReaderTransport`]: issue a scan, poll the
//! transport until a reply frame arrives or the read deadline passes, and pull
//! the UID out of the reply. Everything that goes wrong on the way is logged
//! and reported as "no card".

use crate::error::{HardwareError, Result};
use crate::pn532::{self, Decoded};
use crate::traits::{CardReader, ReaderTransport};
use bytes::{Buf, BytesMut};
use gatehouse_core::constants::DEFAULT_POLL_INTERVAL_MS;
use gatehouse_core::CardUid;
use std::time::Duration;
use tracing::{debug, trace, warn};

const CHUNK_SIZE: usize = 64;

/// Reader adapter for a PN532 NFC controller.
#[derive(Debug)]
pub struct Pn532Reader<T> {
    transport: T,
    buffer: BytesMut,
    poll_interval: Duration,
}

impl<T: ReaderTransport> Pn532Reader<T> {
    /// Wrap a transport with the default poll interval.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: BytesMut::with_capacity(CHUNK_SIZE * 2),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Set how long to sleep between transport polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Put the chip's SAM into normal mode.
    ///
    /// A PN532 on the HSU interface boots in low-power mode and ignores scan
    /// commands until this has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails or no reply arrives within
    /// `timeout`.
    pub async fn initialize(&mut self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.configure_sam()).await {
            Ok(result) => result,
            Err(_) => Err(HardwareError::timeout(timeout.as_millis() as u64)),
        }
    }

    /// Consume the adapter and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    async fn configure_sam(&mut self) -> Result<()> {
        self.buffer.clear();
        self.transport.write_all(&pn532::sam_configuration()).await?;
        loop {
            if let Some(frame) = self.next_frame().await? {
                if frame.response_code() == Some(pn532::CMD_SAM_CONFIGURATION + 1) {
                    return Ok(());
                }
            }
        }
    }

    async fn scan(&mut self) -> Result<Option<CardUid>> {
        self.buffer.clear();
        self.transport
            .write_all(&pn532::in_list_passive_target())
            .await?;

        loop {
            let Some(frame) = self.next_frame().await? else {
                continue;
            };
            if frame.response_code() == Some(pn532::CMD_IN_LIST_PASSIVE_TARGET + 1) {
                return Ok(pn532::parse_passive_target(&frame));
            }
            trace!(code = ?frame.response_code(), "ignoring unrelated reply frame");
        }
    }

    /// Poll once and return a frame if one is fully buffered.
    ///
    /// Sleeps for the poll interval when nothing is ready yet.
    async fn next_frame(&mut self) -> Result<Option<pn532::InformationFrame>> {
        loop {
            match pn532::decode(&self.buffer) {
                Decoded::Frame { frame, consumed } => {
                    self.buffer.advance(consumed);
                    return Ok(Some(frame));
                }
                Decoded::Ack { consumed } => {
                    self.buffer.advance(consumed);
                }
                Decoded::Malformed { .. } => {
                    self.buffer.clear();
                    return Err(HardwareError::invalid_data("malformed PN532 frame"));
                }
                Decoded::Incomplete { discard } => {
                    self.buffer.advance(discard);
                    break;
                }
            }
        }

        let mut chunk = [0u8; CHUNK_SIZE];
        let n = self.transport.read_available(&mut chunk).await?;
        if n == 0 {
            tokio::time::sleep(self.poll_interval).await;
        } else {
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(None)
    }
}

impl<T: ReaderTransport> CardReader for Pn532Reader<T> {
    async fn read(&mut self, timeout: Duration) -> Option<CardUid> {
        match tokio::time::timeout(timeout, self.scan()).await {
            Ok(Ok(uid)) => {
                if let Some(uid) = &uid {
                    debug!(uid = %uid, "card read");
                }
                uid
            }
            Ok(Err(e)) => {
                warn!(error = %e, "card read failed");
                None
            }
            Err(_) => {
                trace!(timeout_ms = timeout.as_millis() as u64, "no card within timeout");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::pn532::testing::{reply_frame, target_reply};
    use crate::pn532::ACK_FRAME;

    fn reader() -> (Pn532Reader<MockTransport>, crate::mock::MockTransportHandle) {
        let (transport, handle) = MockTransport::new();
        let reader = Pn532Reader::new(transport).with_poll_interval(Duration::from_millis(5));
        (reader, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_returns_uid_from_reply() {
        let (mut reader, handle) = reader();
        handle.push_incoming(&ACK_FRAME);
        handle.push_incoming(&target_reply(&[0xA1, 0xB2, 0xC3]));

        let uid = reader.read(Duration::from_millis(500)).await;
        assert_eq!(uid.unwrap().as_str(), "0xa1b2c3");

        let written = handle.written();
        assert_eq!(written.len(), 1);
        assert_eq!(&written[0][..], &pn532::in_list_passive_target()[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_handles_split_reply() {
        let (mut reader, handle) = reader();
        let reply = target_reply(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let (head, tail) = reply.split_at(5);
        handle.push_incoming(head);

        let pending = tokio::spawn(async move { reader.read(Duration::from_millis(500)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.push_incoming(tail);

        let uid = pending.await.unwrap();
        assert_eq!(uid.unwrap().as_str(), "0x04112233445566");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out_without_reply() {
        let (mut reader, _handle) = reader();
        let started = tokio::time::Instant::now();

        assert_eq!(reader.read(Duration::from_millis(500)).await, None);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_frame_at_deadline_is_no_card() {
        let (mut reader, handle) = reader();
        let reply = target_reply(&[0xDE, 0xAD, 0xBE, 0xEF]);
        handle.push_incoming(&reply[..reply.len() - 3]);

        assert_eq!(reader.read(Duration::from_millis(500)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_no_card() {
        let (mut reader, handle) = reader();
        let mut reply = target_reply(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let dcs = reply.len() - 2;
        reply[dcs] ^= 0xFF;
        handle.push_incoming(&reply);

        assert_eq!(reader.read(Duration::from_millis(500)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_fault_is_no_card() {
        let (mut reader, handle) = reader();
        handle.fail_writes(true);

        assert_eq!(reader.read(Duration::from_millis(500)).await, None);

        handle.fail_writes(false);
        handle.push_incoming(&target_reply(&[0x01, 0x02, 0x03, 0x04]));
        let uid = reader.read(Duration::from_millis(500)).await;
        assert_eq!(uid.unwrap().as_str(), "0x01020304");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_target_reply_is_no_card() {
        let (mut reader, handle) = reader();
        handle.push_incoming(&reply_frame(&[0x4B, 0x00]));

        assert_eq!(reader.read(Duration::from_millis(500)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_waits_for_sam_reply() {
        let (mut reader, handle) = reader();
        handle.push_incoming(&ACK_FRAME);
        handle.push_incoming(&reply_frame(&[0x15]));

        reader.initialize(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&handle.written()[0][..], &pn532::sam_configuration()[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_times_out() {
        let (mut reader, _handle) = reader();
        let err = reader.initialize(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, HardwareError::Timeout { .. }));
    }
}
