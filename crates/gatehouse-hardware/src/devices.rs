//! Enum wrappers for hardware device dispatch.
//!
//! Traits with `impl Future` methods are not object-safe, so the concrete
//! reader chosen at start-up is carried in an enum instead of a
//! `Box<dyn CardReader>`.
//!
//! # Examples
//!
//! ```
//! use gatehouse_hardware::devices::AnyCardReader;
//! use gatehouse_hardware::mock::MockReader;
//!
//! let (reader, _handle) = MockReader::new();
//! let any_reader = AnyCardReader::Mock(reader);
//! ```

use crate::mock::MockReader;
use crate::traits::CardReader;
use gatehouse_core::CardUid;
use std::time::Duration;

#[cfg(feature = "hardware-serial")]
use crate::{reader::Pn532Reader, serial::SerialTransport};

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    /// Mock reader for development and testing.
    Mock(MockReader),

    /// PN532 on a serial port.
    #[cfg(feature = "hardware-serial")]
    Pn532Serial(Pn532Reader<SerialTransport>),
}

impl CardReader for AnyCardReader {
    async fn read(&mut self, timeout: Duration) -> Option<CardUid> {
        match self {
            Self::Mock(reader) => reader.read(timeout).await,
            #[cfg(feature = "hardware-serial")]
            Self::Pn532Serial(reader) => reader.read(timeout).await,
        }
    }
}

impl From<MockReader> for AnyCardReader {
    fn from(reader: MockReader) -> Self {
        Self::Mock(reader)
    }
}

#[cfg(feature = "hardware-serial")]
impl From<Pn532Reader<SerialTransport>> for AnyCardReader {
    fn from(reader: Pn532Reader<SerialTransport>) -> Self {
        Self::Pn532Serial(reader)
    }
}
