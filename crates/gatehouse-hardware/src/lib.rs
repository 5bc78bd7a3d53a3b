//! Hardware abstraction layer for the gate controller.
//!
//! The decision loop talks to three devices: a card reader, a lock relay and
//! a buzzer. This crate defines the traits for them, a PN532 reader adapter
//! (frame codec plus a serial transport), an actuator that plays the grant and
//! deny sequences, and mocks for every device so the rest of the system can be
//! exercised without hardware.
//!
//! # Modules
//!
//! - [`traits`]: `CardReader`, `ReaderTransport`, `LockOutput`, `BuzzerOutput`
//! - [`pn532`]: PN532 host frame encoding and decoding
//! - [`reader`]: [`Pn532Reader`], a `CardReader` over any transport
//! - [`actuator`]: grant/deny sequencing with [`ActuationProfile`] timings
//! - [`devices`]: enum dispatch for the reader chosen at start-up
//! - [`mock`]: test doubles

pub mod actuator;
pub mod devices;
pub mod error;
pub mod mock;
pub mod outputs;
pub mod pn532;
pub mod reader;
#[cfg(feature = "hardware-serial")]
pub mod serial;
pub mod traits;

pub use actuator::{ActuationProfile, Actuator};
pub use devices::AnyCardReader;
pub use error::{HardwareError, Result};
pub use outputs::{LoggingBuzzer, LoggingLock};
pub use reader::Pn532Reader;
pub use traits::{BuzzerOutput, CardReader, LockOutput, ReaderTransport};

#[cfg(feature = "hardware-serial")]
pub use serial::SerialTransport;
