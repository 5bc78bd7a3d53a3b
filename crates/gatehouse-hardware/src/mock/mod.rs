//! Mock hardware implementations for testing and development.
//!
//! Each mock comes with a handle (or a shared log) that lets a test drive or
//! observe the device without real hardware attached.

pub mod outputs;
pub mod reader;
pub mod transport;

pub use outputs::{OutputEvent, OutputLog, OutputSignal, RecordingBuzzer, RecordingLock};
pub use reader::{MockReader, MockReaderHandle};
pub use transport::{MockTransport, MockTransportHandle};
