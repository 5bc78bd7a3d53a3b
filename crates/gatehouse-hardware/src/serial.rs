//! Serial (HSU) transport for a PN532.
//!
//! `serialport` is blocking, so every operation is moved onto tokio's
//! blocking pool. The port is opened with a short read timeout so a read
//! never occupies a blocking thread for long.

use crate::error::{HardwareError, Result};
use crate::traits::ReaderTransport;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Default PN532 HSU baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

// HSU wake-up: a long preamble followed by SAMConfiguration
const WAKEUP_PREAMBLE: [u8; 16] = [
    0x55, 0x55, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Serial port transport.
#[derive(Clone)]
pub struct SerialTransport {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
    path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .finish()
    }
}

impl SerialTransport {
    /// Open `path` at `baud_rate` and send the HSU wake-up preamble.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened or written.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let mut port = serialport::new(path, baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| HardwareError::initialization_failed(format!("{path}: {e}")))?;

        port.write_all(&WAKEUP_PREAMBLE)?;
        port.flush()?;

        info!(path, baud_rate, "serial reader transport opened");
        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            path: path.to_string(),
        })
    }

    /// Device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn with_port<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn SerialPort>) -> Result<T> + Send + 'static,
    {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut port = port
                .lock()
                .map_err(|_| HardwareError::communication("serial port lock poisoned"))?;
            op(&mut port)
        })
        .await
        .map_err(|e| HardwareError::other(format!("serial task failed: {e}")))?
    }
}

impl ReaderTransport for SerialTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let data = bytes.to_vec();
        self.with_port(move |port| {
            port.write_all(&data)?;
            port.flush()?;
            Ok(())
        })
        .await
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let capacity = buf.len();
        let chunk = self
            .with_port(move |port| {
                let mut chunk = vec![0u8; capacity];
                match port.read(&mut chunk) {
                    Ok(n) => {
                        chunk.truncate(n);
                        Ok(chunk)
                    }
                    Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
                    Err(e) => Err(HardwareError::Io(e)),
                }
            })
            .await?;

        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}
