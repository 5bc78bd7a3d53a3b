//! PN532 host frame codec.
//!
//! Normal information frames on the wire look like:
//!
//! ```text
//! 00 00 FF LEN LCS TFI PD0 .. PDn DCS 00
//! ```
//!
//! `LEN` counts `TFI` plus the data bytes, `LEN + LCS == 0 (mod 256)` and
//! `TFI + PD0 + .. + PDn + DCS == 0 (mod 256)`. The host sends `TFI = 0xD4`,
//! the chip answers with `TFI = 0xD5` and the command code plus one.
//!
//! Only the handful of commands the gate needs are implemented: SAM
//! configuration at start-up and `InListPassiveTarget` for a single
//! ISO 14443A target.

use bytes::{BufMut, Bytes, BytesMut};
use gatehouse_core::constants::{MAX_UID_BYTES, MIN_UID_BYTES};
use gatehouse_core::CardUid;

/// Frame identifier for host-to-chip frames.
pub const TFI_HOST: u8 = 0xD4;

/// Frame identifier for chip-to-host frames.
pub const TFI_CHIP: u8 = 0xD5;

/// `SAMConfiguration` command code.
pub const CMD_SAM_CONFIGURATION: u8 = 0x14;

/// `InListPassiveTarget` command code.
pub const CMD_IN_LIST_PASSIVE_TARGET: u8 = 0x4A;

/// ACK frame sent by the chip after accepting a command.
pub const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

const START_CODE: [u8; 2] = [0x00, 0xFF];

/// Build a host-to-chip information frame for `command` with `params`.
///
/// # Examples
///
/// ```
/// use gatehouse_hardware::pn532::encode_command;
///
/// let frame = encode_command(0x4A, &[0x01, 0x00]);
/// assert_eq!(&frame[..], &[0x00, 0x00, 0xFF, 0x04, 0xFC, 0xD4, 0x4A, 0x01, 0x00, 0xE1, 0x00]);
/// ```
pub fn encode_command(command: u8, params: &[u8]) -> Bytes {
    // TFI + command + params
    let len = (2 + params.len()) as u8;
    let mut frame = BytesMut::with_capacity(len as usize + 7);

    frame.put_slice(&[0x00, 0x00, 0xFF]);
    frame.put_u8(len);
    frame.put_u8(len.wrapping_neg());
    frame.put_u8(TFI_HOST);
    frame.put_u8(command);
    frame.put_slice(params);

    let sum = params
        .iter()
        .fold(TFI_HOST.wrapping_add(command), |acc, b| acc.wrapping_add(*b));
    frame.put_u8(sum.wrapping_neg());
    frame.put_u8(0x00);

    frame.freeze()
}

/// Scan command for one ISO 14443A target at 106 kbps.
pub fn in_list_passive_target() -> Bytes {
    encode_command(CMD_IN_LIST_PASSIVE_TARGET, &[0x01, 0x00])
}

/// SAM configuration in normal mode, which wakes the chip from power down.
pub fn sam_configuration() -> Bytes {
    encode_command(CMD_SAM_CONFIGURATION, &[0x01, 0x14, 0x01])
}

/// A decoded chip-to-host information frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationFrame {
    /// Frame identifier (`0xD5` for replies).
    pub tfi: u8,
    /// Data bytes following the identifier, starting with the response code.
    pub data: Vec<u8>,
}

impl InformationFrame {
    /// Response code (command code plus one), if any data is present.
    pub fn response_code(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Result of scanning a receive buffer for the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A checksummed information frame. `consumed` bytes can be dropped.
    Frame {
        frame: InformationFrame,
        consumed: usize,
    },
    /// An ACK or NACK frame.
    Ack { consumed: usize },
    /// Not enough bytes yet. The first `discard` bytes are noise.
    Incomplete { discard: usize },
    /// A frame whose length or data checksum does not add up.
    Malformed { consumed: usize },
}

/// Find and decode the next frame in `buf`.
pub fn decode(buf: &[u8]) -> Decoded {
    let Some(start) = buf.windows(2).position(|w| w == START_CODE) else {
        // a trailing 0x00 may be the first half of a start code
        let keep = usize::from(buf.last() == Some(&0x00));
        return Decoded::Incomplete {
            discard: buf.len() - keep,
        };
    };

    let body = &buf[start + 2..];
    if body.len() < 2 {
        return Decoded::Incomplete { discard: start };
    }

    let (len, lcs) = (body[0], body[1]);
    if (len == 0x00 && lcs == 0xFF) || (len == 0xFF && lcs == 0x00) {
        return Decoded::Ack {
            consumed: start + 4,
        };
    }
    if len.wrapping_add(lcs) != 0 {
        return Decoded::Malformed {
            consumed: start + 2,
        };
    }

    let len = len as usize;
    let total = start + 2 + 2 + len + 1;
    if body.len() < 2 + len + 1 {
        return Decoded::Incomplete { discard: start };
    }

    let payload = &body[2..2 + len];
    let dcs = body[2 + len];
    let sum = payload.iter().fold(dcs, |acc, b| acc.wrapping_add(*b));
    if len == 0 || sum != 0 {
        return Decoded::Malformed { consumed: total };
    }

    Decoded::Frame {
        frame: InformationFrame {
            tfi: payload[0],
            data: payload[1..].to_vec(),
        },
        consumed: total,
    }
}

/// Extract the first target's UID from an `InListPassiveTarget` reply.
///
/// Reply layout after the frame identifier:
/// `4B NbTg Tg SENS_RES(2) SEL_RES NFCIDLength NFCID..`
///
/// Returns `None` when no target was found or the reply is truncated.
pub fn parse_passive_target(frame: &InformationFrame) -> Option<CardUid> {
    if frame.tfi != TFI_CHIP || frame.response_code() != Some(CMD_IN_LIST_PASSIVE_TARGET + 1) {
        return None;
    }

    let data = &frame.data;
    let targets = *data.get(1)?;
    if targets == 0 {
        return None;
    }

    let uid_len = *data.get(6)? as usize;
    if !(MIN_UID_BYTES..=MAX_UID_BYTES).contains(&uid_len) {
        return None;
    }

    let uid = data.get(7..7 + uid_len)?;
    CardUid::from_bytes(uid).ok()
}
