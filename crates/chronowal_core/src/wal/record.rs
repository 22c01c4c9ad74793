//! Record fragment framing.
//!
//! Every fragment is a 7-byte header followed by its payload:
//!
//! ```text
//! | kind (1) | length (2, BE) | crc32c of payload (4, BE) | payload (length) |
//! ```
//!
//! A record that fits in the free space of a page is written as one `Full`
//! fragment. Larger records are split into `First`, zero or more `Middle`,
//! and one `Last` fragment, each filling the rest of its page.

use crate::error::FrameError;
use chronowal_storage::PAGE_SIZE;
use std::fmt;

/// Size of a fragment header in bytes.
pub const HEADER_SIZE: usize = 7;

/// The kind of a record fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FragmentKind {
    /// The rest of the page is zero padding.
    Terminator = 0,
    /// A whole record.
    Full = 1,
    /// First fragment of a split record.
    First = 2,
    /// Inner fragment of a split record.
    Middle = 3,
    /// Final fragment of a split record.
    Last = 4,
}

impl FragmentKind {
    /// Returns the byte representation.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parses a kind from its byte representation.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Terminator),
            1 => Some(Self::Full),
            2 => Some(Self::First),
            3 => Some(Self::Middle),
            4 => Some(Self::Last),
            _ => None,
        }
    }

    /// Picks the kind for a fragment given whether it starts and ends its
    /// record.
    #[must_use]
    pub const fn for_position(first: bool, last: bool) -> Self {
        match (first, last) {
            (true, true) => Self::Full,
            (true, false) => Self::First,
            (false, false) => Self::Middle,
            (false, true) => Self::Last,
        }
    }

    /// Returns true if this fragment completes a record.
    #[must_use]
    pub const fn ends_record(self) -> bool {
        matches!(self, Self::Full | Self::Last)
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Terminator => "zero",
            Self::Full => "full",
            Self::First => "first",
            Self::Middle => "middle",
            Self::Last => "last",
        };
        f.write_str(name)
    }
}

/// A decoded fragment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Fragment kind.
    pub kind: FragmentKind,
    /// Payload length in bytes.
    pub len: u16,
    /// CRC32C of the payload.
    pub crc: u32,
}

impl FragmentHeader {
    /// Builds the header for `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::LengthTooLarge`] if the payload length does not
    /// fit the 16-bit length field.
    pub fn for_payload(kind: FragmentKind, payload: &[u8]) -> Result<Self, FrameError> {
        let len = u16::try_from(payload.len())
            .map_err(|_| FrameError::LengthTooLarge(payload.len()))?;
        Ok(Self {
            kind,
            len,
            crc: checksum(payload),
        })
    }

    /// Encodes the header.
    pub fn encode_into(&self, buf: &mut [u8; HEADER_SIZE]) {
        buf[0] = self.kind.as_byte();
        buf[1..3].copy_from_slice(&self.len.to_be_bytes());
        buf[3..7].copy_from_slice(&self.crc.to_be_bytes());
    }

    /// Decodes a header, or returns the unknown kind byte.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, u8> {
        let kind = FragmentKind::from_byte(buf[0]).ok_or(buf[0])?;
        Ok(Self {
            kind,
            len: u16::from_be_bytes([buf[1], buf[2]]),
            crc: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }
}

/// Writes one fragment (header plus payload) at the start of `buf`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`FrameError::LengthTooLarge`] if the payload is larger than a
/// page can hold or the fragment does not fit in `buf`.
pub fn encode_fragment(
    buf: &mut [u8],
    kind: FragmentKind,
    payload: &[u8],
) -> Result<usize, FrameError> {
    let len = HEADER_SIZE + payload.len();
    if len > PAGE_SIZE || len > buf.len() {
        return Err(FrameError::LengthTooLarge(payload.len()));
    }
    let (head, body) = buf.split_at_mut(HEADER_SIZE);
    let head: &mut [u8; HEADER_SIZE] = head
        .try_into()
        .map_err(|_| FrameError::LengthTooLarge(payload.len()))?;
    FragmentHeader::for_payload(kind, payload)?.encode_into(head);
    body[..payload.len()].copy_from_slice(payload);
    Ok(len)
}

/// Computes the CRC32 (Castagnoli) checksum of a fragment payload.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}
