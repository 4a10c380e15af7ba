//! Self-describing embedded channel records.
//!
//! A channel copied into a message's channel region becomes a record:
//! a kind discriminant followed by a kind-specific body. Different kinds
//! have different sizes, so the region is walked front-to-back, each record
//! reporting its own size; there is no fixed stride.

use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;

use super::flags::ChannelFlags;

/// Discriminant for UNIX-domain-socket channel records.
pub const UDS_KIND: u32 = 0x5544_5331; // "UDS1"

/// Byte size of a UDS record: kind + flags + transport handle.
pub const UDS_RECORD_LEN: usize = 3 * size_of::<u32>();

/// Record size implied by a kind discriminant, or None for unknown kinds.
pub fn record_len(kind: u32) -> Option<usize> {
    match kind {
        UDS_KIND => Some(UDS_RECORD_LEN),
        _ => None,
    }
}

/// A decoded view of one embedded channel record.
///
/// Decoding is the boundary where untyped bytes re-enter the typed world,
/// so validity here is a runtime property: an `EmbeddedChannel` only exists
/// if its record had a recognized kind and a complete body, and
/// [`EmbeddedChannel::is_valid`] additionally checks the structural fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedChannel {
    kind: u32,
    flags: ChannelFlags,
    handle: RawFd,
}

impl EmbeddedChannel {
    /// The kind discriminant of the record.
    #[inline]
    pub fn kind(&self) -> u32 {
        self.kind
    }

    /// The delivery-property flags the source channel carried.
    #[inline]
    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    /// The transport handle of the source channel.
    ///
    /// The handle is only meaningful inside the process that embedded it;
    /// re-establishing an equivalent endpoint elsewhere is the transport's
    /// problem, not this crate's.
    #[inline]
    pub fn raw_handle(&self) -> RawFd {
        self.handle
    }

    /// Structural validity: recognized kind and a plausible handle.
    pub fn is_valid(&self) -> bool {
        record_len(self.kind).is_some() && self.handle >= 0
    }
}

/// Encode a UDS channel into `dest`, returning the number of bytes written.
///
/// `dest` must hold at least [`UDS_RECORD_LEN`] bytes.
pub fn encode_uds(flags: ChannelFlags, handle: RawFd, dest: &mut [u8]) -> usize {
    assert!(dest.len() >= UDS_RECORD_LEN, "record destination too small");

    dest[0..4].copy_from_slice(&UDS_KIND.to_ne_bytes());
    dest[4..8].copy_from_slice(&flags.bits().to_ne_bytes());
    dest[8..12].copy_from_slice(&handle.to_ne_bytes());

    UDS_RECORD_LEN
}

/// Decode one record from the front of `bytes`.
///
/// Returns the decoded record and the number of bytes it occupied, so the
/// caller can advance its walk cursor. Arbitrary garbage is rejected: an
/// unrecognized discriminant, a truncated body or unknown flag bits all
/// yield `InvalidData`.
pub fn decode(bytes: &[u8]) -> io::Result<(EmbeddedChannel, usize)> {
    let kind_bytes: [u8; 4] = bytes
        .get(0..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "channel record truncated before kind discriminant",
            )
        })?;
    let kind = u32::from_ne_bytes(kind_bytes);

    let len = record_len(kind).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unrecognized channel record kind {kind:#x}"),
        )
    })?;

    if bytes.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "channel record truncated: kind {kind:#x} needs {len} bytes, {} available",
                bytes.len()
            ),
        ));
    }

    let flag_bits = u32::from_ne_bytes(bytes[4..8].try_into().unwrap());
    let flags = ChannelFlags::from_bits(flag_bits).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("channel record carries unknown flag bits {flag_bits:#x}"),
        )
    })?;

    let handle = RawFd::from_ne_bytes(bytes[8..12].try_into().unwrap());

    Ok((EmbeddedChannel { kind, flags, handle }, len))
}
