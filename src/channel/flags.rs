use std::io;

use bitflags::bitflags;

bitflags! {
    /// Delivery-property flags for a channel.
    ///
    /// Flags are supplied at creation and are immutable afterwards; there is
    /// no setter anywhere in the crate.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ChannelFlags: u32 {
        /// Request reliable delivery.
        const RELIABLE = 1 << 0;
        /// Request in-order delivery.
        const INORDER = 1 << 1;
    }
}

impl ChannelFlags {
    /// Parse a caller-supplied bitmask. Unknown bits are rejected, not
    /// silently dropped.
    pub fn from_raw(bits: u32) -> io::Result<Self> {
        Self::from_bits(bits).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown channel flag bits: {:#x}", bits & !Self::all().bits()),
            )
        })
    }
}
