use std::mem::size_of;
use std::ops::Range;
use std::os::unix::io::RawFd;

/// A "magic number" to identify an allocation as a capchan message.
pub const MESSAGE_MAGIC: u64 = 0x4341_5043_4841_4E31; // "CAPCHAN1"

/// The version of the message memory layout.
pub const LAYOUT_VERSION: u32 = 1;

/// Size in bytes of one capability handle in the descriptor region.
pub const HANDLE_SIZE: usize = size_of::<RawFd>();

/// The header located at the very beginning of every message allocation.
///
/// The allocation holds the header and then the three payload regions,
/// contiguous and in this fixed order:
///
/// ```text
///   MessageHeader
///   u8     data[data_len]
///   RawFd  descriptors[descriptor_count]
///   <self-describing channel records>[channel_bytes]
/// ```
///
/// This struct is `#[repr(C)]` to ensure a defined and stable memory layout;
/// it is an in-memory representation, not a cross-process wire format.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Identifies the allocation as a capchan message.
    pub magic: u64,

    /// Layout version; bumped on any change to the region order or header.
    pub version: u32,

    /// Number of capability handles in the descriptor region.
    pub descriptor_count: u32,

    /// Length in bytes of the raw data region.
    pub data_len: u64,

    /// Number of embedded channel records in the channel region.
    pub channel_count: u32,

    /// Reserved/padding (keeps the u64 fields 8-byte aligned).
    pub reserved: u32,

    /// Length in bytes of the channel region. Records are variable-sized,
    /// so this cannot be derived from `channel_count`.
    pub channel_bytes: u64,

    /// Total byte size of the whole allocation, header included.
    pub total_len: u64,
}

/// Pure offset algebra for the three regions of a message.
///
/// All region positions are derived from these three lengths; no raw
/// addresses are stored anywhere. Growing any region produces a new
/// `RegionLayout`, and every offset must be recomputed from it — no offset
/// computed against an old layout is meaningful after a growth.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegionLayout {
    /// Length in bytes of the raw data region.
    pub data_len: usize,
    /// Number of handles in the descriptor region.
    pub descriptor_count: usize,
    /// Length in bytes of the channel region.
    pub channel_bytes: usize,
}

impl RegionLayout {
    /// Layout of an empty message: no data, no descriptors, no channels.
    pub const EMPTY: RegionLayout = RegionLayout {
        data_len: 0,
        descriptor_count: 0,
        channel_bytes: 0,
    };

    /// Byte size of the header that precedes the regions.
    #[inline]
    pub fn header_len() -> usize {
        size_of::<MessageHeader>()
    }

    /// Offset of the raw data region from the start of the allocation.
    #[inline]
    pub fn data_offset(&self) -> usize {
        Self::header_len()
    }

    /// Offset of the descriptor region.
    #[inline]
    pub fn descriptor_offset(&self) -> usize {
        self.data_offset() + self.data_len
    }

    /// Offset of the channel-record region.
    #[inline]
    pub fn channel_offset(&self) -> usize {
        self.descriptor_offset() + self.descriptor_count * HANDLE_SIZE
    }

    /// Exact total size of the allocation: header plus all three regions.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.channel_offset() + self.channel_bytes
    }

    /// Byte range of the data region within the allocation.
    #[inline]
    pub fn data_range(&self) -> Range<usize> {
        self.data_offset()..self.descriptor_offset()
    }

    /// Byte range of the descriptor region.
    #[inline]
    pub fn descriptor_range(&self) -> Range<usize> {
        self.descriptor_offset()..self.channel_offset()
    }

    /// Byte range of the channel-record region.
    #[inline]
    pub fn channel_range(&self) -> Range<usize> {
        self.channel_offset()..self.total_len()
    }
}
