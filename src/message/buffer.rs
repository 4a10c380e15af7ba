//! The message buffer.
//!
//! One owned, contiguous allocation holds a header and three payload
//! regions: raw bytes, capability handles (file descriptors) and embedded
//! channel records. All three regions grow independently; any growth may
//! relocate the whole allocation, so region positions are always recomputed
//! from the current [`RegionLayout`] and never cached.
//!
//! Growth is copy-on-grow: a freshly sized buffer is assembled off to the
//! side and swapped in only once every write has succeeded. A failed append
//! therefore leaves the original message byte-for-byte intact.

use std::fmt;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;

use log::{trace, warn};

use super::layout::{MessageHeader, RegionLayout, HANDLE_SIZE, LAYOUT_VERSION, MESSAGE_MAGIC};
use super::view::DescriptorView;
use crate::channel::endpoint::Channel;
use crate::channel::record::{self, EmbeddedChannel};

/// A message bundling raw bytes, capability handles and embedded channels.
///
/// Exclusively owned by its creator; appends take `&mut self` and invalidate
/// every previously obtained region view (the borrow checker enforces this).
///
/// Descriptor ownership: the message owns every handle appended into it and
/// closes them all when dropped.
pub struct MessageBuf {
    buf: Vec<u8>,
    layout: RegionLayout,
    channel_count: usize,
}

impl MessageBuf {
    /// Build a message that only contains raw data. This copies the data.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let layout = RegionLayout {
            data_len: bytes.len(),
            ..RegionLayout::EMPTY
        };

        let mut buf = alloc_exact(layout.total_len())?;
        buf[layout.data_range()].copy_from_slice(bytes);

        let mut message = Self {
            buf,
            layout,
            channel_count: 0,
        };
        message.write_header();
        Ok(message)
    }

    /// An empty message: no data, no descriptors, no channels.
    pub fn empty() -> io::Result<Self> {
        Self::from_bytes(&[])
    }

    /// Append raw bytes at the end of the data region.
    ///
    /// The descriptor and channel regions sit after the data region, so they
    /// are relocated to their new offsets as part of the growth. On failure
    /// the message is unmodified.
    pub fn append_data(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let next = RegionLayout {
            data_len: self.layout.data_len + bytes.len(),
            ..self.layout
        };
        let mut grown = self.reassemble(next)?;

        let start = next.data_offset() + self.layout.data_len;
        grown[start..next.descriptor_offset()].copy_from_slice(bytes);

        self.commit(grown, next);
        Ok(())
    }

    /// Append capability handles at the end of the descriptor region.
    ///
    /// On success the message takes ownership of the handles and will close
    /// them when dropped; the caller must not close them itself (dup(2)
    /// first to keep an independent reference). On failure ownership stays
    /// with the caller and the message is unmodified.
    pub fn append_descriptors(&mut self, fds: &[RawFd]) -> io::Result<()> {
        if fds.is_empty() {
            return Ok(());
        }
        if let Some(fd) = fds.iter().find(|fd| **fd < 0) {
            warn!("rejecting descriptor append: negative handle {fd}");
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot append negative descriptor {fd}"),
            ));
        }

        let next = RegionLayout {
            descriptor_count: self.layout.descriptor_count + fds.len(),
            ..self.layout
        };
        let mut grown = self.reassemble(next)?;

        let mut cursor = next.descriptor_offset() + self.layout.descriptor_count * HANDLE_SIZE;
        for fd in fds {
            grown[cursor..cursor + HANDLE_SIZE].copy_from_slice(&fd.to_ne_bytes());
            cursor += HANDLE_SIZE;
        }

        self.commit(grown, next);
        Ok(())
    }

    /// Append channels at the end of the channel region, embedding each as a
    /// self-describing record.
    ///
    /// All or nothing: every channel must pass its validity check up front,
    /// and every copy must report exactly its self-reported size; any
    /// failure aborts the whole append with the message unmodified.
    pub fn append_channels(&mut self, channels: &[&Channel]) -> io::Result<()> {
        if channels.is_empty() {
            return Ok(());
        }
        if let Some(index) = channels.iter().position(|c| !c.is_valid()) {
            warn!("rejecting channel append: channel {index} failed validity check");
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("channel {index} is not valid"),
            ));
        }

        // There is no universal record size; ask each channel for its own.
        let added: usize = channels.iter().map(|c| c.wire_size()).sum();
        let next = RegionLayout {
            channel_bytes: self.layout.channel_bytes + added,
            ..self.layout
        };
        let mut grown = self.reassemble(next)?;

        let mut cursor = next.channel_offset() + self.layout.channel_bytes;
        for channel in channels {
            let end = next.total_len();
            let wrote = channel.copy_into(&mut grown[cursor..end])?;
            if wrote != channel.wire_size() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "channel copy reported {wrote} bytes, expected {}",
                        channel.wire_size()
                    ),
                ));
            }
            cursor += wrote;
        }

        self.channel_count += channels.len();
        self.commit(grown, next);
        Ok(())
    }

    /// Read-only view of the raw data region.
    ///
    /// The view borrows the message; any subsequent append requires it to be
    /// dropped first, because growth may relocate the allocation.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[self.layout.data_range()]
    }

    /// Read-only typed view of the descriptor region. Same borrow rule as
    /// [`MessageBuf::data`].
    #[inline]
    pub fn descriptors(&self) -> DescriptorView<'_> {
        DescriptorView::new(&self.buf[self.layout.descriptor_range()])
    }

    /// Number of embedded channel records.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Decode the embedded channel record at `index`.
    ///
    /// Records are variable-sized, so this walks the region from the start,
    /// summing each prior record's self-reported size: O(index) by design.
    pub fn channel_at(&self, index: usize) -> io::Result<EmbeddedChannel> {
        if index >= self.channel_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "channel index {index} out of bounds (count {})",
                    self.channel_count
                ),
            ));
        }

        let region = &self.buf[self.layout.channel_range()];
        let mut cursor = 0;
        for _ in 0..index {
            let (_, len) = record::decode(&region[cursor..])?;
            cursor += len;
        }
        let (embedded, _) = record::decode(&region[cursor..])?;
        Ok(embedded)
    }

    /// Iterate over the embedded channel records in append order.
    pub fn channels(&self) -> impl Iterator<Item = io::Result<EmbeddedChannel>> + '_ {
        ChannelIter {
            region: &self.buf[self.layout.channel_range()],
            remaining: self.channel_count,
        }
    }

    /// Total byte size of the whole allocation, header included.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.layout.total_len()
    }

    /// The current region layout.
    #[inline]
    pub fn layout(&self) -> RegionLayout {
        self.layout
    }

    /// The header as stored at offset 0 of the allocation.
    pub fn header(&self) -> MessageHeader {
        // The Vec guarantees no alignment, so read unaligned.
        unsafe { ptr::read_unaligned(self.buf.as_ptr() as *const MessageHeader) }
    }

    /// The entire allocation: header and all three regions.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Assemble a freshly sized allocation with the existing regions copied
    /// to their offsets under `next`. The caller fills the gap at the end of
    /// whichever region grew, then swaps via [`MessageBuf::commit`].
    fn reassemble(&self, next: RegionLayout) -> io::Result<Vec<u8>> {
        let mut grown = alloc_exact(next.total_len())?;

        let old = self.layout;
        grown[next.data_offset()..next.data_offset() + old.data_len]
            .copy_from_slice(&self.buf[old.data_range()]);
        grown[next.descriptor_offset()..next.descriptor_offset() + old.descriptor_count * HANDLE_SIZE]
            .copy_from_slice(&self.buf[old.descriptor_range()]);
        grown[next.channel_offset()..next.channel_offset() + old.channel_bytes]
            .copy_from_slice(&self.buf[old.channel_range()]);

        trace!(
            "message grew {} -> {} bytes",
            old.total_len(),
            next.total_len()
        );
        Ok(grown)
    }

    fn commit(&mut self, grown: Vec<u8>, next: RegionLayout) {
        self.buf = grown;
        self.layout = next;
        self.write_header();
    }

    fn write_header(&mut self) {
        let header = MessageHeader {
            magic: MESSAGE_MAGIC,
            version: LAYOUT_VERSION,
            descriptor_count: self.layout.descriptor_count as u32,
            data_len: self.layout.data_len as u64,
            channel_count: self.channel_count as u32,
            reserved: 0,
            channel_bytes: self.layout.channel_bytes as u64,
            total_len: self.layout.total_len() as u64,
        };
        unsafe { ptr::write_unaligned(self.buf.as_mut_ptr() as *mut MessageHeader, header) }
    }
}

impl Drop for MessageBuf {
    fn drop(&mut self) {
        // The message owns its descriptors; release them with the allocation.
        for fd in self.descriptors().iter() {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

impl fmt::Debug for MessageBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuf")
            .field("total_len", &self.total_len())
            .field("data_len", &self.layout.data_len)
            .field("descriptor_count", &self.layout.descriptor_count)
            .field("channel_count", &self.channel_count)
            .field("channel_bytes", &self.layout.channel_bytes)
            .finish()
    }
}

struct ChannelIter<'a> {
    region: &'a [u8],
    remaining: usize,
}

impl Iterator for ChannelIter<'_> {
    type Item = io::Result<EmbeddedChannel>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match record::decode(self.region) {
            Ok((embedded, len)) => {
                self.region = &self.region[len..];
                Some(Ok(embedded))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

fn alloc_exact(total: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(total).map_err(|e| {
        io::Error::new(
            io::ErrorKind::OutOfMemory,
            format!("message allocation of {total} bytes failed: {e}"),
        )
    })?;
    buf.resize(total, 0);
    Ok(buf)
}
