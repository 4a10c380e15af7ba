use std::os::unix::io::RawFd;

use super::layout::HANDLE_SIZE;

/// A read-only typed view over the descriptor region of a message.
///
/// This pairs the region's bytes with an element count; it never copies the
/// region. The view borrows the message, so the borrow checker prevents it
/// from surviving any subsequent append (appends may relocate the whole
/// allocation). Handles are decoded with native-endian 4-byte reads, so the
/// region needs no alignment padding.
#[derive(Copy, Clone, Debug)]
pub struct DescriptorView<'a> {
    bytes: &'a [u8],
}

impl<'a> DescriptorView<'a> {
    /// Wrap the raw bytes of a descriptor region.
    ///
    /// The slice length must be a whole number of handles; trailing partial
    /// entries indicate a corrupt layout and are a contract breach.
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        assert!(
            bytes.len() % HANDLE_SIZE == 0,
            "descriptor region length {} is not a multiple of {}",
            bytes.len(),
            HANDLE_SIZE
        );
        Self { bytes }
    }

    /// Number of capability handles in the region.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / HANDLE_SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Handle at `index`, or None past the end.
    pub fn get(&self, index: usize) -> Option<RawFd> {
        let chunk = self.bytes.chunks_exact(HANDLE_SIZE).nth(index)?;
        Some(RawFd::from_ne_bytes(chunk.try_into().ok()?))
    }

    /// Iterate over the handles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = RawFd> + 'a {
        self.bytes
            .chunks_exact(HANDLE_SIZE)
            .map(|chunk| RawFd::from_ne_bytes(chunk.try_into().unwrap()))
    }

    /// Copy the handles out into a Vec.
    pub fn to_vec(&self) -> Vec<RawFd> {
        self.iter().collect()
    }
}
