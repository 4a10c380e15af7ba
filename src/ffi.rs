//! C API.
//!
//! Opaque handles over [`MessageBuf`] and [`Channel`], with negative error
//! codes and the sentinel conventions C callers expect: `is_valid` of a null
//! pointer is false, `flags`/`transport_handle` of an invalid channel return
//! -1 instead of failing loudly.

use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::slice;

use crate::channel::endpoint::Channel;
use crate::channel::flags::ChannelFlags;
use crate::message::buffer::MessageBuf;

// Error codes
pub const CAPCHAN_SUCCESS: i32 = 0;
pub const CAPCHAN_ERR_NULL_POINTER: i32 = -1;
pub const CAPCHAN_ERR_INVALID_ARG: i32 = -2;
pub const CAPCHAN_ERR_ALLOCATION: i32 = -3;
pub const CAPCHAN_ERR_TRANSPORT: i32 = -4;
pub const CAPCHAN_ERR_UNSUPPORTED: i32 = -5;

/// Handle to a message instance (opaque pointer).
pub struct MessageHandle {
    inner: MessageBuf,
}

/// Handle to a channel instance (opaque pointer).
pub struct ChannelHandle {
    inner: Channel,
}

fn error_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::OutOfMemory => CAPCHAN_ERR_ALLOCATION,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => CAPCHAN_ERR_INVALID_ARG,
        io::ErrorKind::Unsupported => CAPCHAN_ERR_UNSUPPORTED,
        _ => CAPCHAN_ERR_TRANSPORT,
    }
}

// -----------------------------------------------------------------------------
// Message API
// -----------------------------------------------------------------------------

/// Build a message that only contains raw data. This copies the data.
///
/// # Returns
/// * Pointer to `MessageHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn capchan_message_raw(data: *const u8, len: usize) -> *mut MessageHandle {
    if data.is_null() && len > 0 {
        return ptr::null_mut();
    }

    let bytes: &[u8] = if len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(data, len) }
    };

    match MessageBuf::from_bytes(bytes) {
        Ok(message) => Box::into_raw(Box::new(MessageHandle { inner: message })),
        Err(e) => {
            eprintln!("FFI Error: failed to build message: {e}");
            ptr::null_mut()
        }
    }
}

/// Append raw data to an existing message.
///
/// # Returns
/// * 0 on success, negative error code otherwise. On failure the message is
///   unmodified.
#[no_mangle]
pub extern "C" fn capchan_message_append_data(
    handle: *mut MessageHandle,
    data: *const u8,
    len: usize,
) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return CAPCHAN_ERR_NULL_POINTER;
    }

    let message = unsafe { &mut (*handle).inner };
    let bytes: &[u8] = if len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(data, len) }
    };

    match message.append_data(bytes) {
        Ok(()) => CAPCHAN_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Append capability handles to an existing message.
///
/// On success the message takes ownership of the descriptors and closes
/// them when freed.
#[no_mangle]
pub extern "C" fn capchan_message_append_descriptors(
    handle: *mut MessageHandle,
    fds: *const RawFd,
    count: usize,
) -> i32 {
    if handle.is_null() || (fds.is_null() && count > 0) {
        return CAPCHAN_ERR_NULL_POINTER;
    }

    let message = unsafe { &mut (*handle).inner };
    let fds: &[RawFd] = if count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(fds, count) }
    };

    match message.append_descriptors(fds) {
        Ok(()) => CAPCHAN_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Append channels to an existing message, embedding each as a record.
///
/// `channels` is an array of `count` channel handles. Every channel must be
/// valid; the whole append is rejected otherwise. The channels themselves
/// remain owned by the caller (only copies are embedded).
#[no_mangle]
pub extern "C" fn capchan_message_append_channels(
    handle: *mut MessageHandle,
    channels: *const *const ChannelHandle,
    count: usize,
) -> i32 {
    if handle.is_null() || (channels.is_null() && count > 0) {
        return CAPCHAN_ERR_NULL_POINTER;
    }

    let message = unsafe { &mut (*handle).inner };
    let handles: &[*const ChannelHandle] = if count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(channels, count) }
    };

    let mut refs: Vec<&Channel> = Vec::with_capacity(count);
    for ch in handles {
        if ch.is_null() {
            return CAPCHAN_ERR_NULL_POINTER;
        }
        refs.push(unsafe { &(**ch).inner });
    }

    match message.append_channels(&refs) {
        Ok(()) => CAPCHAN_SUCCESS,
        Err(e) => error_code(&e),
    }
}

/// Length of the raw data region in bytes, or -1 for a null message.
#[no_mangle]
pub extern "C" fn capchan_message_data_len(handle: *const MessageHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    unsafe { (*handle).inner.data().len() as i64 }
}

/// Copy the raw data region into `out`, which holds `max_len` bytes.
///
/// # Returns
/// * Number of bytes copied, or a negative error code.
#[no_mangle]
pub extern "C" fn capchan_message_read_data(
    handle: *const MessageHandle,
    out: *mut u8,
    max_len: usize,
) -> i64 {
    if handle.is_null() || out.is_null() {
        return CAPCHAN_ERR_NULL_POINTER as i64;
    }

    let data = unsafe { (*handle).inner.data() };
    if data.len() > max_len {
        return CAPCHAN_ERR_INVALID_ARG as i64; // Buffer too small
    }

    unsafe {
        ptr::copy_nonoverlapping(data.as_ptr(), out, data.len());
    }
    data.len() as i64
}

/// Number of capability handles in the message, or -1 for a null message.
#[no_mangle]
pub extern "C" fn capchan_message_descriptor_count(handle: *const MessageHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    unsafe { (*handle).inner.descriptors().len() as i64 }
}

/// Number of embedded channels in the message, or -1 for a null message.
#[no_mangle]
pub extern "C" fn capchan_message_channel_count(handle: *const MessageHandle) -> i64 {
    if handle.is_null() {
        return -1;
    }
    unsafe { (*handle).inner.channel_count() as i64 }
}

/// Free a message, closing any descriptors it owns. NULL is a no-op.
#[no_mangle]
pub extern "C" fn capchan_message_free(handle: *mut MessageHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}

// -----------------------------------------------------------------------------
// Channel API
// -----------------------------------------------------------------------------

/// Create a channel with the given delivery-property flags.
///
/// Unknown flag bits are rejected.
///
/// # Returns
/// * Pointer to `ChannelHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn capchan_channel_create(flags: u32) -> *mut ChannelHandle {
    let flags = match ChannelFlags::from_raw(flags) {
        Ok(flags) => flags,
        Err(e) => {
            eprintln!("FFI Error: {e}");
            return ptr::null_mut();
        }
    };

    match Channel::create(flags) {
        Ok(channel) => Box::into_raw(Box::new(ChannelHandle { inner: channel })),
        Err(e) => {
            eprintln!("FFI Error: failed to create channel: {e}");
            ptr::null_mut()
        }
    }
}

/// Wrap a UNIX domain socket in a channel, taking ownership of it.
#[no_mangle]
pub extern "C" fn capchan_channel_wrap_socket(sock: RawFd) -> *mut ChannelHandle {
    match Channel::wrap_socket(sock) {
        Ok(channel) => Box::into_raw(Box::new(ChannelHandle { inner: channel })),
        Err(e) => {
            eprintln!("FFI Error: failed to wrap socket: {e}");
            ptr::null_mut()
        }
    }
}

/// Test the validity of a pointer that claims to be a channel.
///
/// False for NULL and for channels whose transport handle is dead. This is
/// a best-effort check, not a memory-safety guarantee: a non-null pointer
/// must at least point at a live `ChannelHandle`.
#[no_mangle]
pub extern "C" fn capchan_channel_is_valid(handle: *const ChannelHandle) -> bool {
    if handle.is_null() {
        return false;
    }
    unsafe { (*handle).inner.is_valid() }
}

/// The channel's flag bits, or -1 for a null or invalid channel.
#[no_mangle]
pub extern "C" fn capchan_channel_flags(handle: *const ChannelHandle) -> i32 {
    if !capchan_channel_is_valid(handle) {
        return -1;
    }
    unsafe { (*handle).inner.flags().bits() as i32 }
}

/// The channel's transport handle, or -1 for a null or invalid channel.
#[no_mangle]
pub extern "C" fn capchan_channel_transport_handle(handle: *const ChannelHandle) -> RawFd {
    if !capchan_channel_is_valid(handle) {
        return -1;
    }
    unsafe { (*handle).inner.transport_handle() }
}

/// Send a message through a channel.
///
/// # Returns
/// * Number of payload bytes sent (>= 0), or a negative error code.
///   `CAPCHAN_ERR_UNSUPPORTED` means the transport cannot carry this
///   message (e.g. it embeds channels), as opposed to a transport failure.
#[no_mangle]
pub extern "C" fn capchan_channel_send(
    channel: *const ChannelHandle,
    message: *const MessageHandle,
) -> i64 {
    if channel.is_null() || message.is_null() {
        return CAPCHAN_ERR_NULL_POINTER as i64;
    }

    let channel = unsafe { &(*channel).inner };
    let message = unsafe { &(*message).inner };

    match channel.send(message) {
        Ok(sent) => sent as i64,
        Err(e) => error_code(&e) as i64,
    }
}

/// Free a channel, closing its socket. NULL is a no-op.
#[no_mangle]
pub extern "C" fn capchan_channel_free(handle: *mut ChannelHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}
