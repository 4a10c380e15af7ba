//! The channel capability.
//!
//! The source system dispatched through a function-pointer table guarded by
//! a magic-number validity check. Here the finite set of transport kinds is
//! a tagged sum: every `Channel` value carries a complete operation set by
//! construction, and exhaustive matching replaces the manual check. The
//! runtime validity check survives only at the two boundaries where untyped
//! input enters — embedded record decoding ([`crate::channel::record`]) and
//! the C API ([`crate::ffi`]).

use std::io;
use std::os::unix::io::{OwnedFd, RawFd};

use super::flags::ChannelFlags;
use super::uds::UdsChannel;
use crate::message::buffer::MessageBuf;

/// A polymorphic communication endpoint capability.
///
/// Every kind answers three questions: how large is my embedded record,
/// copy yourself into this buffer, and send this message.
#[derive(Debug)]
pub enum Channel {
    /// UNIX-domain-socket-backed channel (the only concrete kind so far).
    Uds(UdsChannel),
}

impl Channel {
    /// Create a channel with the requested delivery properties.
    ///
    /// Currently always socket-backed; other transports would hang off the
    /// flags (or an explicit kind parameter) here.
    pub fn create(flags: ChannelFlags) -> io::Result<Self> {
        Ok(Channel::Uds(UdsChannel::create(flags)?))
    }

    /// Wrap an existing UNIX domain socket, taking ownership of it.
    pub fn wrap_socket(sock: RawFd) -> io::Result<Self> {
        Ok(Channel::Uds(UdsChannel::wrap(sock)?))
    }

    /// Create a connected pair of channels.
    pub fn pair(flags: ChannelFlags) -> io::Result<(Self, Self)> {
        let (a, b) = UdsChannel::pair(flags)?;
        Ok((Channel::Uds(a), Channel::Uds(b)))
    }

    /// Best-effort liveness check on the underlying transport handle.
    pub fn is_valid(&self) -> bool {
        match self {
            Channel::Uds(uds) => uds.is_valid(),
        }
    }

    /// The delivery-property flags, immutable since creation.
    pub fn flags(&self) -> ChannelFlags {
        match self {
            Channel::Uds(uds) => uds.flags(),
        }
    }

    /// The OS-level transport handle behind this channel.
    pub fn transport_handle(&self) -> RawFd {
        match self {
            Channel::Uds(uds) => uds.descriptor(),
        }
    }

    /// Byte size of this channel's embedded record. Positive for every
    /// constructible channel.
    pub fn wire_size(&self) -> usize {
        match self {
            Channel::Uds(uds) => uds.wire_size(),
        }
    }

    /// Copy this channel's self-describing record into `dest`; returns the
    /// number of bytes written, which equals [`Channel::wire_size`].
    pub fn copy_into(&self, dest: &mut [u8]) -> io::Result<usize> {
        match self {
            Channel::Uds(uds) => uds.copy_into(dest),
        }
    }

    /// Send a message through this channel. The outcome is transport-defined;
    /// see the concrete kind for its semantics.
    pub fn send(&self, message: &MessageBuf) -> io::Result<usize> {
        match self {
            Channel::Uds(uds) => uds.send(message),
        }
    }

    /// Receive bytes and descriptors from this channel.
    pub fn recv(&self, max_len: usize) -> io::Result<(Vec<u8>, Vec<OwnedFd>)> {
        match self {
            Channel::Uds(uds) => uds.recv(max_len),
        }
    }
}
