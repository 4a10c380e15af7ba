//! UNIX domain socket channel.
//!
//! The only concrete channel kind. Local transmission is real: the data
//! region travels as the iovec payload and the descriptor region as
//! SCM_RIGHTS ancillary data. Transmitting *embedded channels* across a
//! socket boundary is not defined by this crate (receiver-side channel
//! reconstruction has no agreed encoding) and is reported as `Unsupported`.

use std::io;
use std::mem;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};
use std::ptr;

use log::{debug, trace};

use super::flags::ChannelFlags;
use super::record;
use crate::message::buffer::MessageBuf;

/// Upper bound on ancillary bytes accepted by [`UdsChannel::recv`].
const RECV_CONTROL_CAPACITY: usize = 256;

/// A channel backed by a UNIX domain socket.
///
/// Owns its socket; the descriptor is closed when the channel is dropped.
/// The descriptor is kept raw rather than as an `OwnedFd`: a wrapped channel
/// may hold a dead descriptor (that is what fails [`UdsChannel::is_valid`]),
/// and closing one must stay a harmless EBADF, not a fatal IO-safety abort.
#[derive(Debug)]
pub struct UdsChannel {
    socket: RawFd,
    flags: ChannelFlags,
}

impl UdsChannel {
    /// Create a fresh, unbound UNIX domain socket channel.
    ///
    /// The socket type is derived from the requested delivery properties:
    /// `RELIABLE | INORDER` selects SOCK_SEQPACKET, anything weaker
    /// SOCK_DGRAM.
    pub fn create(flags: ChannelFlags) -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_UNIX,
                Self::socket_type(flags) | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("created uds channel fd={fd} flags={flags:?}");
        Ok(Self { socket: fd, flags })
    }

    /// Wrap an existing UNIX domain socket, taking ownership of it.
    ///
    /// The descriptor is not required to be live: a bogus descriptor
    /// produces a channel that fails [`UdsChannel::is_valid`] and is
    /// rejected wherever validity is required (e.g. embedding into a
    /// message). Delivery-property flags are derived from the socket's
    /// actual type (SO_TYPE); a dead descriptor reports no properties.
    pub fn wrap(sock: RawFd) -> io::Result<Self> {
        if sock < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot wrap negative socket descriptor {sock}"),
            ));
        }

        Ok(Self {
            socket: sock,
            flags: Self::probe_flags(sock),
        })
    }

    /// Create a connected pair of channels over socketpair(2).
    pub fn pair(flags: ChannelFlags) -> io::Result<(Self, Self)> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe {
            libc::socketpair(
                libc::AF_UNIX,
                Self::socket_type(flags) | libc::SOCK_CLOEXEC,
                0,
                fds.as_mut_ptr(),
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let make = |fd| Self { socket: fd, flags };
        Ok((make(fds[0]), make(fds[1])))
    }

    fn socket_type(flags: ChannelFlags) -> libc::c_int {
        if flags.contains(ChannelFlags::RELIABLE | ChannelFlags::INORDER) {
            libc::SOCK_SEQPACKET
        } else {
            libc::SOCK_DGRAM
        }
    }

    /// Delivery properties implied by the socket's actual type.
    fn probe_flags(sock: RawFd) -> ChannelFlags {
        let mut ty: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                sock,
                libc::SOL_SOCKET,
                libc::SO_TYPE,
                &mut ty as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if rc != 0 {
            return ChannelFlags::empty();
        }
        match ty {
            libc::SOCK_STREAM | libc::SOCK_SEQPACKET => {
                ChannelFlags::RELIABLE | ChannelFlags::INORDER
            }
            _ => ChannelFlags::empty(),
        }
    }

    /// The delivery-property flags, as set at creation.
    #[inline]
    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    /// The underlying socket descriptor.
    #[inline]
    pub fn descriptor(&self) -> RawFd {
        self.socket
    }

    /// Liveness check on the underlying descriptor.
    ///
    /// This is a best-effort probe (fcntl F_GETFD), not a guarantee that the
    /// peer is still listening.
    pub fn is_valid(&self) -> bool {
        unsafe { libc::fcntl(self.socket, libc::F_GETFD) != -1 }
    }

    /// Byte size of this channel's embedded record.
    #[inline]
    pub fn wire_size(&self) -> usize {
        record::UDS_RECORD_LEN
    }

    /// Write this channel's self-describing record into `dest`.
    ///
    /// Returns the number of bytes written, which always equals
    /// [`UdsChannel::wire_size`]. `dest` must be at least that large.
    pub fn copy_into(&self, dest: &mut [u8]) -> io::Result<usize> {
        if dest.len() < self.wire_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "record destination too small: {} < {}",
                    dest.len(),
                    self.wire_size()
                ),
            ));
        }
        Ok(record::encode_uds(self.flags, self.socket, dest))
    }

    /// Send a message through this channel.
    ///
    /// The data region is sent verbatim; descriptors travel as SCM_RIGHTS
    /// ancillary data. A message that embeds channels cannot be transmitted
    /// (no receiver-side reconstruction is defined) and yields
    /// `ErrorKind::Unsupported` — distinguishable from a transport failure.
    ///
    /// # Returns
    /// Number of payload bytes accepted by the socket.
    pub fn send(&self, message: &MessageBuf) -> io::Result<usize> {
        if message.channel_count() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "transmitting embedded channels over a socket is not implemented",
            ));
        }

        let data = message.data();
        let fds = message.descriptors().to_vec();
        trace!(
            "uds send fd={} data={}B descriptors={}",
            self.socket,
            data.len(),
            fds.len()
        );

        let mut iov = libc::iovec {
            iov_base: data.as_ptr() as *mut libc::c_void,
            iov_len: data.len(),
        };

        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_iov = &mut iov;
        hdr.msg_iovlen = 1;

        // Keep the control buffer alive until sendmsg returns.
        let mut control: Vec<u8>;
        if !fds.is_empty() {
            let payload = fds.len() * mem::size_of::<RawFd>();
            let space = unsafe { libc::CMSG_SPACE(payload as libc::c_uint) } as usize;
            control = vec![0u8; space];
            hdr.msg_control = control.as_mut_ptr() as *mut libc::c_void;
            hdr.msg_controllen = space as _;

            unsafe {
                let cmsg = libc::CMSG_FIRSTHDR(&hdr);
                (*cmsg).cmsg_level = libc::SOL_SOCKET;
                (*cmsg).cmsg_type = libc::SCM_RIGHTS;
                (*cmsg).cmsg_len = libc::CMSG_LEN(payload as libc::c_uint) as _;
                ptr::copy_nonoverlapping(
                    fds.as_ptr() as *const u8,
                    libc::CMSG_DATA(cmsg),
                    payload,
                );
            }
        }

        let sent = unsafe { libc::sendmsg(self.socket, &hdr, 0) };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }

    /// Receive one message's worth of bytes and descriptors from the socket.
    ///
    /// Counterpart of [`UdsChannel::send`] for local transports and tests.
    /// Received descriptors are owned by the caller.
    ///
    /// # Arguments
    /// * `max_len` - Maximum number of payload bytes to accept.
    pub fn recv(&self, max_len: usize) -> io::Result<(Vec<u8>, Vec<OwnedFd>)> {
        let mut payload = vec![0u8; max_len.max(1)];
        let mut control = [0u8; RECV_CONTROL_CAPACITY];

        let mut iov = libc::iovec {
            iov_base: payload.as_mut_ptr() as *mut libc::c_void,
            iov_len: payload.len(),
        };

        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_iov = &mut iov;
        hdr.msg_iovlen = 1;
        hdr.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        hdr.msg_controllen = control.len() as _;

        let received = unsafe { libc::recvmsg(self.socket, &mut hdr, 0) };
        if received < 0 {
            return Err(io::Error::last_os_error());
        }
        payload.truncate(received as usize);

        if hdr.msg_flags & libc::MSG_CTRUNC != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "ancillary data truncated",
            ));
        }

        let mut fds = Vec::new();
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&hdr);
            while !cmsg.is_null() {
                if (*cmsg).cmsg_level == libc::SOL_SOCKET
                    && (*cmsg).cmsg_type == libc::SCM_RIGHTS
                {
                    let header_len = libc::CMSG_LEN(0) as usize;
                    let count =
                        ((*cmsg).cmsg_len as usize - header_len) / mem::size_of::<RawFd>();
                    let base = libc::CMSG_DATA(cmsg) as *const RawFd;
                    for i in 0..count {
                        let fd = ptr::read_unaligned(base.add(i));
                        fds.push(OwnedFd::from_raw_fd(fd));
                    }
                }
                cmsg = libc::CMSG_NXTHDR(&mut hdr, cmsg);
            }
        }

        trace!(
            "uds recv fd={} data={}B descriptors={}",
            self.socket,
            payload.len(),
            fds.len()
        );
        Ok((payload, fds))
    }
}

impl Drop for UdsChannel {
    fn drop(&mut self) {
        // EBADF from a dead wrapped descriptor is fine to ignore.
        unsafe {
            libc::close(self.socket);
        }
    }
}
