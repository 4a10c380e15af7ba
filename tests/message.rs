// Message buffer tests: region growth, relocation and the assembly scenario.

use capchan::debug::hexdump::dump_message;
use capchan::message::layout::{RegionLayout, HANDLE_SIZE, MESSAGE_MAGIC};
use capchan::{Channel, ChannelFlags, MessageBuf};

use std::fs::File;
use std::os::unix::io::{IntoRawFd, RawFd};

fn open_fd() -> RawFd {
    File::open("Cargo.toml").unwrap().into_raw_fd()
}

#[test]
fn test_raw_data_roundtrip() {
    let text = b"Hello, world!";
    let m = MessageBuf::from_bytes(text).unwrap();

    assert_eq!(m.data(), text);
    assert_eq!(m.descriptors().len(), 0);
    assert_eq!(m.channel_count(), 0);
    assert_eq!(m.total_len(), RegionLayout::header_len() + text.len());
}

#[test]
fn test_append_data_concatenates() {
    let mut m = MessageBuf::from_bytes(b"Hello, ").unwrap();
    m.append_data(b"world!").unwrap();

    assert_eq!(m.data(), b"Hello, world!");
    assert_eq!(m.data().len(), 13);
}

#[test]
fn test_append_data_randomized() {
    // Concatenation property over arbitrary byte sequences.
    for _ in 0..32 {
        let first: Vec<u8> = (0..fastrand::usize(0..512)).map(|_| fastrand::u8(..)).collect();
        let second: Vec<u8> = (0..fastrand::usize(0..512)).map(|_| fastrand::u8(..)).collect();

        let mut m = MessageBuf::from_bytes(&first).unwrap();
        m.append_data(&second).unwrap();

        let mut expected = first.clone();
        expected.extend_from_slice(&second);
        assert_eq!(m.data(), expected.as_slice());
        assert_eq!(m.data().len(), first.len() + second.len());
    }
}

#[test]
fn test_append_descriptors_preserves_order() {
    let fds: Vec<RawFd> = (0..5).map(|_| open_fd()).collect();

    let mut m = MessageBuf::empty().unwrap();
    m.append_descriptors(&fds[0..2]).unwrap();
    m.append_descriptors(&fds[2..5]).unwrap();

    let view = m.descriptors();
    assert_eq!(view.len(), 5);
    for (i, fd) in fds.iter().enumerate() {
        assert_eq!(view.get(i), Some(*fd));
    }
    assert_eq!(view.get(5), None);
    assert_eq!(view.to_vec(), fds);
}

#[test]
fn test_append_rejects_negative_descriptor() {
    let mut m = MessageBuf::from_bytes(b"payload").unwrap();
    let err = m.append_descriptors(&[-1]).unwrap_err();

    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    assert_eq!(m.data(), b"payload");
    assert_eq!(m.descriptors().len(), 0);
}

#[test]
fn test_header_tracks_regions() {
    let mut m = MessageBuf::from_bytes(b"abc").unwrap();
    m.append_descriptors(&[open_fd()]).unwrap();

    let header = m.header();
    assert_eq!(header.magic, MESSAGE_MAGIC);
    assert_eq!(header.data_len, 3);
    assert_eq!(header.descriptor_count, 1);
    assert_eq!(header.channel_count, 0);
    assert_eq!(
        header.total_len as usize,
        RegionLayout::header_len() + 3 + HANDLE_SIZE
    );
    assert_eq!(header.total_len as usize, m.total_len());
    assert_eq!(m.as_bytes().len(), m.total_len());
}

// The interleaved assembly scenario: data and descriptor appends alternate,
// forcing the descriptor region to relocate when the data region grows.
#[test]
fn test_message_complex() {
    let fds = [open_fd(), open_fd()];
    let late_fd = open_fd();

    let ch = [
        Channel::create(ChannelFlags::RELIABLE | ChannelFlags::INORDER).unwrap(),
        Channel::create(ChannelFlags::RELIABLE | ChannelFlags::INORDER).unwrap(),
    ];
    for c in &ch {
        assert!(c.is_valid());
    }

    let mut m = MessageBuf::from_bytes(b"Hello, ").unwrap();
    m.append_descriptors(&fds).unwrap();
    m.append_data(b"world!").unwrap();
    m.append_descriptors(&[late_fd]).unwrap();
    m.append_channels(&[&ch[0], &ch[1]]).unwrap();

    assert_eq!(m.data(), b"Hello, world!");

    let view = m.descriptors();
    assert_eq!(view.len(), 3);
    assert_eq!(view.to_vec(), vec![fds[0], fds[1], late_fd]);
    // Handles survived two relocations; check they are still live.
    for fd in view.iter() {
        assert_ne!(unsafe { libc::fcntl(fd, libc::F_GETFD) }, -1);
    }

    assert_eq!(m.channel_count(), 2);
    for i in 0..2 {
        let embedded = m.channel_at(i).unwrap();
        assert!(embedded.is_valid());
        assert_eq!(embedded.raw_handle(), ch[i].transport_handle());
    }
}

#[test]
fn test_dump_message() {
    let m = MessageBuf::from_bytes(b"Hello, world!").unwrap();
    let dump = dump_message(&m);

    assert!(dump.starts_with("message {"));
    assert!(dump.contains("data"));
    // The ASCII column should show the payload.
    assert!(dump.contains("Hello, w"));
}
