// Lifecycle and C API contract tests: null handling, sentinels, error codes.

use capchan::ffi::{
    capchan_channel_create, capchan_channel_flags, capchan_channel_free,
    capchan_channel_is_valid, capchan_channel_send, capchan_channel_transport_handle,
    capchan_channel_wrap_socket, capchan_message_append_channels,
    capchan_message_append_data, capchan_message_append_descriptors,
    capchan_message_channel_count, capchan_message_data_len,
    capchan_message_descriptor_count, capchan_message_free, capchan_message_raw,
    capchan_message_read_data, ChannelHandle, CAPCHAN_ERR_INVALID_ARG,
    CAPCHAN_ERR_NULL_POINTER, CAPCHAN_SUCCESS,
};
use capchan::ChannelFlags;

use std::ptr;

#[test]
fn test_null_channel_is_invalid() {
    // Non-channels should be recognized as such.
    assert!(!capchan_channel_is_valid(ptr::null()));
    assert_eq!(capchan_channel_flags(ptr::null()), -1);
    assert_eq!(capchan_channel_transport_handle(ptr::null()), -1);

    // Freeing NULL is a no-op.
    capchan_channel_free(ptr::null_mut());
    capchan_message_free(ptr::null_mut());
}

#[test]
fn test_invalid_channel_returns_sentinels() {
    let ch = capchan_channel_wrap_socket(999_997);
    assert!(!ch.is_null());

    assert!(!capchan_channel_is_valid(ch));
    assert_eq!(capchan_channel_flags(ch), -1);
    assert_eq!(capchan_channel_transport_handle(ch), -1);

    capchan_channel_free(ch);
}

#[test]
fn test_create_flags_roundtrip() {
    let both = (ChannelFlags::RELIABLE | ChannelFlags::INORDER).bits();
    let ch = capchan_channel_create(both);
    assert!(!ch.is_null());
    assert!(capchan_channel_is_valid(ch));
    assert_eq!(capchan_channel_flags(ch), both as i32);
    assert!(capchan_channel_transport_handle(ch) >= 0);
    capchan_channel_free(ch);

    let ch = capchan_channel_create(0);
    assert!(!ch.is_null());
    assert_eq!(capchan_channel_flags(ch), 0);
    capchan_channel_free(ch);
}

#[test]
fn test_create_rejects_unknown_bits() {
    assert!(capchan_channel_create(0xF0).is_null());
}

#[test]
fn test_message_api_roundtrip() {
    let hello = b"Hello, ";
    let msg = capchan_message_raw(hello.as_ptr(), hello.len());
    assert!(!msg.is_null());

    let world = b"world!";
    assert_eq!(
        capchan_message_append_data(msg, world.as_ptr(), world.len()),
        CAPCHAN_SUCCESS
    );
    assert_eq!(capchan_message_data_len(msg), 13);
    assert_eq!(capchan_message_descriptor_count(msg), 0);
    assert_eq!(capchan_message_channel_count(msg), 0);

    let mut out = [0u8; 64];
    let copied = capchan_message_read_data(msg, out.as_mut_ptr(), out.len());
    assert_eq!(copied, 13);
    assert_eq!(&out[..13], b"Hello, world!");

    capchan_message_free(msg);
}

#[test]
fn test_ffi_append_channels() {
    let msg = capchan_message_raw(b"c".as_ptr(), 1);
    let ch = capchan_channel_create((ChannelFlags::RELIABLE | ChannelFlags::INORDER).bits());
    assert!(!msg.is_null() && !ch.is_null());

    let list = [ch as *const ChannelHandle];
    assert_eq!(
        capchan_message_append_channels(msg, list.as_ptr(), 1),
        CAPCHAN_SUCCESS
    );
    assert_eq!(capchan_message_channel_count(msg), 1);

    // A null entry rejects the whole append.
    let bad = [ptr::null::<ChannelHandle>()];
    assert_eq!(
        capchan_message_append_channels(msg, bad.as_ptr(), 1),
        CAPCHAN_ERR_NULL_POINTER
    );
    assert_eq!(capchan_message_channel_count(msg), 1);

    // An invalid channel rejects the whole append too.
    let dead = capchan_channel_wrap_socket(999_996);
    let invalid = [dead as *const ChannelHandle];
    assert_eq!(
        capchan_message_append_channels(msg, invalid.as_ptr(), 1),
        CAPCHAN_ERR_INVALID_ARG
    );
    assert_eq!(capchan_message_channel_count(msg), 1);

    capchan_channel_free(dead);
    capchan_channel_free(ch);
    capchan_message_free(msg);
}

#[test]
fn test_message_null_arguments() {
    assert!(capchan_message_raw(ptr::null(), 4).is_null());
    assert_eq!(capchan_message_data_len(ptr::null()), -1);
    assert_eq!(capchan_message_descriptor_count(ptr::null()), -1);
    assert_eq!(capchan_message_channel_count(ptr::null()), -1);

    assert_eq!(
        capchan_message_append_data(ptr::null_mut(), ptr::null(), 0),
        CAPCHAN_ERR_NULL_POINTER
    );
    assert_eq!(
        capchan_message_append_descriptors(ptr::null_mut(), ptr::null(), 0),
        CAPCHAN_ERR_NULL_POINTER
    );
    assert_eq!(
        capchan_channel_send(ptr::null(), ptr::null()),
        CAPCHAN_ERR_NULL_POINTER as i64
    );
}
