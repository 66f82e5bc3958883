//! Socket address resolution tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::path::{Path, PathBuf};

use sockroute_core::address::SocketAddress;
use sockroute_core::protocol::normalize_channels;

#[cfg(unix)]
#[test]
fn named_address_resolves_under_root() {
    let addr = SocketAddress::named("app", "42");
    let path = addr.resolve(Path::new("/tmp/sockets")).unwrap();
    assert_eq!(path, PathBuf::from("/tmp/sockets/app_42"));
}

#[cfg(windows)]
#[test]
fn named_address_becomes_a_pipe_under_an_absolute_root() {
    let addr = SocketAddress::named("app", "42");
    let path = addr.resolve(Path::new(r"C:\Users\me\AppData\Local\Temp")).unwrap();
    assert_eq!(
        path,
        PathBuf::from(r"\\?\pipe\C:\Users\me\AppData\Local\Temp\app_42")
    );
}

#[test]
fn explicit_path_is_used_as_is() {
    let addr = SocketAddress::from("/run/app.sock");
    assert_eq!(addr.resolve(Path::new("/ignored")).unwrap(), PathBuf::from("/run/app.sock"));
}

#[test]
fn empty_parts_are_rejected() {
    assert_eq!(SocketAddress::from("").validate().unwrap_err().code(), "INVALID_PATH");
    assert_eq!(
        SocketAddress::named("", "1").validate().unwrap_err().code(),
        "INVALID_PATH"
    );
    assert_eq!(
        SocketAddress::named("a", "1").resolve(Path::new("")).unwrap_err().code(),
        "INVALID_SOCKET_ROOT"
    );
}

#[test]
fn channel_lists_are_validated_and_deduplicated() {
    assert_eq!(normalize_channels(["a", "b", "a"]).unwrap(), vec!["a", "b"]);
    assert_eq!(
        normalize_channels(Vec::<String>::new()).unwrap_err().code(),
        "INVALID_CHANNELS"
    );
    assert_eq!(normalize_channels(["a", ""]).unwrap_err().code(), "INVALID_CHANNELS");
}
