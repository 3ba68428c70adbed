//! FD classification
//!
//! Rules are applied in order and the first match wins. Descriptors 0, 1 and 2
//! are `Standard` whatever they point at, even a socket.

use crate::types::FdKind;

/// Link target prefix of socket kernel objects
pub const SOCKET_MARKER: &str = "socket:";

/// Link target prefix of pipe kernel objects
pub const PIPE_MARKER: &str = "pipe:";

/// Target recorded when a link cannot be resolved
pub const UNREADABLE_TARGET: &str = "<unreadable>";

#[must_use]
pub fn classify(fd: u32, target: &str) -> FdKind {
    if fd <= 2 {
        FdKind::Standard
    } else if target.starts_with(SOCKET_MARKER) {
        FdKind::Socket
    } else if target.starts_with(PIPE_MARKER) {
        FdKind::Pipe
    } else if target.starts_with('/') {
        FdKind::File
    } else {
        FdKind::Other
    }
}
