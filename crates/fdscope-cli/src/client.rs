//! Blocking client for the fdscope daemon

use fdscope_core::frame;
use fdscope_core::protocol::{Request, Response};
use fdscope_core::{FdscopeError, Result};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Send one request and wait for its response
pub fn call(socket: &Path, request: &Request) -> Result<Response> {
    let mut stream = UnixStream::connect(socket)?;
    tracing::debug!(socket = %socket.display(), ?request, "sending request");
    frame::write_frame(&mut stream, request)?;
    frame::read_frame(&mut stream)?
        .ok_or_else(|| FdscopeError::Protocol("daemon closed the connection without replying".into()))
}
