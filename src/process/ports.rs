//! Local port negotiation for the HTTP transport.

use crate::error::{Result, SupervisorError};
use std::net::TcpListener;
use tracing::debug;

const LOOPBACK: &str = "127.0.0.1";

/// Check if a port is free by binding and immediately releasing it
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind((LOOPBACK, port)) {
        Ok(listener) => listener.local_addr().is_ok(),
        Err(_) => false,
    }
}

/// Pick the port the helper should listen on.
///
/// The preferred port wins when it is free; otherwise the OS hands out an
/// ephemeral one.
pub fn negotiate_port(preferred: u16) -> Result<u16> {
    if preferred != 0 && is_port_available(preferred) {
        debug!(port = %preferred, "Using preferred port");
        return Ok(preferred);
    }

    let listener = TcpListener::bind((LOOPBACK, 0)).map_err(|e| {
        SupervisorError::ProcessError(format!("No free local port available: {e}"))
    })?;
    let port = listener.local_addr()?.port();

    debug!(
        preferred = %preferred,
        port = %port,
        "Preferred port unavailable, using a free port"
    );
    Ok(port)
}
