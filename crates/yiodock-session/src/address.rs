//! Target address resolution.

use url::Url;

use crate::SessionError;

/// Builds the dock's WebSocket address from a configured host and port.
///
/// Resolution is purely syntactic (no DNS lookup): the host must be a bare
/// hostname, IPv4 literal, or bracketed IPv6 literal, with no scheme, path,
/// credentials, or port of its own.
///
/// # Errors
/// Returns [`SessionError::InvalidAddress`] for an empty or malformed host.
pub fn resolve_address(host: &str, port: u16) -> Result<String, SessionError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(SessionError::InvalidAddress("host is empty".into()));
    }

    let url = Url::parse(&format!("ws://{host}:{port}"))
        .map_err(|e| SessionError::InvalidAddress(format!("{host:?}: {e}")))?;

    let bare = url.host_str().is_some()
        && url.username().is_empty()
        && url.password().is_none()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none();
    if !bare {
        return Err(SessionError::InvalidAddress(format!(
            "{host:?} is not a bare host name"
        )));
    }

    Ok(url.into())
}
