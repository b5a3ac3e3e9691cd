// Header scheme expected by the PoolSync firmware.
//
// Every request carries a fixed `user` header. Once paired, requests also
// carry the access password verbatim in the `authorization` header (no
// scheme prefix).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Header carrying the access password.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header identifying the calling application.
pub const USER_HEADER: &str = "user";

/// Fixed value the firmware expects in the `user` header.
pub const USER_HEADER_VALUE: &str = "b167ecc8-87ce-47da-9b7d-cab632a2eeba";

/// Build the header set for one request.
///
/// The authorization value is marked sensitive so it never shows up in
/// `reqwest`'s debug output.
pub(crate) fn request_headers(password: Option<&SecretString>) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(USER_HEADER),
        HeaderValue::from_static(USER_HEADER_VALUE),
    );

    if let Some(password) = password {
        let mut value = HeaderValue::from_str(password.expose_secret())
            .map_err(|_| Error::InvalidCredential)?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static(AUTHORIZATION_HEADER), value);
    }

    Ok(headers)
}
