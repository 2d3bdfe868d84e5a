//! HTTP Basic credentials for the push service.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Builds the `Authorization` header value for `principal:secret`.
///
/// The value is derived on every call and never cached, so a caller that
/// swaps identities always sends the current one.
///
/// # Examples
///
/// ```
/// use push_common::auth::basic_credential;
///
/// let header = basic_credential("+15551234567", "hunter2");
/// assert_eq!(header, "Basic KzE1NTUxMjM0NTY3Omh1bnRlcjI=");
/// ```
#[must_use]
pub fn basic_credential(principal: &str, secret: &str) -> String {
    let encoded = BASE64.encode(format!("{principal}:{secret}"));
    format!("Basic {encoded}")
}
