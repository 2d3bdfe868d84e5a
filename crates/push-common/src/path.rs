//! Push service endpoint templates and positional path rendering.
//!
//! Templates contain numbered placeholders (`{0}`, `{1}`, ...) and nothing
//! else is expanded. Arguments are inserted verbatim, so each must be a
//! single path segment made only of characters a URL parser leaves alone.

use thiserror::Error;

/// Account creation with an SMS verification code.
pub const CREATE_ACCOUNT_SMS_PATH: &str = "/v1/accounts/sms/{0}";
/// Account creation with a voice-call verification code.
pub const CREATE_ACCOUNT_VOICE_PATH: &str = "/v1/accounts/voice/{0}";
/// Account verification with the received code.
pub const VERIFY_ACCOUNT_PATH: &str = "/v1/accounts/code/{0}";
/// Push token registration (PUT) and removal (DELETE).
pub const REGISTER_TOKEN_PATH: &str = "/v1/accounts/gcm/";
/// Directory snapshot descriptor.
pub const DIRECTORY_PATH: &str = "/v1/directory/";
/// Message submission.
pub const MESSAGE_PATH: &str = "/v1/messages/";
/// Attachment slot allocation; an empty id requests a new slot.
pub const ATTACHMENT_PATH: &str = "/v1/attachments/{0}";

/// Punctuation allowed in a path argument besides ASCII letters and digits
/// (RFC 3986 `pchar` without percent-encoding).
const SEGMENT_PUNCTUATION: &str = "-._~!$&'()*+,;=:@";

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SEGMENT_PUNCTUATION.contains(c)
}

/// Errors that can occur while rendering a path template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The number of arguments does not match the template's placeholders.
    #[error("path template expects {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Placeholder count declared by the template.
        expected: usize,
        /// Arguments supplied by the caller.
        actual: usize,
    },
    /// An argument contains a character that would alter the URL structure
    /// or be rewritten by URL parsing.
    #[error("path argument {index} contains reserved character {ch:?}")]
    ReservedCharacter {
        /// Position of the offending argument.
        index: usize,
        /// The rejected character.
        ch: char,
    },
    /// An argument is a `.` or `..` segment, which URL normalisation removes.
    #[error("path argument {index} is a dot segment")]
    DotSegment {
        /// Position of the offending argument.
        index: usize,
    },
    /// The rendered path changed when placed into a URL.
    #[error("path {rendered:?} would be sent as {sent:?}")]
    Rewritten {
        /// Path as rendered from the template.
        rendered: String,
        /// Path the URL actually carries.
        sent: String,
    },
    /// The template has an unterminated or non-numeric placeholder.
    #[error("malformed placeholder in path template {0:?}")]
    MalformedTemplate(String),
}

/// Substitutes `args` into the numbered placeholders of `template`.
///
/// # Examples
///
/// ```
/// use push_common::path::{render, VERIFY_ACCOUNT_PATH};
///
/// let path = render(VERIFY_ACCOUNT_PATH, &["123456"]).unwrap();
/// assert_eq!(path, "/v1/accounts/code/123456");
/// ```
///
/// # Errors
///
/// Returns [`PathError`] if the template is malformed, the argument count
/// differs from the placeholder count, or an argument is not a plain path
/// segment.
pub fn render(template: &str, args: &[&str]) -> Result<String, PathError> {
    let expected = placeholder_count(template)?;
    if expected != args.len() {
        return Err(PathError::ArgumentCount {
            expected,
            actual: args.len(),
        });
    }

    for (index, arg) in args.iter().enumerate() {
        if let Some(ch) = arg.chars().find(|c| !is_segment_char(*c)) {
            return Err(PathError::ReservedCharacter { index, ch });
        }
        if matches!(*arg, "." | "..") {
            return Err(PathError::DotSegment { index });
        }
    }

    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PathError::MalformedTemplate(template.to_string()))?;
        let index: usize = after[..close]
            .parse()
            .map_err(|_| PathError::MalformedTemplate(template.to_string()))?;
        out.push_str(args[index]);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Returns the number of positional arguments a template consumes
/// (highest placeholder index plus one).
fn placeholder_count(template: &str) -> Result<usize, PathError> {
    let mut count = 0;
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PathError::MalformedTemplate(template.to_string()))?;
        let index: usize = after[..close]
            .parse()
            .map_err(|_| PathError::MalformedTemplate(template.to_string()))?;
        count = count.max(index + 1);
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(PathError::MalformedTemplate(template.to_string()));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_argument_templates() {
        assert_eq!(
            render(CREATE_ACCOUNT_SMS_PATH, &["+15551234567"]).unwrap(),
            "/v1/accounts/sms/+15551234567"
        );
        assert_eq!(
            render(CREATE_ACCOUNT_VOICE_PATH, &["+15551234567"]).unwrap(),
            "/v1/accounts/voice/+15551234567"
        );
    }

    #[test]
    fn renders_fixed_paths_without_arguments() {
        assert_eq!(render(MESSAGE_PATH, &[]).unwrap(), "/v1/messages/");
        assert_eq!(render(REGISTER_TOKEN_PATH, &[]).unwrap(), "/v1/accounts/gcm/");
        assert_eq!(render(DIRECTORY_PATH, &[]).unwrap(), "/v1/directory/");
    }

    #[test]
    fn empty_attachment_id_requests_new_slot() {
        assert_eq!(render(ATTACHMENT_PATH, &[""]).unwrap(), "/v1/attachments/");
    }

    #[test]
    fn substitutes_multiple_arguments_in_order() {
        let path = render("/v1/a/{0}/b/{1}", &["first", "second"]).unwrap();
        assert_eq!(path, "/v1/a/first/b/second");
    }

    #[test]
    fn placeholders_may_be_reordered() {
        let path = render("/x/{1}/{0}", &["zero", "one"]).unwrap();
        assert_eq!(path, "/x/one/zero");
    }

    #[test]
    fn leaves_other_characters_untouched() {
        let path = render("/v1/odd-path_~.%20/{0}", &["a+b=c"]).unwrap();
        assert_eq!(path, "/v1/odd-path_~.%20/a+b=c");
    }

    #[test]
    fn rejects_argument_count_mismatch() {
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &[]),
            Err(PathError::ArgumentCount {
                expected: 1,
                actual: 0
            })
        );
        assert_eq!(
            render(MESSAGE_PATH, &["extra"]),
            Err(PathError::ArgumentCount {
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn rejects_reserved_characters_in_arguments() {
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["12/../admin"]),
            Err(PathError::ReservedCharacter { index: 0, ch: '/' })
        );
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["1?x=2"]),
            Err(PathError::ReservedCharacter { index: 0, ch: '?' })
        );
        assert!(matches!(
            render(VERIFY_ACCOUNT_PATH, &["12\n34"]),
            Err(PathError::ReservedCharacter { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_dot_segments() {
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &[".."]),
            Err(PathError::DotSegment { index: 0 })
        );
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["."]),
            Err(PathError::DotSegment { index: 0 })
        );
        assert_eq!(render(VERIFY_ACCOUNT_PATH, &["1.2"]).unwrap(), "/v1/accounts/code/1.2");
    }

    #[test]
    fn rejects_characters_urls_would_rewrite() {
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["%2e%2e"]),
            Err(PathError::ReservedCharacter { index: 0, ch: '%' })
        );
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["a b"]),
            Err(PathError::ReservedCharacter { index: 0, ch: ' ' })
        );
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["a\\b"]),
            Err(PathError::ReservedCharacter { index: 0, ch: '\\' })
        );
        assert_eq!(
            render(VERIFY_ACCOUNT_PATH, &["caf\u{e9}"]),
            Err(PathError::ReservedCharacter { index: 0, ch: '\u{e9}' })
        );
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(matches!(
            render("/v1/{0", &["a"]),
            Err(PathError::MalformedTemplate(_))
        ));
        assert!(matches!(
            render("/v1/{name}", &["a"]),
            Err(PathError::MalformedTemplate(_))
        ));
        assert!(matches!(
            render("/v1/}", &[]),
            Err(PathError::MalformedTemplate(_))
        ));
    }
}
