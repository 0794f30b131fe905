//! Utility macros and functions for the HTTP crate.

/// A macro for early returns with an error if a condition is not met.
///
/// Similar to `assert!`, but returns the error instead of panicking.
///
/// ```ignore
/// ensure!(headers.len() < MAX_HEADERS, ParseError::TooManyHeaders);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Checks whether a comma separated header value contains `token`.
///
/// Tokens may be surrounded by spaces or tabs; the comparison ignores ASCII case.
pub(crate) fn has_token(value: &[u8], token: &[u8]) -> bool {
    value.split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token))
}
