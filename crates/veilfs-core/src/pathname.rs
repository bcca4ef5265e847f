//! Path canonicalization helpers shared by the path and mount surfaces.

use std::borrow::Cow;

use veilfs_common::constants::MAX_LEN_PATHNAME;
use veilfs_common::error::{Result, VeilError};

const ESCAPED: [char; 4] = [' ', '\t', '\n', '\\'];

/// Escapes a resolved path the way the kernel renders it in
/// `/proc/*/mountinfo`: space, tab, newline and backslash become a
/// backslash followed by three octal digits.
///
/// Registered paths are compared against this form.
#[must_use]
pub fn escape_path(path: &str) -> Cow<'_, str> {
    if !path.contains(ESCAPED) {
        return Cow::Borrowed(path);
    }
    let mut out = String::with_capacity(path.len() + 8);
    for c in path.chars() {
        if ESCAPED.contains(&c) {
            out.push_str(&format!("\\{:03o}", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Reverses [`escape_path`]. Malformed escapes are kept verbatim.
#[must_use]
pub fn unescape_path(path: &str) -> Cow<'_, str> {
    if !path.contains('\\') {
        return Cow::Borrowed(path);
    }
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Some(byte) = octal_byte(&bytes[i + 1..i + 4]) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

fn octal_byte(digits: &[u8]) -> Option<u8> {
    digits.iter().try_fold(0_u8, |acc, &d| {
        if (b'0'..=b'7').contains(&d) {
            acc.checked_mul(8)?.checked_add(d - b'0')
        } else {
            None
        }
    })
}

/// Checks that a registered path fits the fixed transfer buffer.
///
/// # Errors
///
/// Returns `TransferFault` if the path is empty, too long, or contains a
/// NUL byte.
pub fn validate_pathname(store: &'static str, field: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(VeilError::TransferFault {
            store,
            message: format!("{field} is empty"),
        });
    }
    if path.len() > MAX_LEN_PATHNAME {
        return Err(VeilError::TransferFault {
            store,
            message: format!(
                "{field} is {} bytes, limit is {MAX_LEN_PATHNAME}",
                path.len()
            ),
        });
    }
    if path.contains('\0') {
        return Err(VeilError::TransferFault {
            store,
            message: format!("{field} contains a NUL byte"),
        });
    }
    Ok(())
}
