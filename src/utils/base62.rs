//! Base62 codec mapping link ids to public short codes.
//!
//! The mapping is a bijection between `u64` and non-empty strings over
//! [`ALPHABET`] without leading zero digits, so a code derived from a unique id
//! is itself unique and no collision check is ever needed.

use thiserror::Error;

/// Digit alphabet, most significant digit first.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = 62;

/// Longest code a `u64` can produce (`u64::MAX` encodes to 11 digits).
pub const MAX_CODE_LEN: usize = 11;

/// Errors returned by [`decode`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input string cannot be empty")]
    Empty,
    #[error("invalid character found: {0:?}")]
    InvalidCharacter(char),
    #[error("value does not fit in 64 bits")]
    Overflow,
}

/// Encodes a number into its base62 representation.
///
/// # Examples
///
/// ```
/// use linkgate::utils::base62::encode;
///
/// assert_eq!(encode(0), "0");
/// assert_eq!(encode(61), "Z");
/// assert_eq!(encode(62), "10");
/// ```
pub fn encode(mut num: u64) -> String {
    if num == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut digits = Vec::with_capacity(MAX_CODE_LEN);
    while num > 0 {
        digits.push(ALPHABET[(num % BASE) as usize]);
        num /= BASE;
    }
    digits.reverse();

    digits.into_iter().map(char::from).collect()
}

/// Decodes a base62 string back into a number.
///
/// # Errors
///
/// Returns [`DecodeError`] for empty input, characters outside [`ALPHABET`],
/// or values larger than `u64::MAX`.
pub fn decode(input: &str) -> Result<u64, DecodeError> {
    if input.is_empty() {
        return Err(DecodeError::Empty);
    }

    input.chars().try_fold(0u64, |acc, c| {
        let digit = digit_value(c).ok_or(DecodeError::InvalidCharacter(c))?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(DecodeError::Overflow)
    })
}

/// Returns true if `code` could have been produced by [`encode`].
///
/// Used to reject arbitrary input before it reaches the cache or the database.
pub fn is_valid_code(code: &str) -> bool {
    if code.is_empty() || code.len() > MAX_CODE_LEN {
        return false;
    }
    // "0" is the only canonical code with a leading zero digit
    if code.len() > 1 && code.starts_with('0') {
        return false;
    }
    decode(code).is_ok()
}

fn digit_value(c: char) -> Option<u64> {
    match c {
        '0'..='9' => Some(c as u64 - '0' as u64),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 10),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 36),
        _ => None,
    }
}
