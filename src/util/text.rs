use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use regex::{Captures, Regex};

use crate::device::md5_hex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("static regex"));

/// Text between the first `start` and the next `end` after it.
pub fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

/// Shrinks every run of two or more whitespace characters to its first one.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(text, |caps: &Captures| {
            caps[0].chars().next().map(String::from).unwrap_or_default()
        })
        .into_owned()
}

/// True when every character is an ASCII digit. The empty string counts.
pub fn is_digits(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_digit())
}

/// `len` characters from `[A-Za-z0-9]`, drawn from the OS RNG.
pub fn random_string(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 32 uppercase hex characters from 48 random bytes.
pub fn unique_id() -> String {
    let mut bytes = [0u8; 48];
    OsRng.fill_bytes(&mut bytes);
    md5_hex(&URL_SAFE.encode(bytes), true, false)
}

/// Replaces `\uXXXX` escapes (and surrogate pairs) with their characters.
///
/// Escapes that do not decode are kept verbatim.
pub fn decode_unicode_escapes(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(pos) = rest.find("\\u") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        match parse_escape(after) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &after[used..];
            }
            None => {
                out.push_str("\\u");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn hex4(text: &str) -> Option<u32> {
    let digits = text.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Decoded char and the number of bytes consumed after the leading `\u`.
fn parse_escape(text: &str) -> Option<(char, usize)> {
    let unit = hex4(text)?;

    if (0xD800..0xDC00).contains(&unit) {
        let low = text.get(4..)?.strip_prefix("\\u").and_then(hex4)?;
        if !(0xDC00..0xE000).contains(&low) {
            return None;
        }
        let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
        return char::from_u32(code).map(|c| (c, 10));
    }

    char::from_u32(unit).map(|c| (c, 4))
}
