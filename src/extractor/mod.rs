//! Pattern-based extraction from source-site pages.
//!
//! The share pages are server-rendered HTML with a large inline JSON state blob.
//! Each field is pulled out by its own named function returning an `Option`, so a
//! markup change breaks one lookup instead of the whole pipeline.

pub mod page;
pub mod profile;
pub mod state;
pub mod streams;

pub use page::{extract, normalize_duration, ExtractedMetadata};
pub use profile::{extract_profile_id, note_url, ProfileLister, VideoList, VideoListEntry};
pub use state::{normalize_js_literals, parse_initial_state};
pub use streams::{find_streams, select_best_stream, Codec, MediaStream, SelectedStream};

/// Decode backslash escapes as they appear inside JS/JSON string literals.
///
/// Handles the JSON escapes, `\uXXXX` (with surrogate pairs) and `\xHH`; unknown
/// escapes keep the escaped character.
#[must_use]
pub fn unescape_js_string(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let Some(high) = take_hex(&mut chars, 4) else {
                    out.push_str("\\u");
                    continue;
                };
                if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair: expect a following \uDC00..\uDFFF
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                        if let Some(low) = take_hex(&mut lookahead, 4) {
                            if (0xDC00..0xE000).contains(&low) {
                                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                                if let Some(ch) = char::from_u32(combined) {
                                    out.push(ch);
                                    chars = lookahead;
                                    continue;
                                }
                            }
                        }
                    }
                    out.push(char::REPLACEMENT_CHARACTER);
                } else {
                    out.push(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            Some('x') => match take_hex(&mut chars, 2) {
                Some(code) => out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)),
                None => out.push_str("\\x"),
            },
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

fn take_hex(chars: &mut std::str::Chars<'_>, len: usize) -> Option<u32> {
    let mut lookahead = chars.clone();
    let mut value = 0u32;
    for _ in 0..len {
        let digit = lookahead.next()?.to_digit(16)?;
        value = value * 16 + digit;
    }
    *chars = lookahead;
    Some(value)
}
