//! Integer literal parsing
//!
//! Declarations carry their numbers as text. A literal may be written in
//! decimal, or in hex/octal/binary with a `0x`/`0o`/`0b` prefix, with an
//! optional sign and `_` separators between digits.

/// Parse an integer literal, returning `None` when the text is not one
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let prefix = body.get(..2).map(|p| p.to_ascii_lowercase());
    let (radix, digits, prefixed) = match prefix.as_deref() {
        Some("0x") => (16, &body[2..], true),
        Some("0o") => (8, &body[2..], true),
        Some("0b") => (2, &body[2..], true),
        _ => (10, body, false),
    };

    let cleaned = strip_separators(digits, prefixed)?;

    // "010" is ambiguous, only plain zeros may lead a decimal literal
    if radix == 10
        && cleaned.len() > 1
        && cleaned.starts_with('0')
        && cleaned.bytes().any(|b| b != b'0')
    {
        return None;
    }

    let magnitude = i128::from_str_radix(&cleaned, radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

/// Remove `_` separators. They may sit between digits, or right after a
/// radix prefix, but never lead, trail or repeat.
fn strip_separators(digits: &str, prefixed: bool) -> Option<String> {
    if digits.is_empty() || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    if digits.starts_with('_') && !prefixed {
        return None;
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    // from_str_radix accepts its own sign, which we have already consumed
    if cleaned.is_empty() || cleaned.starts_with(['+', '-']) {
        return None;
    }
    Some(cleaned)
}
