#![forbid(unsafe_code)]

//! Lexicographic scan bounds for path-prefix ranges. A prefix scan selects
//! `path > prev_string(prefix) AND path < next_string(prefix)`, both strict,
//! so the prefix itself is included and everything outside its namespace is
//! not.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundError {
    CodePointOverflow,
}

/// Smallest string that sorts after `value` and after everything prefixed
/// by it. The empty prefix maps to the maximum code point as a one-char
/// string, an upper bound for every non-degenerate path.
pub fn next_string(value: &str) -> Result<String, BoundError> {
    let Some(last) = value.chars().next_back() else {
        return Ok(char::MAX.to_string());
    };
    let Some(bumped) = next_char(last) else {
        return Err(BoundError::CodePointOverflow);
    };
    let head = &value[..value.len() - last.len_utf8()];
    let mut out = String::with_capacity(head.len() + bumped.len_utf8());
    out.push_str(head);
    out.push(bumped);
    Ok(out)
}

/// Approximation of the greatest string that sorts before `value` and before
/// everything prefixed by it. Used as an exclusive lower bound, so the
/// sentinel suffix keeps `value` itself inside the range. There is no such
/// string below the empty prefix; it maps to itself.
pub fn prev_string(value: &str) -> String {
    let Some(last) = value.chars().next_back() else {
        return String::new();
    };
    let head = &value[..value.len() - last.len_utf8()];
    match prev_char(last) {
        Some(prev) => {
            let mut out = String::with_capacity(head.len() + prev.len_utf8() + char::MAX.len_utf8());
            out.push_str(head);
            out.push(prev);
            out.push(char::MAX);
            out
        }
        // Code point zero has no predecessor; the shortened string is
        // already strictly below everything in the namespace.
        None => head.to_string(),
    }
}

fn next_char(ch: char) -> Option<char> {
    let mut code = ch as u32 + 1;
    if (0xD800..=0xDFFF).contains(&code) {
        code = 0xE000;
    }
    char::from_u32(code)
}

fn prev_char(ch: char) -> Option<char> {
    let mut code = (ch as u32).checked_sub(1)?;
    if (0xD800..=0xDFFF).contains(&code) {
        code = 0xD7FF;
    }
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_string_bumps_last_char() {
        assert_eq!(next_string("hello").unwrap(), "hellp");
        assert_eq!(next_string("a").unwrap(), "b");
    }

    #[test]
    fn next_string_of_empty_is_max_code_point() {
        assert_eq!(next_string("").unwrap(), char::MAX.to_string());
    }

    #[test]
    fn next_string_skips_surrogate_gap() {
        assert_eq!(next_string("a\u{D7FF}").unwrap(), "a\u{E000}");
    }

    #[test]
    fn next_string_overflows_at_max_code_point() {
        assert_eq!(
            next_string("a\u{10FFFF}").unwrap_err(),
            BoundError::CodePointOverflow
        );
    }

    #[test]
    fn prev_string_appends_sentinel() {
        assert_eq!(prev_string("hello"), format!("helln{}", char::MAX));
    }

    #[test]
    fn prev_string_of_empty_is_empty() {
        assert_eq!(prev_string(""), "");
    }

    #[test]
    fn prev_string_drops_trailing_nul() {
        assert_eq!(prev_string("a\0"), "a");
    }

    #[test]
    fn prev_string_skips_surrogate_gap() {
        assert_eq!(prev_string("a\u{E000}"), format!("a\u{D7FF}{}", char::MAX));
    }

    #[test]
    fn bounds_bracket_the_prefix_namespace() {
        let prefix = "photos/";
        let lower = prev_string(prefix);
        let upper = next_string(prefix).unwrap();
        for path in ["photos/", "photos/a", "photos/zzz"] {
            assert!(lower.as_str() < path);
            assert!(path < upper.as_str());
        }
        assert!(lower.as_str() < prefix);
        assert!("photos." < lower.as_str());
        assert!("photos0" >= upper.as_str());
    }
}
