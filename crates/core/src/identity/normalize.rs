//! Filename legalization.

/// Longest legalized name, in characters.
pub const MAX_NAME_LEN: usize = 120;

const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const FALLBACK_NAME: &str = "untitled";

/// Turns an arbitrary human-facing name into a filesystem-legal one.
///
/// Strips path separators, reserved and control characters, collapses
/// whitespace runs, trims surrounding spaces and dots, caps the length and
/// never returns an empty string.
pub fn legalize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if FORBIDDEN.contains(&c) || c.is_control() {
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    let capped: String = out.chars().take(MAX_NAME_LEN).collect();
    let trimmed = capped.trim_matches(|c: char| c == '.' || c == ' ');

    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether a file name can be handed to toolchains that only cope with plain
/// ASCII names.
pub fn is_encoding_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_forbidden_characters() {
        assert_eq!(legalize_filename("AC/DC: Back in Black?"), "ACDC Back in Black");
        assert_eq!(legalize_filename("a\\b*c\"d<e>f|g"), "abcdefg");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(legalize_filename("  many   spaces\there \n"), "many spaces here");
    }

    #[test]
    fn test_trims_dots_and_rejects_traversal() {
        assert_eq!(legalize_filename(".."), "untitled");
        assert_eq!(legalize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(legalize_filename(". hidden ."), "hidden");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(legalize_filename(""), "untitled");
        assert_eq!(legalize_filename("???"), "untitled");
    }

    #[test]
    fn test_length_cap_respects_char_boundaries() {
        let long = "é".repeat(300);
        let legal = legalize_filename(&long);
        assert_eq!(legal.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_keeps_unicode() {
        assert_eq!(legalize_filename("Café – Ñandú"), "Café – Ñandú");
    }

    #[test]
    fn test_encoding_safe() {
        assert!(is_encoding_safe("song name-1_final.wav"));
        assert!(!is_encoding_safe("Café.wav"));
        assert!(!is_encoding_safe("曲.wav"));
        assert!(!is_encoding_safe("it's.wav"));
        assert!(!is_encoding_safe(""));
    }
}
