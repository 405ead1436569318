use url::Url;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const GENERATED_CODE_LEN: usize = 6;
pub const MIN_SUFFIX_LEN: usize = 3;
pub const MAX_SUFFIX_LEN: usize = 32;

/// Schemes that would execute in the browser when followed from the interstitial
const SCRIPT_SCHEMES: &[&str] = &["javascript", "data", "vbscript"];

/// Generate a random short code
pub fn generate_code() -> String {
    std::iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
        .take(GENERATED_CODE_LEN)
        .collect()
}

/// Custom suffixes are 3-32 ASCII letters, digits, `_` or `-`
pub fn is_valid_suffix(suffix: &str) -> bool {
    (MIN_SUFFIX_LEN..=MAX_SUFFIX_LEN).contains(&suffix.len())
        && suffix
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Destination must be an absolute URL
pub fn is_valid_destination(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => !SCRIPT_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_the_alphanumeric_alphabet() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), GENERATED_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn suffix_rules() {
        assert!(is_valid_suffix("demo"));
        assert!(is_valid_suffix("a_b-C9"));
        assert!(is_valid_suffix(&"x".repeat(32)));

        assert!(!is_valid_suffix("ab"));
        assert!(!is_valid_suffix(&"x".repeat(33)));
        assert!(!is_valid_suffix("has space"));
        assert!(!is_valid_suffix("slash/es"));
        assert!(!is_valid_suffix("ünï"));
    }

    #[test]
    fn destinations_must_be_absolute() {
        assert!(is_valid_destination("https://example.com"));
        assert!(is_valid_destination("http://example.com/path?q=1#frag"));
        assert!(is_valid_destination("ftp://files.example.com/a"));

        assert!(!is_valid_destination("example.com"));
        assert!(!is_valid_destination("/relative/path"));
        assert!(!is_valid_destination(""));
        assert!(!is_valid_destination("javascript:alert(1)"));
    }
}
