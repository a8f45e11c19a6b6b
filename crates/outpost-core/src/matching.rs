//! # Code & Name Matching
//!
//! String strategies used wherever a scanned or typed value is compared
//! with catalog data.
//!
//! - [`loose_key`]: barcode/SKU normal form (case-insensitive, only
//!   alphanumerics kept). `"abc-123 "` and `"ABC123"` share a key.
//! - [`tokenize_name`]: product name → search tokens for prefix search.
//!
//! Both are applied to stored values when they are written and to queries
//! when they are looked up, so the store can index the results.

/// Loose normal form of a barcode or SKU.
///
/// Symmetric by construction: two codes loosely match exactly when their
/// keys are equal.
pub fn loose_key(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strict or loose equality between two codes.
///
/// Codes with no alphanumerics at all never match loosely.
pub fn codes_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let key = loose_key(a);
    !key.is_empty() && key == loose_key(b)
}

/// Split a product name into lower-case search tokens.
///
/// Tokens are separated by anything that is not alphanumeric. Duplicates
/// are dropped, first occurrence order kept.
pub fn tokenize_name(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in name.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_lowercase();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// True when every query token is a prefix of at least one name token.
///
/// An empty query matches nothing.
pub fn name_matches_prefixes(query_tokens: &[String], name_tokens: &[String]) -> bool {
    !query_tokens.is_empty()
        && query_tokens
            .iter()
            .all(|q| name_tokens.iter().any(|t| t.starts_with(q.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_key() {
        assert_eq!(loose_key("abc-123 "), "abc123");
        assert_eq!(loose_key("ABC123"), "abc123");
        assert_eq!(loose_key(" 0-12345-67890-5 "), "012345678905");
        assert_eq!(loose_key("--"), "");
    }

    #[test]
    fn test_codes_match_is_symmetric() {
        let pairs = [
            ("abc-123", "ABC 123"),
            ("4006381333931", "4006381333931"),
            ("sku/7", "SKU7"),
            ("sku-7", "sku-8"),
            ("", "x"),
            ("-", "_"),
        ];
        for (a, b) in pairs {
            assert_eq!(codes_match(a, b), codes_match(b, a), "{a} vs {b}");
        }
        assert!(codes_match("abc-123", "ABC 123"));
        assert!(!codes_match("sku-7", "sku-8"));
        assert!(!codes_match("-", "_"));
        assert!(!codes_match("", ""));
    }

    #[test]
    fn test_tokenize_name() {
        assert_eq!(
            tokenize_name("Coca-Cola Zero 330ml (Can) coca"),
            vec!["coca", "cola", "zero", "330ml", "can"]
        );
        assert!(tokenize_name("  -- ").is_empty());
    }

    #[test]
    fn test_prefix_matching_requires_every_token() {
        let name = tokenize_name("Coca-Cola Zero 330ml");
        assert!(name_matches_prefixes(&tokenize_name("coc zer"), &name));
        assert!(name_matches_prefixes(&tokenize_name("330"), &name));
        assert!(!name_matches_prefixes(&tokenize_name("coc diet"), &name));
        assert!(!name_matches_prefixes(&[], &name));
    }
}
