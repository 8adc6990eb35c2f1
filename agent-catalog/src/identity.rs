//! Identifier derivation for new artifacts.

/// Identifier used when a name hint sanitizes to nothing.
pub const FALLBACK_IDENTIFIER: &str = "tool";

/// Identifier used when a description sanitizes to nothing.
pub const FALLBACK_DESCRIBED_IDENTIFIER: &str = "tool_custom";

/// Turns a caller-supplied name hint into an identifier base.
///
/// Lowercases, maps every character outside `[a-z0-9_]` to `_`, truncates
/// to `max_len` characters and falls back to [`FALLBACK_IDENTIFIER`].
#[must_use]
pub fn sanitize_name_hint(hint: &str, max_len: usize) -> String {
    let sanitized: String = hint
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();
    if sanitized.is_empty() {
        FALLBACK_IDENTIFIER.to_owned()
    } else {
        sanitized
    }
}

/// Derives an identifier base from a natural-language description.
///
/// Punctuation is dropped, whitespace runs become `_`, the result is
/// lowercased, truncated to `max_len` and prefixed with `tool_`.
#[must_use]
pub fn derive_from_description(description: &str, max_len: usize) -> String {
    let kept: String = description
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let joined = kept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_ascii_lowercase();
    let truncated: String = joined.chars().take(max_len).collect();
    if truncated.is_empty() {
        FALLBACK_DESCRIBED_IDENTIFIER.to_owned()
    } else {
        format!("tool_{truncated}")
    }
}

/// Yields `base`, then `base_1`, `base_2`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_owned()).chain((1u64..).map(move |n| format!("{base}_{n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hints_are_sanitized_and_truncated() {
        assert_eq!(sanitize_name_hint(" BTC Price! ", 40), "btc_price_");
        assert_eq!(sanitize_name_hint("", 40), FALLBACK_IDENTIFIER);
        assert_eq!(sanitize_name_hint("abcdef", 3), "abc");
        assert_eq!(sanitize_name_hint("météo", 40), "m_t_o");
    }

    #[test]
    fn descriptions_become_prefixed_identifiers() {
        assert_eq!(
            derive_from_description("Fetch the current price of Bitcoin, in USD.", 40),
            "tool_fetch_the_current_price_of_bitcoin_in_us"
        );
        assert_eq!(
            derive_from_description("a b c d e f", 5),
            "tool_a_b_c"
        );
        assert_eq!(derive_from_description("!!!", 40), FALLBACK_DESCRIBED_IDENTIFIER);
    }

    #[test]
    fn candidates_append_increasing_suffixes() {
        let first: Vec<String> = candidates("weather").take(3).collect();
        assert_eq!(first, ["weather", "weather_1", "weather_2"]);
    }
}
