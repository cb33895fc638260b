//! Text normalisation shared by the override layer and the vector space.
//!
//! Pattern matching runs on `lowercase_for_patterns` (nothing dropped, no
//! abbreviation expansion). Vectorisation runs on `tokens`, which expands
//! tickers and drops tokens shorter than three characters.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Minimum token length kept for vectorisation.
pub const MIN_TOKEN_LEN: usize = 3;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]|_").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Ticker and slang expansions applied before vectorisation.
static ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("btc", "bitcoin"),
        ("xbt", "bitcoin"),
        ("eth", "ethereum"),
        ("sol", "solana"),
        ("ada", "cardano"),
        ("xrp", "ripple"),
        ("doge", "dogecoin"),
        ("dot", "polkadot"),
        ("ltc", "litecoin"),
        ("bnb", "binance"),
        ("usdt", "tether"),
        ("nft", "nonfungible"),
        ("nfts", "nonfungible"),
        ("defi", "decentralized finance"),
        ("dex", "exchange"),
        ("hodl", "hold"),
        ("ath", "alltime high"),
    ])
});

/// Lower-case, replace non-word characters with spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Lower-cased, trimmed text for the override layer. Punctuation is kept so
/// rules like `what's` and `?` still see it.
pub fn lowercase_for_patterns(text: &str) -> String {
    WHITESPACE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Expand a single token through the abbreviation table.
pub fn expand_token(token: &str) -> &str {
    ABBREVIATIONS.get(token).copied().unwrap_or(token)
}

/// Canonical tokens for vectorisation: normalised, expanded, short tokens dropped.
pub fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .flat_map(|t| expand_token(t).split(' '))
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Canonical query key used by the response cache.
pub fn canonical(text: &str) -> String {
    tokens(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  What's the PRICE of BTC?!  "), "what s the price of btc");
        assert_eq!(normalize("snake_case--text"), "snake case text");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert!(tokens("   ").is_empty());
        assert_eq!(canonical("?!"), "");
    }

    #[test]
    fn test_tokens_expand_and_filter() {
        assert_eq!(tokens("Is BTC up or down?"), vec!["bitcoin", "down"]);
        assert_eq!(tokens("eth and sol"), vec!["ethereum", "and", "solana"]);
        assert_eq!(tokens("defi yields"), vec!["decentralized", "finance", "yields"]);
    }

    #[test]
    fn test_pattern_text_keeps_short_tokens() {
        assert_eq!(lowercase_for_patterns("  Hi   THERE "), "hi there");
        assert_eq!(lowercase_for_patterns("Price of ETH?"), "price of eth?");
    }
}
