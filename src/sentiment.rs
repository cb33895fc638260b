//! Market sentiment from short texts (headlines, descriptions).
//!
//! Weighted keyword hits per tier and direction decide the label; the tier
//! mix inside the winning direction decides the intensity. Theme tags are
//! collected independently of direction.

use crate::config::SentimentConfig;
use crate::normalizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "bullish",
            SentimentLabel::Bearish => "bearish",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Strong,
    Moderate,
    Weak,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Strong => "strong",
            Intensity::Moderate => "moderate",
            Intensity::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierHits {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl TierHits {
    fn weighted(&self, config: &SentimentConfig) -> f64 {
        self.strong as f64 * config.strong_weight
            + self.moderate as f64 * config.moderate_weight
            + self.weak as f64 * config.weak_weight
    }

    fn intensity(&self) -> Intensity {
        if self.strong > 0 && self.strong >= self.moderate + self.weak {
            Intensity::Strong
        } else if self.strong + self.moderate >= self.weak {
            Intensity::Moderate
        } else {
            Intensity::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub label: SentimentLabel,
    pub intensity: Intensity,
    pub factors: BTreeSet<String>,
    pub bullish_score: f64,
    pub bearish_score: f64,
    pub bullish: TierHits,
    pub bearish: TierHits,
    pub neutral_hits: usize,
}

impl SentimentReading {
    pub fn summary(&self) -> String {
        let base = match self.label {
            SentimentLabel::Neutral => "Market sentiment looks neutral".to_string(),
            label => format!(
                "Market sentiment looks {} {}",
                self.intensity.as_str(),
                label.as_str()
            ),
        };
        if self.factors.is_empty() {
            format!("{}.", base)
        } else {
            let factors: Vec<&str> = self.factors.iter().map(String::as_str).collect();
            format!("{}, driven by {}.", base, factors.join(", "))
        }
    }
}

const BULLISH_STRONG: &[&str] = &[
    "surge", "surges", "soar", "soars", "skyrocket", "skyrockets", "all time high", "record high",
    "breakout", "moon", "parabolic", "rally", "rallies",
];
const BULLISH_MODERATE: &[&str] = &[
    "gain", "gains", "rise", "rises", "climb", "climbs", "jump", "jumps", "bullish", "uptrend",
    "approval", "approved", "adoption", "inflows", "recovery", "rebound",
];
const BULLISH_WEAK: &[&str] = &[
    "up", "higher", "growth", "positive", "optimism", "optimistic", "support", "steady gains",
    "green", "buy",
];

const BEARISH_STRONG: &[&str] = &[
    "crash", "crashes", "plunge", "plunges", "collapse", "collapses", "capitulation", "hack",
    "hacked", "exploit", "bankruptcy", "liquidation", "liquidations", "rug pull",
];
const BEARISH_MODERATE: &[&str] = &[
    "drop", "drops", "fall", "falls", "decline", "declines", "slump", "bearish", "downtrend",
    "selloff", "sell off", "outflows", "lawsuit", "ban", "crackdown",
];
const BEARISH_WEAK: &[&str] = &[
    "down", "lower", "negative", "concern", "concerns", "uncertainty", "fear", "risk", "red",
    "sell", "volatile",
];

const NEUTRAL: &[&str] = &[
    "stable", "steady", "flat", "unchanged", "sideways", "consolidation", "consolidates",
    "range", "mixed", "holds",
];

#[rustfmt::skip]
const THEMES: &[(&str, &[&str])] = &[
    ("regulation", &["regulation", "regulator", "regulators", "sec", "lawsuit", "ban", "crackdown", "compliance", "legislation"]),
    ("institutional", &["etf", "institutional", "institutions", "blackrock", "fund", "funds", "inflows", "outflows"]),
    ("adoption", &["adoption", "payments", "merchants", "integration", "partnership", "launch", "launches"]),
    ("security", &["hack", "hacked", "exploit", "breach", "scam", "phishing", "rug pull"]),
    ("macro", &["inflation", "fed", "interest rate", "interest rates", "recession", "dollar", "treasury"]),
    ("technology", &["upgrade", "fork", "layer", "scaling", "mainnet", "testnet", "protocol"]),
    ("defi", &["defi", "decentralized finance", "lending", "yield", "liquidity", "dex"]),
    ("mining", &["mining", "miners", "hashrate", "halving"]),
];

pub struct SentimentAnalyzer {
    config: SentimentConfig,
}

impl SentimentAnalyzer {
    pub fn new(config: SentimentConfig) -> Self {
        Self { config }
    }

    pub fn analyze<S: AsRef<str>>(&self, texts: &[S]) -> SentimentReading {
        let mut bullish = TierHits::default();
        let mut bearish = TierHits::default();
        let mut neutral_hits = 0;
        let mut factors = BTreeSet::new();

        for text in texts {
            // Padded so phrase lookups respect word boundaries.
            let padded = format!(" {} ", normalizer::normalize(text.as_ref()));

            bullish.strong += count_hits(&padded, BULLISH_STRONG);
            bullish.moderate += count_hits(&padded, BULLISH_MODERATE);
            bullish.weak += count_hits(&padded, BULLISH_WEAK);
            bearish.strong += count_hits(&padded, BEARISH_STRONG);
            bearish.moderate += count_hits(&padded, BEARISH_MODERATE);
            bearish.weak += count_hits(&padded, BEARISH_WEAK);
            neutral_hits += count_hits(&padded, NEUTRAL);

            for (theme, keywords) in THEMES {
                if count_hits(&padded, keywords) > 0 {
                    factors.insert(theme.to_string());
                }
            }
        }

        let bullish_score = bullish.weighted(&self.config);
        let bearish_score = bearish.weighted(&self.config);
        let neutral_score = neutral_hits as f64 * self.config.weak_weight;
        let leading = bullish_score.max(bearish_score);

        let too_close = (bullish_score - bearish_score).abs() <= self.config.neutral_margin;
        let (label, intensity) = if too_close || neutral_score > leading {
            (SentimentLabel::Neutral, Intensity::Weak)
        } else if bullish_score > bearish_score {
            (SentimentLabel::Bullish, bullish.intensity())
        } else {
            (SentimentLabel::Bearish, bearish.intensity())
        };

        SentimentReading {
            label,
            intensity,
            factors,
            bullish_score,
            bearish_score,
            bullish,
            bearish,
            neutral_hits,
        }
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new(SentimentConfig::default())
    }
}

fn count_hits(padded: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|kw| padded.contains(&format!(" {} ", kw)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_bullish() {
        let reading = SentimentAnalyzer::default().analyze(&[
            "Bitcoin surges to record high as ETF inflows continue",
            "Ethereum rally extends, analysts see breakout",
        ]);
        assert_eq!(reading.label, SentimentLabel::Bullish);
        assert_eq!(reading.intensity, Intensity::Strong);
        assert!(reading.factors.contains("institutional"));
    }

    #[test]
    fn test_moderate_bearish_with_regulation_theme() {
        let reading = SentimentAnalyzer::default().analyze(&[
            "Crypto prices drop after SEC lawsuit",
            "Altcoins decline amid regulatory crackdown",
        ]);
        assert_eq!(reading.label, SentimentLabel::Bearish);
        assert_eq!(reading.intensity, Intensity::Moderate);
        assert!(reading.factors.contains("regulation"));
    }

    #[test]
    fn test_balanced_is_neutral() {
        let reading = SentimentAnalyzer::default().analyze(&[
            "Bitcoin gains while ethereum drops",
        ]);
        assert_eq!(reading.label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_neutral_keywords_dominate() {
        let reading = SentimentAnalyzer::default().analyze(&[
            "Bitcoin holds steady in sideways range",
            "Market flat, prices unchanged",
            "Ethereum gains",
        ]);
        assert_eq!(reading.label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_empty_batch() {
        let reading = SentimentAnalyzer::default().analyze::<&str>(&[]);
        assert_eq!(reading.label, SentimentLabel::Neutral);
        assert!(reading.factors.is_empty());
        assert_eq!(reading.summary(), "Market sentiment looks neutral.");
    }

    #[test]
    fn test_margin_is_configurable() {
        let wide = SentimentAnalyzer::new(SentimentConfig {
            neutral_margin: 10.0,
            ..SentimentConfig::default()
        });
        let reading = wide.analyze(&["Bitcoin surges"]);
        assert_eq!(reading.label, SentimentLabel::Neutral);
        let reading = SentimentAnalyzer::default().analyze(&["Bitcoin surges"]);
        assert_eq!(reading.label, SentimentLabel::Bullish);
    }
}
