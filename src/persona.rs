// Persona voices and the personality state machine.
// The primary voice is plain and informational; the stylized voice is a
// crypto-native "degen" trader who speaks in slang.

use crate::config::RetrievalConfig;
use crate::corpus::CorpusEntry;
use crate::logging;
use crate::retrieval::{RetrievalEngine, RetrievalStats};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Primary,
    Stylized,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Primary => "primary",
            Mode::Stylized => "stylized",
        }
    }

    pub fn from_str(s: &str) -> Option<Mode> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "normal" | "neutral" | "standard" => Some(Mode::Primary),
            "stylized" | "degen" | "fun" => Some(Mode::Stylized),
            _ => None,
        }
    }

    pub fn other(&self) -> Mode {
        match self {
            Mode::Primary => Mode::Stylized,
            Mode::Stylized => Mode::Primary,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Primary => "Coinpal",
            Mode::Stylized => "Degen Coinpal",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Mode::Primary => 0,
            Mode::Stylized => 1,
        }
    }

    fn from_u8(value: u8) -> Mode {
        if value == 1 {
            Mode::Stylized
        } else {
            Mode::Primary
        }
    }
}

// ============ Voice Lines ============

pub fn greetings(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Primary => &[
            "Hello! I can help with crypto prices, news and general questions about digital assets.",
            "Hi there. Ask me about a coin's price, the latest news, or how something in crypto works.",
            "Welcome! What would you like to know about the crypto markets today?",
        ],
        Mode::Stylized => &[
            "gm anon! Ready to talk bags, charts and moon missions?",
            "Wagmi fren! What are we aping into today?",
            "Yo ser, welcome to the trenches. Ask me anything crypto.",
        ],
    }
}

pub fn farewells(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Primary => &[
            "Goodbye! Stay informed and invest responsibly.",
            "Take care. Come back any time you have crypto questions.",
        ],
        Mode::Stylized => &[
            "gn anon, may your bags be heavy and your stops be wide.",
            "Later fren. Touch grass, then come back for the next pump.",
        ],
    }
}

pub fn crypto_fallbacks(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Primary => &[
            "I don't have a specific answer for that crypto question yet. Try asking about a coin's price, recent news, or a core concept like wallets or staking.",
            "That's a good crypto question, but it's outside what I've been trained on. You could ask about bitcoin, ethereum, DeFi or market sentiment.",
        ],
        Mode::Stylized => &[
            "Ser, that one's too galaxy-brained even for me. Ask me about prices, news or what's pumping.",
            "No alpha on that yet, anon. Hit me with a coin name or ask what the market's feeling.",
        ],
    }
}

pub fn generic_fallbacks(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Primary => &[
            "I focus on cryptocurrency topics. Could you rephrase your question around crypto prices, news or concepts?",
            "I'm not sure how to help with that. I can answer questions about cryptocurrencies, markets and blockchain technology.",
        ],
        Mode::Stylized => &[
            "Fren, I only speak fluent crypto. Ask me about coins, charts or the next narrative.",
            "That's not on-chain, anon. Bring me something about tokens or the market.",
        ],
    }
}

pub fn apology(mode: Mode) -> &'static str {
    match mode {
        Mode::Primary => {
            "Sorry, something went wrong while answering that. Please try again in a moment."
        }
        Mode::Stylized => {
            "Oof, I just got rugged by my own circuits. Try that again in a sec, anon."
        }
    }
}

pub fn switch_confirmation(mode: Mode, already_active: bool) -> String {
    let line = match (mode, already_active) {
        (Mode::Primary, false) => {
            "Switched to primary mode. I'll keep my answers clear and informational."
        }
        (Mode::Primary, true) => "I'm already in primary mode.",
        (Mode::Stylized, false) => {
            "Switched to stylized mode. Degen Coinpal reporting for duty, anon! LFG!"
        }
        (Mode::Stylized, true) => "Already in stylized mode, ser. Degen Coinpal never left.",
    };
    line.to_string()
}

const STYLIZED_OPENERS: [&str; 3] = [
    "Alright anon, here's the alpha:",
    "Ser, check this:",
    "Fresh from the charts:",
];
const STYLIZED_CLOSERS: [&str; 3] = ["NFA, DYOR.", "Stay based.", "WAGMI."];

/// Wrap an externally sourced reply in the persona's voice. Primary replies
/// pass through unchanged.
pub fn decorate(mode: Mode, text: &str) -> String {
    match mode {
        Mode::Primary => text.to_string(),
        Mode::Stylized => {
            let pick = text.len();
            format!(
                "{} {} {}",
                STYLIZED_OPENERS[pick % STYLIZED_OPENERS.len()],
                text,
                STYLIZED_CLOSERS[pick % STYLIZED_CLOSERS.len()]
            )
        }
    }
}

/// Keyword-category test used to pick fallback lines and the generic crypto
/// intent.
pub fn is_crypto_related(message: &str) -> bool {
    let lower = message.to_lowercase();
    let crypto_keywords = [
        "crypto", "bitcoin", "btc", "ethereum", "eth", "coin", "token", "blockchain",
        "wallet", "defi", "nft", "staking", "mining", "altcoin", "stablecoin",
        "exchange", "solana", "web3", "ledger", "satoshi", "hodl", "halving",
        "market", "trading", "bull", "bear",
    ];

    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|word| {
            crypto_keywords
                .iter()
                .any(|kw| word == *kw || (kw.len() > 3 && word.starts_with(kw)))
        })
}

// ============ Personality State ============

/// Active persona plus one independent retrieval engine per persona.
/// The active mode is a single atomic so foreground and training callers
/// read it without locking; each engine guards its own cache.
pub struct PersonalityState {
    active: AtomicU8,
    primary: Arc<RetrievalEngine>,
    stylized: Arc<RetrievalEngine>,
}

impl PersonalityState {
    pub fn new(
        primary_corpus: Vec<CorpusEntry>,
        stylized_corpus: Vec<CorpusEntry>,
        config: &RetrievalConfig,
    ) -> Self {
        // Offset the stylized seed so the two personas don't mirror each other's picks.
        let stylized_config = RetrievalConfig {
            seed: config.seed.map(|s| s.wrapping_add(1)),
            ..config.clone()
        };
        Self {
            active: AtomicU8::new(Mode::Primary.to_u8()),
            primary: Arc::new(RetrievalEngine::new(Mode::Primary, primary_corpus, config)),
            stylized: Arc::new(RetrievalEngine::new(
                Mode::Stylized,
                stylized_corpus,
                &stylized_config,
            )),
        }
    }

    pub fn active(&self) -> Mode {
        Mode::from_u8(self.active.load(Ordering::Acquire))
    }

    /// Switch persona. Returns the previous mode.
    pub fn switch(&self, mode: Mode) -> Mode {
        let previous = Mode::from_u8(self.active.swap(mode.to_u8(), Ordering::AcqRel));
        if previous != mode {
            logging::log_conversation(
                None,
                &format!(
                    "Persona switched: {} -> {}",
                    previous.as_str(),
                    mode.as_str()
                ),
            );
        }
        previous
    }

    pub fn engine(&self, mode: Mode) -> &Arc<RetrievalEngine> {
        match mode {
            Mode::Primary => &self.primary,
            Mode::Stylized => &self.stylized,
        }
    }

    pub fn stats(&self) -> PersonaStats {
        PersonaStats {
            active_mode: self.active(),
            primary: self.primary.stats(),
            stylized: self.stylized.stats(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaStats {
    pub active_mode: Mode,
    pub primary: RetrievalStats,
    pub stylized: RetrievalStats,
}
