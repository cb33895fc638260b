//! Curated prompt/response corpora, one per persona.

use crate::error::{AssistantError, Result};
use crate::logging;
use crate::persona::Mode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(alias = "user")]
    pub prompt: String,
    #[serde(alias = "bot")]
    pub response: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl CorpusEntry {
    pub fn new(prompt: &str, response: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            response: response.to_string(),
            tags: BTreeSet::new(),
        }
    }

    fn is_blank(&self) -> bool {
        self.prompt.trim().is_empty() || self.response.trim().is_empty()
    }
}

/// Parse a JSON array of `{prompt|user, response|bot, tags?}` records,
/// skipping blank entries.
pub fn parse_corpus(raw: &str, source: &str) -> Result<Vec<CorpusEntry>> {
    let entries: Vec<CorpusEntry> = serde_json::from_str(raw)
        .map_err(|e| AssistantError::Corpus(format!("{}: {}", source, e)))?;
    let total = entries.len();
    let kept: Vec<CorpusEntry> = entries.into_iter().filter(|e| !e.is_blank()).collect();
    if kept.len() < total {
        logging::log_error(
            None,
            &format!(
                "Skipped {} blank corpus entries in {}",
                total - kept.len(),
                source
            ),
        );
    }
    Ok(kept)
}

pub fn load_corpus(path: &Path) -> Result<Vec<CorpusEntry>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AssistantError::Corpus(format!("{}: {}", path.display(), e)))?;
    parse_corpus(&raw, &path.display().to_string())
}

/// Load the persona corpus from `path`, degrading to the built-in set when the
/// file is absent, unreadable or empty.
pub fn load_or_builtin(mode: Mode, path: Option<&Path>) -> Vec<CorpusEntry> {
    if let Some(path) = path {
        match load_corpus(path) {
            Ok(entries) if !entries.is_empty() => {
                logging::log_conversation(
                    None,
                    &format!(
                        "Loaded {} {} corpus entries from {}",
                        entries.len(),
                        mode.as_str(),
                        path.display()
                    ),
                );
                return entries;
            }
            Ok(_) => logging::log_error(
                None,
                &format!(
                    "{} corpus at {} is empty, using built-in set",
                    mode.as_str(),
                    path.display()
                ),
            ),
            Err(e) => logging::log_error(
                None,
                &format!(
                    "{} corpus unavailable ({}), using built-in set",
                    mode.as_str(),
                    e
                ),
            ),
        }
    }
    builtin(mode)
}

fn entries(pairs: &[(&str, &str, &[&str])]) -> Vec<CorpusEntry> {
    pairs
        .iter()
        .map(|(prompt, response, tags)| CorpusEntry {
            prompt: prompt.to_string(),
            response: response.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}

pub fn builtin(mode: Mode) -> Vec<CorpusEntry> {
    match mode {
        Mode::Primary => entries(PRIMARY_BUILTIN),
        Mode::Stylized => entries(STYLIZED_BUILTIN),
    }
}

#[rustfmt::skip]
const PRIMARY_BUILTIN: &[(&str, &str, &[&str])] = &[
    ("What is bitcoin?",
     "Bitcoin is a decentralized digital currency secured by proof-of-work mining. Its supply is capped at 21 million coins.",
     &["bitcoin", "basics"]),
    ("How does bitcoin mining work?",
     "Miners compete to find a hash below the network target. The winner appends the next block and earns the block subsidy plus fees.",
     &["bitcoin", "mining"]),
    ("What is the bitcoin halving?",
     "Roughly every four years the block subsidy paid to miners is cut in half, slowing the issuance of new bitcoin.",
     &["bitcoin", "supply"]),
    ("What is ethereum?",
     "Ethereum is a programmable blockchain. Smart contracts run on it and pay fees in ether.",
     &["ethereum", "basics"]),
    ("How does ethereum staking work?",
     "Validators lock 32 ether to propose and attest to blocks. They earn rewards for honest work and are slashed for misbehaviour.",
     &["ethereum", "staking"]),
    ("What is a crypto wallet?",
     "A wallet stores the private keys that control your coins. Hot wallets stay online for convenience, cold wallets stay offline for safety.",
     &["wallets", "security"]),
    ("How do I keep my private keys safe?",
     "Write your seed phrase down offline, never share it, and consider a hardware wallet for larger balances.",
     &["wallets", "security"]),
    ("What is decentralized finance?",
     "Decentralized finance covers lending, trading and yield products built from smart contracts instead of banks.",
     &["defi"]),
    ("What is a stablecoin?",
     "A stablecoin is a token designed to track a reference asset, usually the US dollar, through reserves or algorithmic mechanisms.",
     &["stablecoins"]),
    ("What are NFT tokens?",
     "Non-fungible tokens are unique on-chain records, often used to prove ownership of digital art, collectibles or in-game items.",
     &["nft"]),
    ("What is solana?",
     "Solana is a high-throughput blockchain that favours fast, cheap transactions using proof-of-history alongside proof-of-stake.",
     &["solana", "basics"]),
    ("What is market capitalization?",
     "Market capitalization is the circulating supply multiplied by the current price. It is a rough gauge of an asset's size.",
     &["markets"]),
    ("What does a bear market mean?",
     "A bear market is a prolonged decline, commonly 20% or more from recent highs, with pessimistic sentiment.",
     &["markets", "sentiment"]),
    ("What does a bull market mean?",
     "A bull market is a sustained rise in prices with optimistic sentiment and growing participation.",
     &["markets", "sentiment"]),
    ("Should I invest in crypto?",
     "Only you can decide that. Crypto is volatile, so never invest more than you can afford to lose and do your own research.",
     &["investing", "risk"]),
    ("What is a blockchain?",
     "A blockchain is an append-only ledger replicated across many computers, where each block commits to the one before it.",
     &["basics"]),
    ("What are gas fees?",
     "Gas fees pay validators for the computation and storage a transaction uses. They rise when the network is congested.",
     &["ethereum", "fees"]),
    ("What is dollar cost averaging?",
     "Dollar cost averaging means buying a fixed amount on a regular schedule, which smooths out the impact of volatility.",
     &["investing"]),
];

#[rustfmt::skip]
const STYLIZED_BUILTIN: &[(&str, &str, &[&str])] = &[
    ("What is bitcoin?",
     "Ser, bitcoin is the OG. Digital gold, 21 million hard cap, secured by miners burning hashes around the clock. Number go up technology.",
     &["bitcoin", "basics"]),
    ("How does bitcoin mining work?",
     "Miners are out here grinding hashes like it's a slot machine. Hit the target, mint the block, stack the rewards. Pure degen energy with electricity bills.",
     &["bitcoin", "mining"]),
    ("What is the bitcoin halving?",
     "Halving szn! Every four years the miner rewards get chopped in half. Supply shock incoming, anon. Historically the vibes get spicy after.",
     &["bitcoin", "supply"]),
    ("What is ethereum?",
     "Ethereum is the world computer, fren. Smart contracts, DeFi, NFTs, the whole circus runs on it. Gas fees not included.",
     &["ethereum", "basics"]),
    ("How does ethereum staking work?",
     "Lock up 32 ether, become a validator, earn that sweet yield. Misbehave and you get slashed. No rugs, just protocol.",
     &["ethereum", "staking"]),
    ("What is a crypto wallet?",
     "Your wallet is your vault, anon. Not your keys, not your coins. Cold storage for the bags, hot wallet for the degen plays.",
     &["wallets", "security"]),
    ("How do I keep my private keys safe?",
     "Seed phrase on paper, paper in a safe, safe in a bunker. Never type it into a random site. Phishers are hunting, stay paranoid.",
     &["wallets", "security"]),
    ("What is decentralized finance?",
     "DeFi is the casino without the bouncer. Lend, borrow, farm yields, all smart contracts, no bankers. Audits matter, ser.",
     &["defi"]),
    ("What is a stablecoin?",
     "Stablecoins are the chill zone. Pegged to the dollar so you can park gains between pumps. Check the reserves though, depegs hurt.",
     &["stablecoins"]),
    ("What are NFT tokens?",
     "JPEGs on the blockchain, fren. Some are art, some are memberships, some are pure hopium. Right-click save at your own risk.",
     &["nft"]),
    ("What is solana?",
     "Solana goes brrr. Fast blocks, tiny fees, memecoins launching every five minutes. Buckle up.",
     &["solana", "basics"]),
    ("What is market capitalization?",
     "Market cap is price times supply. Low cap gems, high cap blue chips. Don't get fooled by a cheap price per coin, anon.",
     &["markets"]),
    ("What does a bear market mean?",
     "Bear market is crypto winter, ser. Prices bleeding, timelines crying. Builders build, tourists leave. Zoom out.",
     &["markets", "sentiment"]),
    ("What does a bull market mean?",
     "Bull market means green candles everywhere and everyone's a genius. Take some profits, nobody ever went broke doing that.",
     &["markets", "sentiment"]),
    ("Should I invest in crypto?",
     "Not financial advice, anon. Only aping what you can lose, DYOR, and never trade with rent money. Diamond hands need a plan.",
     &["investing", "risk"]),
    ("What is a blockchain?",
     "A blockchain is a giant shared spreadsheet nobody can secretly edit. Blocks chained together, trust the math.",
     &["basics"]),
    ("What are gas fees?",
     "Gas is the toll for using the chain. Network busy, fees moon. Time your transactions or pay the premium.",
     &["ethereum", "fees"]),
    ("What is dollar cost averaging?",
     "DCA is the boring chad strategy. Buy a little every week, ignore the noise, let time do the heavy lifting.",
     &["investing"]),
];
