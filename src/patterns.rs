//! Pattern override layer: ordered rules that short-circuit retrieval for
//! fixed intents. The first matching rule wins.

use crate::normalizer;
use crate::persona::{self, Mode};
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchTarget {
    To(Mode),
    Toggle,
}

impl SwitchTarget {
    pub fn resolve(&self, current: Mode) -> Mode {
        match self {
            SwitchTarget::To(mode) => *mode,
            SwitchTarget::Toggle => current.other(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideMatch {
    Switch(SwitchTarget),
    Greeting(String),
    Farewell(String),
    PriceRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    SwitchStylized,
    SwitchPrimary,
    SwitchToggle,
    Greeting,
    Farewell,
    PriceRequest,
}

struct Rule {
    kind: RuleKind,
    pattern: Regex,
}

fn rule(kind: RuleKind, pattern: &str) -> Rule {
    Rule {
        kind,
        pattern: Regex::new(pattern).expect("override pattern must compile"),
    }
}

// Switch commands are whole-input commands: an optional lead-in, the verb
// phrase, the target and a mode noun, then an optional "please".
const LEAD_IN: &str = r"^(?:(?:hey|ok|okay|please|coinpal)[\s,]+)*";
const SWITCH_VERB: &str = r"(?:(?:switch|change|go|turn|set|get)(?:\s+(?:back|over|yourself))?\s+(?:to|into|on)|enable|activate|use)\s+(?:the\s+)?";
const MODE_NOUN: &str = r"\s+(?:mode|persona|personality|voice)";
const TRAILER: &str = r"(?:[\s,]+please)?[\s!.?]*$";

/// `targets` need a verb and a mode noun; `bare` may also stand alone.
fn switch_rule(kind: RuleKind, targets: &str, bare: &str) -> Rule {
    let pattern = format!(
        "{LEAD_IN}{SWITCH_VERB}(?:{targets}){MODE_NOUN}{TRAILER}|^(?:{bare})(?:{MODE_NOUN})?(?:\\s+on)?{TRAILER}"
    );
    rule(kind, &pattern)
}

// Words the price rule captures that are never tickers.
const NON_ASSET_WORDS: &[&str] = &[
    "it", "this", "that", "these", "those", "them", "one", "coin", "coins", "crypto", "token",
    "tokens", "everything", "stuff",
];

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        switch_rule(
            RuleKind::SwitchStylized,
            "stylized|stylised|degen|fun",
            "stylized|stylised|degen",
        ),
        switch_rule(
            RuleKind::SwitchPrimary,
            "primary|normal|neutral|standard|serious",
            "primary|normal",
        ),
        rule(
            RuleKind::SwitchToggle,
            &format!(
                r"{LEAD_IN}(?:(?:switch|change|toggle|swap)\s+(?:the\s+)?(?:modes?|personas?|personality|personalities)|(?:switch\s+to\s+|use\s+)?(?:the\s+)?other\s+(?:mode|persona)){TRAILER}"
            ),
        ),
        rule(
            RuleKind::Greeting,
            r"^(hi|hello|hey|hiya|yo|gm|howdy|greetings|sup|good (morning|afternoon|evening))([\s,]+(there|coinpal|fren|anon|ser|everyone))?[\s!.?]*$",
        ),
        rule(
            RuleKind::Farewell,
            r"^(bye|goodbye|bye bye|see you|see ya|cya|later|gn|good night|goodnight|farewell)([\s,]+(later|soon|tomorrow|coinpal|fren|anon))?[\s!.?]*$",
        ),
        rule(
            RuleKind::PriceRequest,
            r"^(?:what(?:'s| is)\s+)?(?:the\s+)?price\s+(?:of\s+)?([a-z]+)\s*\??$|^([a-z]+)\s+price\s*\??$",
        ),
    ]
});

pub struct PatternOverrides;

impl PatternOverrides {
    /// Evaluate every rule top to bottom against the raw input.
    pub fn match_input(text: &str, mode: Mode) -> Option<OverrideMatch> {
        let lowered = normalizer::lowercase_for_patterns(text);
        RULES
            .iter()
            .find_map(|rule| Self::apply(rule, &lowered, mode))
    }

    pub fn switch_command(text: &str) -> Option<SwitchTarget> {
        match Self::match_input(text, Mode::Primary)? {
            OverrideMatch::Switch(target) => Some(target),
            _ => None,
        }
    }

    pub fn price_request(text: &str) -> Option<String> {
        match Self::match_input(text, Mode::Primary)? {
            OverrideMatch::PriceRequest(asset) => Some(asset),
            _ => None,
        }
    }

    fn apply(rule: &Rule, lowered: &str, mode: Mode) -> Option<OverrideMatch> {
        let captures = rule.pattern.captures(lowered)?;
        let matched = match rule.kind {
            RuleKind::SwitchStylized => OverrideMatch::Switch(SwitchTarget::To(Mode::Stylized)),
            RuleKind::SwitchPrimary => OverrideMatch::Switch(SwitchTarget::To(Mode::Primary)),
            RuleKind::SwitchToggle => OverrideMatch::Switch(SwitchTarget::Toggle),
            RuleKind::Greeting => OverrideMatch::Greeting(pick(persona::greetings(mode))),
            RuleKind::Farewell => OverrideMatch::Farewell(pick(persona::farewells(mode))),
            RuleKind::PriceRequest => {
                let asset = captures.get(1).or_else(|| captures.get(2))?.as_str();
                if NON_ASSET_WORDS.contains(&asset) {
                    return None;
                }
                OverrideMatch::PriceRequest(asset.to_string())
            }
        };
        Some(matched)
    }
}

fn pick(lines: &[&str]) -> String {
    lines
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}
