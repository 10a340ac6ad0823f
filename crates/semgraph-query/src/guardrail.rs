//! Refactor risk scoring
//!
//! A fixed function over graph-derived counts:
//!
//! ```text
//! base  = direct + 0.5 * indirect + 2.0 * law
//! score = base * multiplier(culture) * (0.75 if auditors > 0 else 1.0)
//! ```
//!
//! The level comes from [`CAUTION_THRESHOLD`] and [`BLOCK_THRESHOLD`], then the
//! overrides in [`assess`] are applied in order.

use semgraph_core::Culture;
use semgraph_core::culture::multiplier;
use serde::Serialize;

pub const DIRECT_WEIGHT: f64 = 1.0;
pub const INDIRECT_WEIGHT: f64 = 0.5;
pub const LAW_WEIGHT: f64 = 2.0;
/// Applied when tests reach the symbol.
pub const AUDITOR_DISCOUNT: f64 = 0.75;

/// Scores below this proceed.
pub const CAUTION_THRESHOLD: f64 = 8.0;
/// Scores at or above this block.
pub const BLOCK_THRESHOLD: f64 = 30.0;
/// Law symbols with at least this many direct callers are hard-blocked.
pub const LAW_HARD_BLOCK_CALLERS: usize = 100;

/// Depth of the impact set the guardrail looks at.
pub const GUARDRAIL_IMPACT_DEPTH: u32 = 2;

pub const DO: &[&str] = &[
    "Use impact_radius before editing connected symbols.",
    "Prefer additive changes over signature breaks.",
    "Run focused tests on touched reducers/views.",
];

pub const DONT: &[&str] = &[
    "Do not change signatures when hard_block is true.",
    "Do not ignore ambiguous-call warnings.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Proceed,
    Caution,
    Block,
}

/// Counts the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskInputs {
    pub direct: usize,
    pub indirect: usize,
    /// Law-tagged symbols in the impact set.
    pub law: usize,
    /// Auditor-tagged symbols in the impact set.
    pub auditors: usize,
    /// Ambiguous edges into or out of the symbol.
    pub ambiguous: usize,
    pub culture: Culture,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub level: Level,
    pub score: f64,
    pub hard_block: bool,
    pub reasons: Vec<String>,
}

pub fn score(inputs: &RiskInputs) -> f64 {
    let base = inputs.direct as f64 * DIRECT_WEIGHT
        + inputs.indirect as f64 * INDIRECT_WEIGHT
        + inputs.law as f64 * LAW_WEIGHT;
    let discount = if inputs.auditors > 0 { AUDITOR_DISCOUNT } else { 1.0 };
    base * multiplier(inputs.culture) * discount
}

fn level_for(score: f64) -> Level {
    if score < CAUTION_THRESHOLD {
        Level::Proceed
    } else if score < BLOCK_THRESHOLD {
        Level::Caution
    } else {
        Level::Block
    }
}

pub fn assess(inputs: &RiskInputs) -> Assessment {
    let score = score(inputs);
    let mut level = level_for(score);
    let mut hard_block = false;
    let mut reasons = vec![format!(
        "risk score {:.2} from {} direct and {} indirect callers ({} culture)",
        score,
        inputs.direct,
        inputs.indirect,
        inputs.culture.as_str()
    )];

    if inputs.law > 0 {
        reasons.push(format!("{} Law-tagged symbols in the impact set", inputs.law));
    }
    if inputs.auditors > 0 {
        reasons.push(format!("reached by {} Auditor-tagged symbols", inputs.auditors));
    }

    if inputs.culture == Culture::Law && inputs.direct >= LAW_HARD_BLOCK_CALLERS {
        level = Level::Block;
        hard_block = true;
        reasons.push(format!(
            "Law symbol with {} direct callers: hard block on signature changes",
            inputs.direct
        ));
    }
    if inputs.ambiguous > 0 && level < Level::Caution {
        level = Level::Caution;
        reasons.push(format!(
            "{} ambiguous call edges: the caller set may be incomplete",
            inputs.ambiguous
        ));
    }
    if inputs.culture == Culture::Auditor && level > Level::Caution {
        level = Level::Caution;
        reasons.push("Auditor symbol: guidance is advisory".to_string());
    }

    Assessment { level, score, hard_block, reasons }
}
