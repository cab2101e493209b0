//! Consensus signal: combine one or many oracle votes into a single call.
//!
//! Each model votes bullish when its predicted next close is strictly above
//! the row's close. Majority wins; an exact split goes to the tie-breaker's
//! own vote. Models that fail are left out of the count for that day. If
//! every model fails the day is an abstention: no entry, and no model-exit.

use crate::domain::features::FeatureRow;
use crate::domain::oracle::{OracleSet, OracleVote};
use serde::Serialize;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Bullish,
    Bearish,
    /// No model answered.
    Abstain,
}

impl Decision {
    pub fn is_bullish(self) -> bool {
        self == Decision::Bullish
    }

    /// Only an explicit bearish call can trigger a model exit.
    pub fn is_bearish(self) -> bool {
        self == Decision::Bearish
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Bullish => "bullish",
            Decision::Bearish => "bearish",
            Decision::Abstain => "abstain",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub decision: Decision,
    pub votes: Vec<OracleVote>,
    pub bullish_votes: usize,
    pub votes_cast: usize,
    /// Set when an exact split was resolved by a single model's vote.
    pub tie_broken_by: Option<String>,
    /// Vote share of the winning side; 0 on abstention.
    pub confidence: f64,
}

pub fn decide(row: &FeatureRow, oracles: &OracleSet) -> Signal {
    let members = oracles.members();
    let mut votes = Vec::with_capacity(members.len());
    let mut ballots: Vec<(usize, bool)> = Vec::with_capacity(members.len());

    for (idx, member) in members.iter().enumerate() {
        match member.oracle.predict(row, row.date) {
            Ok(price) if price.is_finite() => {
                ballots.push((idx, price > row.close));
                votes.push(OracleVote {
                    model_id: member.id.clone(),
                    predicted_next_price: price,
                });
            }
            Ok(price) => {
                warn!(model = %member.id, date = %row.date, price, "oracle returned a non-finite prediction, excluded from vote");
            }
            Err(err) => {
                warn!(model = %member.id, date = %row.date, error = %err, "oracle failed, excluded from vote");
            }
        }
    }

    let votes_cast = ballots.len();
    let bullish_votes = ballots.iter().filter(|(_, bullish)| *bullish).count();

    if votes_cast == 0 {
        return Signal {
            decision: Decision::Abstain,
            votes,
            bullish_votes: 0,
            votes_cast: 0,
            tie_broken_by: None,
            confidence: 0.0,
        };
    }

    let (decision, tie_broken_by) = if bullish_votes * 2 > votes_cast {
        (Decision::Bullish, None)
    } else if bullish_votes * 2 < votes_cast {
        (Decision::Bearish, None)
    } else {
        // Tie-breaker's vote if it answered today, else the first model that did.
        let (idx, bullish) = ballots
            .iter()
            .copied()
            .find(|(idx, _)| *idx == oracles.tie_breaker_index())
            .unwrap_or(ballots[0]);
        let decision = if bullish {
            Decision::Bullish
        } else {
            Decision::Bearish
        };
        (decision, Some(members[idx].id.clone()))
    };

    let winning = match decision {
        Decision::Bullish => bullish_votes,
        _ => votes_cast - bullish_votes,
    };

    Signal {
        decision,
        votes,
        bullish_votes,
        votes_cast,
        tie_broken_by,
        confidence: winning as f64 / votes_cast as f64,
    }
}

/// Live entry point: today's decision and the vote share behind it.
pub fn decide_today(latest: &FeatureRow, oracles: &OracleSet) -> (Decision, f64) {
    let signal = decide(latest, oracles);
    (signal.decision, signal.confidence)
}
