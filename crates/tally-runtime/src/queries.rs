//! Read-only queries. These may run while a submission is being processed;
//! a rank computed mid-update can be off by one.

use serde::{Deserialize, Serialize};
use tally_expr::ValidationError;
use tally_schemas::{ChannelId, MemberId};

use crate::{GameRuntime, RuntimeError};

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberStats {
    pub member_id: MemberId,
    pub score: i64,
    pub rank: u64,
    pub correct_count: u64,
    pub wrong_count: u64,
    pub highest_valid_streak: u64,
    /// Percentage with two decimals; `None` before the first attempt.
    pub accuracy_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub channel_id: ChannelId,
    pub current_count: u64,
    pub high_score: u64,
    pub last_member_id: Option<MemberId>,
    pub penalized_member_id: Option<MemberId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub member_id: MemberId,
    pub score: i64,
}

/// Calculator result. Has no effect on the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalcResult {
    Value { value: i64 },
    NotANumber,
    Syntax { detail: String },
    DivisionByZero,
    OutOfRange,
}

pub fn calc(text: &str) -> CalcResult {
    match tally_expr::validate(text) {
        Ok(value) => CalcResult::Value { value },
        Err(ValidationError::NotANumberExpression) => CalcResult::NotANumber,
        Err(e @ ValidationError::Syntax { .. }) => CalcResult::Syntax {
            detail: e.to_string(),
        },
        Err(ValidationError::DivisionByZero) => CalcResult::DivisionByZero,
        Err(ValidationError::OutOfRange) => CalcResult::OutOfRange,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl GameRuntime {
    pub async fn member_stats(
        &self,
        member_id: MemberId,
    ) -> Result<Option<MemberStats>, RuntimeError> {
        let store = &self.core().store;
        let Some(record) = store.get(member_id).await? else {
            return Ok(None);
        };
        let rank = store.rank_of(member_id).await?.unwrap_or(0);
        Ok(Some(MemberStats {
            member_id,
            score: record.score,
            rank,
            correct_count: record.correct_count,
            wrong_count: record.wrong_count,
            highest_valid_streak: record.highest_valid_streak,
            accuracy_percent: record.accuracy_percent().map(round2),
        }))
    }

    pub async fn server_stats(&self) -> ServerStats {
        let s = self.sequence().await;
        ServerStats {
            channel_id: s.channel_id,
            current_count: s.current_count,
            high_score: s.high_score,
            last_member_id: s.current_member_id,
            penalized_member_id: s.penalized_member_id,
        }
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RuntimeError> {
        let rows = self.core().store.top_n(limit).await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (member_id, score))| LeaderboardEntry {
                position: i + 1,
                member_id,
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_reports_each_kind() {
        assert_eq!(calc("6*7"), CalcResult::Value { value: 42 });
        assert_eq!(calc("hello"), CalcResult::NotANumber);
        assert_eq!(calc("1/0"), CalcResult::DivisionByZero);
        assert!(matches!(calc("(1"), CalcResult::Syntax { .. }));
        assert_eq!(calc("10**30"), CalcResult::OutOfRange);
    }

    #[test]
    fn accuracy_rounds_to_two_decimals() {
        assert_eq!(round2(99.33774834437087), 99.34);
    }
}
