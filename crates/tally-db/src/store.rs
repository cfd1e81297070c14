use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tally_ledger::{GameStore, MemberLedger, StoreError};
use tally_schemas::{ChannelId, LedgerMutation, MemberId, MemberRecord, SequenceState};

const MEMBER_COLUMNS: &str =
    "member_id, score, correct_count, wrong_count, highest_valid_streak";

type MemberRow = (i64, i64, i64, i64, i64);

type SequenceRow = (i64, i64, Option<i64>, i64, bool, Option<i64>, i32);

/// [`GameStore`] over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn conn(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, StoreError> {
        self.pool.acquire().await.map_err(db_err("acquire connection"))
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn db_err(what: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            // check_violation: the row would break a model invariant
            if db.code().as_deref() == Some("23514") {
                return StoreError::Corrupt(format!("{what}: {db}"));
            }
        }
        StoreError::Unavailable(format!("{what}: {e}"))
    }
}

fn to_db(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Corrupt(format!("value {id} exceeds bigint")))
}

fn from_db(column: &'static str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Corrupt(format!("{column} is negative: {v}")))
}

fn member_from_row(row: MemberRow) -> Result<MemberRecord, StoreError> {
    let (member_id, score, correct, wrong, streak) = row;
    Ok(MemberRecord {
        member_id: MemberId(from_db("member_id", member_id)?),
        score,
        correct_count: from_db("correct_count", correct)?,
        wrong_count: from_db("wrong_count", wrong)?,
        highest_valid_streak: from_db("highest_valid_streak", streak)?,
    })
}

fn sequence_from_row(row: SequenceRow) -> Result<SequenceState, StoreError> {
    let (channel, count, member, high, shown, penalized, progress) = row;
    Ok(SequenceState {
        channel_id: ChannelId(from_db("channel_id", channel)?),
        current_count: from_db("current_count", count)?,
        current_member_id: member.map(|m| from_db("current_member_id", m).map(MemberId)).transpose()?,
        high_score: from_db("high_score", high)?,
        high_score_emoji_shown: shown,
        penalized_member_id: penalized
            .map(|m| from_db("penalized_member_id", m).map(MemberId))
            .transpose()?,
        penalty_redemption_progress: u32::try_from(progress).map_err(|_| {
            StoreError::Corrupt(format!("penalty_redemption_progress is negative: {progress}"))
        })?,
    })
}

// ---------------------------------------------------------------------------
// Statements shared by pooled and transactional paths
// ---------------------------------------------------------------------------

async fn apply_mutation(
    conn: &mut PgConnection,
    mutation: &LedgerMutation,
) -> Result<MemberRecord, StoreError> {
    let member_id = mutation.member_id();
    let row: Option<MemberRow> = match mutation {
        LedgerMutation::Correct {
            new_highest_valid_streak,
            ..
        } => {
            let streak = new_highest_valid_streak.map(to_db).transpose()?;
            sqlx::query_as(&format!(
                r#"
                update members
                set score = score + 1,
                    correct_count = correct_count + 1,
                    highest_valid_streak = greatest(highest_valid_streak, coalesce($2, 0))
                where member_id = $1
                returning {MEMBER_COLUMNS}
                "#
            ))
            .bind(to_db(member_id.0)?)
            .bind(streak)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err("apply_correct failed"))?
        }
        LedgerMutation::Wrong { .. } => sqlx::query_as(&format!(
            r#"
            update members
            set score = score - 1,
                wrong_count = wrong_count + 1
            where member_id = $1
            returning {MEMBER_COLUMNS}
            "#
        ))
        .bind(to_db(member_id.0)?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("apply_wrong failed"))?,
    };

    match row {
        Some(row) => member_from_row(row),
        None => Err(StoreError::UnknownMember(member_id)),
    }
}

async fn upsert_sequence(conn: &mut PgConnection, s: &SequenceState) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        insert into sequence_state (
          channel_id, current_count, current_member_id, high_score,
          high_score_emoji_shown, penalized_member_id, penalty_redemption_progress,
          updated_at_utc
        ) values ($1, $2, $3, $4, $5, $6, $7, now())
        on conflict (channel_id) do update
        set current_count = excluded.current_count,
            current_member_id = excluded.current_member_id,
            high_score = excluded.high_score,
            high_score_emoji_shown = excluded.high_score_emoji_shown,
            penalized_member_id = excluded.penalized_member_id,
            penalty_redemption_progress = excluded.penalty_redemption_progress,
            updated_at_utc = now()
        "#,
    )
    .bind(to_db(s.channel_id.0)?)
    .bind(to_db(s.current_count)?)
    .bind(s.current_member_id.map(|m| to_db(m.0)).transpose()?)
    .bind(to_db(s.high_score)?)
    .bind(s.high_score_emoji_shown)
    .bind(s.penalized_member_id.map(|m| to_db(m.0)).transpose()?)
    .bind(i32::try_from(s.penalty_redemption_progress).map_err(|_| {
        StoreError::Corrupt("penalty_redemption_progress exceeds integer".to_string())
    })?)
    .execute(&mut *conn)
    .await
    .map_err(db_err("save_sequence failed"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl MemberLedger for PgStore {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberRecord>, StoreError> {
        let row: Option<MemberRow> =
            sqlx::query_as(&format!("select {MEMBER_COLUMNS} from members where member_id = $1"))
                .bind(to_db(member_id.0)?)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err("get member failed"))?;
        row.map(member_from_row).transpose()
    }

    async fn get_many(
        &self,
        member_ids: &BTreeSet<MemberId>,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        let ids = member_ids
            .iter()
            .map(|m| to_db(m.0))
            .collect::<Result<Vec<i64>, _>>()?;
        let rows: Vec<MemberRow> = sqlx::query_as(&format!(
            "select {MEMBER_COLUMNS} from members where member_id = any($1) order by member_id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("get_many failed"))?;
        rows.into_iter().map(member_from_row).collect()
    }

    async fn upsert_new(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        let id = to_db(member_id.0)?;
        // The no-op update makes `returning` yield the existing row on conflict.
        let row: MemberRow = sqlx::query_as(&format!(
            r#"
            insert into members (member_id) values ($1)
            on conflict (member_id) do update set member_id = excluded.member_id
            returning {MEMBER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("upsert_new failed"))?;
        member_from_row(row)
    }

    async fn apply_correct(
        &self,
        member_id: MemberId,
        new_highest_valid_streak: Option<u64>,
    ) -> Result<MemberRecord, StoreError> {
        let mut conn = self.conn().await?;
        apply_mutation(
            &mut conn,
            &LedgerMutation::Correct {
                member_id,
                new_highest_valid_streak,
            },
        )
        .await
    }

    async fn apply_wrong(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        let mut conn = self.conn().await?;
        apply_mutation(&mut conn, &LedgerMutation::Wrong { member_id }).await
    }

    async fn rank_of(&self, member_id: MemberId) -> Result<Option<u64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            select (select count(*) from members o where o.score >= m.score)::bigint
            from members m
            where m.member_id = $1
            "#,
        )
        .bind(to_db(member_id.0)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("rank_of failed"))?;
        row.map(|(rank,)| from_db("rank", rank)).transpose()
    }

    async fn top_n(&self, n: usize) -> Result<Vec<(MemberId, i64)>, StoreError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            select member_id, score
            from members
            order by score desc, first_seen_seq asc
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("top_n failed"))?;
        rows.into_iter()
            .map(|(id, score)| Ok((MemberId(from_db("member_id", id)?), score)))
            .collect()
    }

    async fn prune(&self, active: &BTreeSet<MemberId>) -> Result<u64, StoreError> {
        let ids = active
            .iter()
            .map(|m| to_db(m.0))
            .collect::<Result<Vec<i64>, _>>()?;
        let res = sqlx::query("delete from members where not (member_id = any($1))")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(db_err("prune failed"))?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn load_sequence(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<SequenceState>, StoreError> {
        let row: Option<SequenceRow> = sqlx::query_as(
            r#"
            select channel_id, current_count, current_member_id, high_score,
                   high_score_emoji_shown, penalized_member_id, penalty_redemption_progress
            from sequence_state
            where channel_id = $1
            "#,
        )
        .bind(to_db(channel_id.0)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("load_sequence failed"))?;
        row.map(sequence_from_row).transpose()
    }

    async fn save_sequence(&self, state: &SequenceState) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        upsert_sequence(&mut conn, state).await
    }

    async fn commit_move(
        &self,
        state: &SequenceState,
        mutation: &LedgerMutation,
    ) -> Result<MemberRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("begin transaction"))?;

        // Dropping `tx` on an early return rolls back.
        let record = apply_mutation(&mut tx, mutation).await?;
        upsert_sequence(&mut tx, state).await?;

        tx.commit().await.map_err(db_err("commit_move commit"))?;
        tracing::debug!(
            member_id = %record.member_id,
            count = state.current_count,
            "move committed"
        );
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("select 1")
            .execute(&self.pool)
            .await
            .map_err(db_err("ping failed"))?;
        Ok(())
    }
}
