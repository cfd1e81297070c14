//! Game queries against the durable store, plus the offline calculator.

use anyhow::{bail, Result};
use tally_db::PgStore;
use tally_ledger::{GameStore, MemberLedger};
use tally_runtime::CalcResult;
use tally_schemas::{ChannelId, MemberId};

use super::{connect, load_config};

pub fn calc(expr: &str) -> Result<()> {
    match tally_runtime::calc(expr) {
        CalcResult::Value { value } => println!("value={value}"),
        CalcResult::NotANumber => {
            bail!("EXPR_NOT_A_NUMBER: {expr:?} is not a counting expression")
        }
        CalcResult::Syntax { detail } => bail!("EXPR_INVALID: {detail}"),
        CalcResult::DivisionByZero => bail!("EXPR_INVALID: division by zero"),
        CalcResult::OutOfRange => bail!("EXPR_INVALID: value out of range"),
    }
    Ok(())
}

async fn open_store(config_paths: &[String]) -> Result<PgStore> {
    let cfg = load_config(config_paths)?;
    Ok(PgStore::new(connect(cfg.as_ref()).await?))
}

pub async fn stats(config_paths: &[String], member: u64) -> Result<()> {
    let store = open_store(config_paths).await?;
    let member_id = MemberId(member);
    let Some(record) = store.get(member_id).await? else {
        bail!("MEMBER_NOT_FOUND: member {member} has no record");
    };
    let rank = store.rank_of(member_id).await?.unwrap_or(0);

    println!("member_id={}", record.member_id);
    println!("score={}", record.score);
    println!("rank={rank}");
    println!("correct={}", record.correct_count);
    println!("wrong={}", record.wrong_count);
    println!("highest_valid_streak={}", record.highest_valid_streak);
    match record.accuracy_percent() {
        Some(pct) => println!("accuracy_percent={pct:.2}"),
        None => println!("accuracy_percent=n/a"),
    }
    Ok(())
}

pub async fn leaderboard(config_paths: &[String], limit: usize) -> Result<()> {
    let store = open_store(config_paths).await?;
    let rows = store.top_n(limit).await?;
    if rows.is_empty() {
        println!("leaderboard=empty");
    }
    for (i, (member_id, score)) in rows.into_iter().enumerate() {
        println!("position={} member_id={member_id} score={score}", i + 1);
    }
    Ok(())
}

pub async fn sequence(config_paths: &[String], channel: Option<u64>) -> Result<()> {
    let cfg = load_config(config_paths)?;
    let channel_id = match (channel, &cfg) {
        (Some(id), _) => ChannelId(id),
        (None, Some(cfg)) => ChannelId(cfg.game.channel_id),
        (None, None) => bail!("CONFIG_INVALID: pass --channel or --config"),
    };
    let store = PgStore::new(connect(cfg.as_ref()).await?);

    let Some(s) = store.load_sequence(channel_id).await? else {
        println!("channel_id={channel_id} sequence=none");
        return Ok(());
    };
    println!("channel_id={}", s.channel_id);
    println!("current_count={}", s.current_count);
    println!("high_score={}", s.high_score);
    println!("next_expected={}", s.next_expected());
    println!("current_member_id={}", opt(s.current_member_id));
    println!("penalized_member_id={}", opt(s.penalized_member_id));
    println!("penalty_redemption_progress={}", s.penalty_redemption_progress);
    Ok(())
}

fn opt(id: Option<MemberId>) -> String {
    id.map(|m| m.to_string()).unwrap_or_else(|| "none".to_string())
}
