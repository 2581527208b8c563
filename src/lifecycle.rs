//! Participant lifecycle tracking: active stakers, issuer registry, holder
//! counts and the daily issuance rollup.
//!
//! "Active" is never stored as a boolean. Every qualifying event re-reads the
//! account's debt eligibility and diffs it against the presence of the
//! existence record, so the global counter moves exactly once per actual
//! crossing and never flaps on repeated zero-eligibility events.

use crate::aggregate::{DAY_SECONDS, bucket_start};
use crate::chain::{Address, CollateralExclusion, EventContext, ProtocolReader, ReadError};
use crate::entity::{
    ActiveStaker, DailyActiveStakers, DailyIssuance, DebtSnapshot, FeesClaimedRecord, Holder,
    IssuanceRecord, Issuer, Metadata, RewardEscrowHolder, TotalActiveStakers,
};
use crate::error::EventError;
use crate::event::IssuanceEvent;
use crate::numeric::to_decimal_18;
use crate::store::Session;
use crate::version::{Variant, is_known_burn_call, is_known_issue_call};
use log::{debug, warn};
use rust_decimal::Decimal;

pub fn handle_issuance_event(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    event: &IssuanceEvent,
) -> Result<(), EventError> {
    match event {
        IssuanceEvent::Issued { value, source_unit } => {
            handle_issued_or_burned(session, reader, ctx, variant, *value, source_unit, false)
        }
        IssuanceEvent::Burned { value, source_unit } => {
            handle_issued_or_burned(session, reader, ctx, variant, *value, source_unit, true)
        }
        IssuanceEvent::FeesClaimed { account, value, rewards } => {
            handle_fees_claimed(session, reader, ctx, variant, account, *value, *rewards)
        }
        IssuanceEvent::Vested { account, value } => {
            handle_vested(session, reader, ctx, variant, account, *value)
        }
    }
}

fn handle_issued_or_burned(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    value: u128,
    source_unit: &str,
    burned: bool,
) -> Result<(), EventError> {
    // The position moved belongs to whoever sent the transaction, not to the
    // beneficiary named in the event payload.
    let account = &ctx.tx_from;

    // The same event signature was emitted by every historical calling
    // convention; anything outside the known selector tables is not ours.
    let recognized = match ctx.tx_selector {
        Some(sel) if burned => is_known_burn_call(sel),
        Some(sel) => is_known_issue_call(sel),
        None => false,
    };
    if !recognized {
        return Err(EventError::UnrecognizedShape(format!(
            "{} call selector {:?} in tx {}",
            if burned { "burn" } else { "issue" },
            ctx.tx_selector,
            ctx.tx_hash.to_hex(),
        )));
    }

    session.put(&IssuanceRecord {
        id: ctx.record_id(),
        account: *account,
        value: to_decimal_18(value),
        source_unit: source_unit.to_owned(),
        burned,
        timestamp: ctx.timestamp,
        block: ctx.position.block,
    })?;

    // The daily rollup needs reads that only exist under the latest variant,
    // and only the unit-of-account synth moves the system debt figure.
    if variant.has_extended_reads() && source_unit == "sUSD" {
        track_daily_issuance(session, reader, ctx, variant, to_decimal_18(value), burned)?;
    }

    if variant.tracks_staking() {
        track_active_stakers(session, reader, ctx, variant, account)?;
    }

    if !burned {
        track_issuer(session, account)?;
    }

    track_holder(session, reader, ctx, variant, account, !burned)?;
    track_debt_snapshot(session, reader, ctx, variant, account)?;
    Ok(())
}

/// Record the sender's debt position as of this event.
fn track_debt_snapshot(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    account: &Address,
) -> Result<(), EventError> {
    // Snapshot reads go against the transaction's target contract; a
    // contract-creation transaction has none.
    if ctx.tx_to.is_none() {
        debug!("skipping debt snapshot, no transaction target in {}", ctx.tx_hash.to_hex());
        return Ok(());
    }

    let mut snapshot =
        DebtSnapshot::new(ctx.record_id(), *account, ctx.timestamp, ctx.position.block);

    if variant.has_issuance_state() {
        let balance = reader
            .balance_of(account, &ctx.position)
            .map_err(|e| e.into_unresolvable("snapshot balance"))?;
        snapshot.balance = to_decimal_18(balance);
        let collateral = reader
            .collateral(account, &ctx.position)
            .map_err(|e| e.into_unresolvable("snapshot collateral"))?;
        snapshot.collateral = to_decimal_18(collateral);
        let debt = reader
            .debt_balance(account, variant.unit_key("sUSD"), &ctx.position)
            .map_err(|e| e.into_unresolvable("snapshot debt balance"))?;
        snapshot.debt = to_decimal_18(debt);

        match reader.issuance_data(account, &ctx.position) {
            Ok(data) => {
                snapshot.initial_debt_ownership = to_decimal_18(data.initial_debt_ownership);
                match reader.debt_ledger(data.debt_entry_index, &ctx.position) {
                    Ok(raw) => snapshot.debt_entry_at_index = to_decimal_18(raw),
                    // Ledger-entry reads revert around reorg boundaries.
                    Err(ReadError::Reverted) => {}
                    Err(e) => return Err(e.into_unresolvable("debt ledger entry")),
                }
            }
            Err(ReadError::Reverted) => {
                debug!("no issuance data for {} at block {}", account.to_hex(), ctx.position.block);
            }
            Err(e) => return Err(e.into_unresolvable("issuance data")),
        }
    } else {
        // The early-era contracts answer these reads best effort only; a
        // revert leaves the zero default, and there is no issuance state.
        match reader.balance_of(account, &ctx.position) {
            Ok(raw) => snapshot.balance = to_decimal_18(raw),
            Err(ReadError::Reverted) => {}
            Err(e) => return Err(e.into_unresolvable("snapshot balance")),
        }
        match reader.collateral(account, &ctx.position) {
            Ok(raw) => snapshot.collateral = to_decimal_18(raw),
            Err(ReadError::Reverted) => {}
            Err(e) => return Err(e.into_unresolvable("snapshot collateral")),
        }
        match reader.debt_balance(account, variant.unit_key("sUSD"), &ctx.position) {
            Ok(raw) => snapshot.debt = to_decimal_18(raw),
            Err(ReadError::Reverted) => {}
            Err(e) => return Err(e.into_unresolvable("snapshot debt balance")),
        }
    }

    session.put(&snapshot)?;
    Ok(())
}

/// Overwrite the beneficiary's escrowed-reward position from the escrow
/// contract, then refresh the holder projection, since vesting moves
/// collateral.
fn handle_vested(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    account: &Address,
    value: u128,
) -> Result<(), EventError> {
    let balance = reader
        .escrowed_balance(account, &ctx.position)
        .map_err(|e| e.into_unresolvable("escrowed balance"))?;
    let vested = reader
        .vested_balance(account, &ctx.position)
        .map_err(|e| e.into_unresolvable("vested balance"))?;

    debug!("vested {} for {}", to_decimal_18(value), account.to_hex());
    session.put(&RewardEscrowHolder {
        id: account.to_hex(),
        balance: to_decimal_18(balance),
        vested_balance: to_decimal_18(vested),
    })?;

    track_holder(session, reader, ctx, variant, account, false)?;
    Ok(())
}

/// Diff stored existence against freshly read eligibility and move the global
/// counter only on an actual crossing.
fn track_active_stakers(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    account: &Address,
) -> Result<(), EventError> {
    let debt = match reader.debt_balance(account, variant.unit_key("sUSD"), &ctx.position) {
        Ok(raw) => raw,
        // The 4-byte era debt read goes through rate lookups that were
        // frequently stale; a revert there skips staker tracking only.
        Err(ReadError::Reverted) if variant == Variant::KeyBytes4 => {
            debug!(
                "reverted debt balance for {} at block {}",
                account.to_hex(),
                ctx.position.block
            );
            return Ok(());
        }
        Err(e) => return Err(e.into_unresolvable("staker debt balance")),
    };

    let staker_id = account.to_hex();
    let eligible = debt > 0;
    let existed = session.contains::<ActiveStaker>(&staker_id)?;

    let mut total = session.get_or_create(TotalActiveStakers::ID, TotalActiveStakers::new)?;

    if eligible && !existed {
        session.put(&ActiveStaker { id: staker_id })?;
        total.count += 1;
        session.put(&total)?;
    } else if !eligible && existed {
        session.delete::<ActiveStaker>(&staker_id);
        total.count = total.count.saturating_sub(1);
        session.put(&total)?;
    }

    // One snapshot per calendar day, capturing the count the first time the
    // day is observed.
    let day = bucket_start(ctx.timestamp, DAY_SECONDS);
    let day_id = day.to_string();
    if session.get::<DailyActiveStakers>(&day_id)?.is_none() {
        if let Some(date) = chrono::DateTime::from_timestamp(day, 0) {
            debug!("snapshotting {} active stakers for {}", total.count, date.date_naive());
        }
        session.put(&DailyActiveStakers { id: day_id, timestamp: day, count: total.count })?;
    }

    Ok(())
}

fn track_daily_issuance(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    value: Decimal,
    burned: bool,
) -> Result<(), EventError> {
    let unit = variant.unit_key("sUSD");
    let read = reader
        .total_issued(unit, CollateralExclusion::Other, &ctx.position)
        .or_else(|_| reader.total_issued(unit, CollateralExclusion::Ether, &ctx.position));
    let total_debt = match read {
        Ok(raw) => to_decimal_18(raw),
        Err(e) => {
            debug!("skipping daily issuance rollup, total debt read failed: {e}");
            return Ok(());
        }
    };

    let day = bucket_start(ctx.timestamp, DAY_SECONDS).to_string();
    let mut daily = session.get_or_create(&day, || DailyIssuance::new(day.clone()))?;
    if burned {
        daily.burned += value;
    } else {
        daily.issued += value;
    }
    daily.total_debt = total_debt;
    session.put(&daily)?;
    Ok(())
}

/// Register a first-ever issuer and bump the global issuer count once.
fn track_issuer(session: &mut Session<'_>, account: &Address) -> Result<(), EventError> {
    let id = account.to_hex();
    if session.contains::<Issuer>(&id)? {
        return Ok(());
    }
    session.put(&Issuer { id })?;

    let mut meta = session.get_or_create(Metadata::ID, Metadata::new)?;
    meta.issuers += 1;
    session.put(&meta)?;
    Ok(())
}

/// Refresh the holder projection from historical reads and move the holders
/// counter on a 0 <-> nonzero balance crossing.
fn track_holder(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    account: &Address,
    minted: bool,
) -> Result<(), EventError> {
    let id = account.to_hex();
    let previous = session.get::<Holder>(&id)?;
    let mut holder = previous.clone().unwrap_or_else(|| Holder::new(id));
    holder.block = ctx.position.block;
    holder.timestamp = ctx.timestamp;

    match reader.balance_of(account, &ctx.position) {
        Ok(raw) => holder.balance = to_decimal_18(raw),
        // The single-currency era token occasionally reverted balance reads.
        Err(ReadError::Reverted) if variant == Variant::Havven => {}
        Err(e) => return Err(e.into_unresolvable("holder balance")),
    }
    match reader.collateral(account, &ctx.position) {
        Ok(raw) => holder.collateral = to_decimal_18(raw),
        Err(ReadError::Reverted) => {}
        Err(e @ ReadError::Unavailable(_)) => {
            return Err(e.into_unresolvable("holder collateral"));
        }
    }
    if variant.tracks_staking() {
        // Reverts while rates are stale; the stored value keeps its default.
        match reader.transferable(account, &ctx.position) {
            Ok(raw) => holder.transferable = to_decimal_18(raw),
            Err(ReadError::Reverted) => {}
            Err(e @ ReadError::Unavailable(_)) => {
                return Err(e.into_unresolvable("holder transferable balance"));
            }
        }
        // Absent issuance data keeps the zero defaults; the old token briefly
        // lost its resolver and answered nothing here.
        match reader.issuance_data(account, &ctx.position) {
            Ok(data) => {
                holder.initial_debt_ownership = to_decimal_18(data.initial_debt_ownership);
                match reader.debt_ledger(data.debt_entry_index, &ctx.position) {
                    Ok(raw) => holder.debt_entry_at_index = to_decimal_18(raw),
                    Err(ReadError::Reverted) => {}
                    Err(e) => return Err(e.into_unresolvable("debt ledger entry")),
                }
            }
            Err(ReadError::Reverted) => {}
            Err(e @ ReadError::Unavailable(_)) => {
                return Err(e.into_unresolvable("holder issuance data"));
            }
        }
    }

    let held_before = previous.map(|h| h.balance > Decimal::ZERO).unwrap_or(false);
    let holds_now = holder.balance > Decimal::ZERO;
    if holds_now != held_before {
        let mut meta = session.get_or_create(Metadata::ID, Metadata::new)?;
        if holds_now {
            meta.holders += 1;
        } else {
            meta.holders = meta.holders.saturating_sub(1);
        }
        session.put(&meta)?;
    }

    if minted {
        holder.mints += 1;
    }
    session.put(&holder)?;
    Ok(())
}

fn handle_fees_claimed(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    variant: Variant,
    account: &Address,
    value: u128,
    rewards: u128,
) -> Result<(), EventError> {
    // Older variants paid claims in the internal reserve unit; their value has
    // to be converted into the unit of account at the event's position.
    let value_usd = if variant.has_extended_reads() {
        to_decimal_18(value)
    } else {
        let from = variant.unit_key("XDR");
        let to = variant.unit_key("sUSD");
        match reader.effective_value(from, value, to, &ctx.position) {
            Ok(raw) => to_decimal_18(raw),
            Err(ReadError::Reverted) => {
                warn!("reverted claim conversion in tx {}", ctx.tx_hash.to_hex());
                Decimal::ZERO
            }
            Err(e @ ReadError::Unavailable(_)) => {
                return Err(e.into_unresolvable("claim value conversion"));
            }
        }
    };

    session.put(&FeesClaimedRecord {
        id: ctx.record_id(),
        account: *account,
        value: value_usd,
        rewards: to_decimal_18(rewards),
        timestamp: ctx.timestamp,
        block: ctx.position.block,
    })?;

    if let Some(mut holder) = session.get::<Holder>(&account.to_hex())? {
        holder.claims += 1;
        session.put(&holder)?;
    }
    Ok(())
}
