//! Rolling aggregation engine: fans each exchange event out into the full
//! cross product of scope, period and magnitude buckets.
//!
//! Period widths and the magnitude cap are historical constants; downstream
//! consumers depend on the exact thresholds, so they are not re-derived here.

use crate::chain::{Address, EventContext, ProtocolReader};
use crate::entity::{Exchanger, ExchangeRecord, FeeRate, SettlementRecord, TotalBucket};
use crate::error::EventError;
use crate::event::ExchangeEvent;
use crate::numeric::{to_decimal_18, usd_from_asset};
use crate::rates::latest_rate;
use crate::store::Session;
use rust_decimal::Decimal;

pub const FIFTEEN_MINUTE_SECONDS: i64 = 900;
pub const DAY_SECONDS: i64 = 86_400;
pub const WEEK_SECONDS: i64 = 7 * DAY_SECONDS;
pub const YEAR_SECONDS: i64 = 31_536_000;

/// Bucket widths every event contributes to. Zero is the all-time sentinel:
/// no time bucketing at all.
pub const PERIODS: [i64; 7] = [
    YEAR_SECONDS,
    YEAR_SECONDS / 4,
    YEAR_SECONDS / 12,
    WEEK_SECONDS,
    DAY_SECONDS,
    FIFTEEN_MINUTE_SECONDS,
    0,
];

/// Cardinality cap for magnitude buckets.
pub const MAX_MAGNITUDE: u32 = 10;

/// Fallback fee rate (30 basis points) applied to the gross amount when the
/// computed fee comes out negative, which happens when a secondary-source rate
/// disagrees with the primary trade ratio.
pub fn default_fee_rate() -> Decimal {
    Decimal::new(3, 3)
}

/// Start of the bucket containing `timestamp` for a given width; the all-time
/// width maps everything onto the zero sentinel bucket.
pub fn bucket_start(timestamp: i64, period: i64) -> i64 {
    if period == 0 { 0 } else { timestamp / period * period }
}

/// Number of magnitude buckets an amount qualifies for. An event contributes
/// to every bucket `m` with `amount >= 10^m`, a prefix capped at
/// [`MAX_MAGNITUDE`]: bucket `m` reads as "trades of at least 10^m".
pub fn magnitude_count(amount: Decimal) -> u32 {
    let mut threshold = Decimal::ONE;
    for m in 0..MAX_MAGNITUDE {
        if amount < threshold {
            return m;
        }
        threshold *= Decimal::TEN;
    }
    MAX_MAGNITUDE
}

pub fn handle_exchange_event(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    event: &ExchangeEvent,
) -> Result<(), EventError> {
    match event {
        ExchangeEvent::SynthExchange {
            account,
            from_unit,
            to_unit,
            from_amount,
            to_amount,
            to_address,
        } => handle_synth_exchange(
            session, reader, ctx, account, from_unit, to_unit, *from_amount, *to_amount, to_address,
        ),
        ExchangeEvent::ExchangeReclaim { account, unit, amount } => {
            handle_settlement(session, reader, ctx, account, unit, *amount, true)
        }
        ExchangeEvent::ExchangeRebate { account, unit, amount } => {
            handle_settlement(session, reader, ctx, account, unit, *amount, false)
        }
        ExchangeEvent::FeeRateUpdated { unit, rate } => {
            session.put(&FeeRate { id: unit.clone(), rate: to_decimal_18(*rate) })?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_synth_exchange(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    account: &Address,
    from_unit: &str,
    to_unit: &str,
    from_amount: u128,
    to_amount: u128,
    to_address: &Address,
) -> Result<(), EventError> {
    let from_rate = latest_rate(session, reader, ctx, from_unit)?;
    let to_rate = latest_rate(session, reader, ctx, to_unit)?;

    let from_usd = usd_from_asset(from_amount, from_rate);
    let to_usd = usd_from_asset(to_amount, to_rate);

    let mut fees_usd = from_usd - to_usd;
    if fees_usd < Decimal::ZERO {
        fees_usd = from_usd * default_fee_rate();
    }

    session.put(&ExchangeRecord {
        id: ctx.record_id(),
        account: *account,
        from_unit: from_unit.to_owned(),
        to_unit: to_unit.to_owned(),
        from_amount: to_decimal_18(from_amount),
        from_amount_usd: from_usd,
        to_amount: to_decimal_18(to_amount),
        to_amount_usd: to_usd,
        fees_usd,
        to_address: *to_address,
        timestamp: ctx.timestamp,
        block: ctx.position.block,
    })?;

    // First-ever activity is decided once per event against the global record,
    // before any bucket is touched; checking per bucket would count the same
    // participant as new once per bucket.
    let global_id = Exchanger::global_id(account);
    let is_new_participant = !session.contains::<Exchanger>(&global_id)?;

    let mut global = session.get_or_create(&global_id, || Exchanger::new(global_id.clone(), ctx.timestamp))?;
    global.last_seen = ctx.timestamp;
    global.trades += 1;
    global.volume_usd += from_usd;
    global.fees_usd += fees_usd;
    session.put(&global)?;

    let mut scopes: Vec<Option<&str>> = vec![None, Some(from_unit)];
    if to_unit != from_unit {
        scopes.push(Some(to_unit));
    }

    let magnitudes = magnitude_count(from_usd);

    for scope in scopes {
        for period in PERIODS {
            let start = bucket_start(ctx.timestamp, period);
            for magnitude in 0..magnitudes {
                track_bucket(
                    session,
                    ctx,
                    account,
                    start,
                    period,
                    magnitude,
                    scope,
                    is_new_participant,
                    from_usd,
                    fees_usd,
                )?;
            }
        }
    }

    Ok(())
}

/// Apply one event's contribution to a single aggregate cell and its
/// bucket-scoped participant record.
#[allow(clippy::too_many_arguments)]
fn track_bucket(
    session: &mut Session<'_>,
    ctx: &EventContext,
    account: &Address,
    start: i64,
    period: i64,
    magnitude: u32,
    scope: Option<&str>,
    is_new_participant: bool,
    amount_usd: Decimal,
    fees_usd: Decimal,
) -> Result<(), EventError> {
    let bucket_id = TotalBucket::compose_id(start, magnitude, scope, period);
    let mut bucket =
        session.get_or_create(&bucket_id, || TotalBucket::new(start, magnitude, scope, period))?;

    bucket.trades += 1;
    if is_new_participant {
        bucket.new_exchangers += 1;
    }

    let scoped_id = Exchanger::bucket_id(account, &bucket_id);
    let mut scoped = match session.get::<Exchanger>(&scoped_id)? {
        Some(existing) => existing,
        None => {
            bucket.exchangers += 1;
            Exchanger::new(scoped_id, ctx.timestamp)
        }
    };

    scoped.last_seen = ctx.timestamp;
    scoped.trades += 1;
    scoped.volume_usd += amount_usd;
    scoped.fees_usd += fees_usd;

    bucket.volume_usd += amount_usd;
    bucket.fees_usd += fees_usd;

    session.put(&bucket)?;
    session.put(&scoped)?;
    Ok(())
}

fn handle_settlement(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    account: &Address,
    unit: &str,
    amount: u128,
    reclaim: bool,
) -> Result<(), EventError> {
    let rate = latest_rate(session, reader, ctx, unit)?;

    session.put(&SettlementRecord {
        id: ctx.record_id(),
        account: *account,
        unit: unit.to_owned(),
        amount: to_decimal_18(amount),
        amount_usd: usd_from_asset(amount, rate),
        reclaim,
        timestamp: ctx.timestamp,
        block: ctx.position.block,
    })?;
    Ok(())
}
