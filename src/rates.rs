//! Latest-rate lookup backed by the entity store, with one-time registration
//! of previously unknown units.
//!
//! Guessing a rate would corrupt every downstream aggregate, so a unit whose
//! reference source cannot be discovered fails the whole containing event
//! instead of defaulting.

use crate::chain::{EventContext, ProtocolReader};
use crate::entity::{LatestRate, RateSource, StableUnit};
use crate::error::EventError;
use crate::numeric::to_decimal_18;
use crate::store::Session;
use log::debug;
use rust_decimal::Decimal;

/// Units pegged one-to-one to the unit of account.
pub const STABLE_UNITS: [&str; 2] = ["sUSD", "nUSD"];

pub fn is_stable_unit(unit: &str) -> bool {
    STABLE_UNITS.contains(&unit)
}

/// Latest known exchange rate for `unit` as of the event under processing.
///
/// Missing rate for a stable unit: fixed 1.0, and both stable aliases are
/// registered as known references. Missing rate for any other unit: a one-time
/// registration lookup against the protocol's rate source; an absent source
/// aborts the event with [`EventError::Unresolvable`].
pub fn latest_rate(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    unit: &str,
) -> Result<Decimal, EventError> {
    if let Some(known) = session.get::<LatestRate>(unit)? {
        return Ok(known.rate);
    }

    if is_stable_unit(unit) {
        for alias in STABLE_UNITS {
            session.put(&StableUnit { id: alias.to_owned() })?;
            session.put(&LatestRate { id: alias.to_owned(), rate: Decimal::ONE })?;
        }
        return Ok(Decimal::ONE);
    }

    register_unit(session, reader, ctx, unit)
}

/// Discover and persist the reference-rate source for an unknown unit, then
/// return its current rate.
fn register_unit(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    unit: &str,
) -> Result<Decimal, EventError> {
    let source = reader
        .aggregator_source(unit, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("aggregator source for {unit}")))?;

    if source.is_zero() {
        return Err(EventError::Unresolvable(format!(
            "no rate source registered for unit {unit}"
        )));
    }

    let raw = reader
        .rate_for_unit(unit, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("rate for {unit}")))?;
    let rate = to_decimal_18(raw);

    debug!("registered rate source {} for unit {unit}", source.to_hex());
    session.put(&RateSource { id: unit.to_owned(), source })?;
    session.put(&LatestRate { id: unit.to_owned(), rate })?;

    Ok(rate)
}
