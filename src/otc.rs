//! Over-the-counter projections: profiles, orders and deals, plus venue
//! totals and the per-day rollup.
//!
//! Orders and deals are overwritten from an authoritative historical read on
//! every relevant event rather than accumulated, so their fields always mirror
//! the trading contract's state at the event position.

use crate::chain::{Address, EventContext, ProtocolReader};
use crate::entity::{DailyOtc, Deal, DealPhase, Entity, Order, OtcTotals};
use crate::error::EventError;
use crate::event::OtcEvent;
use crate::numeric::to_decimal_18;
use crate::store::Session;
use rust_decimal::Decimal;

pub fn handle_otc_event(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    event: &OtcEvent,
) -> Result<(), EventError> {
    match event {
        OtcEvent::RegisterProfile { .. } => handle_register_profile(session, ctx),
        OtcEvent::DestroyProfile { .. } => handle_destroy_profile(session, ctx),
        OtcEvent::OpenOrder { order_id, maker } => {
            handle_open_order(session, reader, ctx, *order_id, maker)
        }
        OtcEvent::UpdateOrder { order_id, maker } => {
            handle_update_order(session, reader, ctx, *order_id, maker)
        }
        OtcEvent::CloseOrder { order_id } => handle_close_order(session, ctx, *order_id),
        OtcEvent::UpdateDeal { deal_id } => handle_update_deal(session, reader, ctx, *deal_id),
    }
}

fn totals(session: &Session<'_>) -> Result<OtcTotals, EventError> {
    Ok(session.get_or_create(OtcTotals::ID, OtcTotals::new)?)
}

/// Get-or-create the rollup for the event's calendar day and refresh its
/// position fields.
fn daily(session: &Session<'_>, ctx: &EventContext) -> Result<DailyOtc, EventError> {
    let day_id = (ctx.timestamp / 86_400).to_string();
    let mut daily = session.get_or_create(&day_id, || DailyOtc::new(day_id.clone()))?;
    daily.timestamp = ctx.timestamp;
    daily.block = ctx.position.block;
    Ok(daily)
}

fn handle_register_profile(session: &mut Session<'_>, ctx: &EventContext) -> Result<(), EventError> {
    let mut totals = totals(session)?;
    totals.users += 1;
    totals.block = ctx.position.block;
    totals.timestamp = ctx.timestamp;
    session.put(&totals)?;

    let mut daily = daily(session, ctx)?;
    daily.profiles_opened += 1;
    session.put(&daily)?;
    Ok(())
}

fn handle_destroy_profile(session: &mut Session<'_>, ctx: &EventContext) -> Result<(), EventError> {
    let mut totals = totals(session)?;
    totals.users = totals.users.saturating_sub(1);
    totals.block = ctx.position.block;
    totals.timestamp = ctx.timestamp;
    session.put(&totals)?;

    let mut daily = daily(session, ctx)?;
    daily.profiles_closed += 1;
    session.put(&daily)?;
    Ok(())
}

fn handle_open_order(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    order_id: u64,
    maker: &Address,
) -> Result<(), EventError> {
    let state = reader
        .order(&ctx.source, maker, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("order {order_id}")))?;

    let mut order =
        session.get_or_create(&order_id.to_string(), || Order::new(order_id, *maker, ctx.timestamp))?;
    order.maker = *maker;
    order.coin_code = state.coin_code;
    order.currency_code = state.currency_code;
    order.price = to_decimal_18(state.price);
    order.remaining = to_decimal_18(state.remaining);
    order.locked = to_decimal_18(state.locked);
    order.closed = false;
    order.updated_at = ctx.timestamp;
    order.block = ctx.position.block;
    session.put(&order)?;

    let mut totals = totals(session)?;
    totals.orders += 1;
    session.put(&totals)?;

    let mut daily = daily(session, ctx)?;
    daily.orders_opened += 1;
    session.put(&daily)?;
    Ok(())
}

fn handle_update_order(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    order_id: u64,
    maker: &Address,
) -> Result<(), EventError> {
    let Some(mut order) = session.get::<Order>(&order_id.to_string())? else {
        return Err(EventError::MissingPrerequisite {
            kind: Order::KIND,
            id: order_id.to_string(),
        });
    };

    let state = reader
        .order(&ctx.source, maker, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("order {order_id}")))?;

    order.price = to_decimal_18(state.price);
    order.remaining = to_decimal_18(state.remaining);
    order.locked = to_decimal_18(state.locked);
    order.updated_at = ctx.timestamp;
    order.block = ctx.position.block;
    session.put(&order)?;
    Ok(())
}

fn handle_close_order(
    session: &mut Session<'_>,
    ctx: &EventContext,
    order_id: u64,
) -> Result<(), EventError> {
    let Some(mut order) = session.get::<Order>(&order_id.to_string())? else {
        return Err(EventError::MissingPrerequisite {
            kind: Order::KIND,
            id: order_id.to_string(),
        });
    };

    order.price = Decimal::ZERO;
    order.remaining = Decimal::ZERO;
    order.closed = true;
    order.updated_at = ctx.timestamp;
    order.block = ctx.position.block;
    session.put(&order)?;

    let mut totals = totals(session)?;
    totals.orders = totals.orders.saturating_sub(1);
    session.put(&totals)?;

    let mut daily = daily(session, ctx)?;
    daily.orders_closed += 1;
    session.put(&daily)?;
    Ok(())
}

fn handle_update_deal(
    session: &mut Session<'_>,
    reader: &dyn ProtocolReader,
    ctx: &EventContext,
    deal_id: u64,
) -> Result<(), EventError> {
    let state = reader
        .deal(&ctx.source, deal_id, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("deal {deal_id}")))?;
    let backing = reader
        .deal_collateral(&ctx.source, deal_id, &ctx.position)
        .map_err(|e| e.into_unresolvable(&format!("collateral for deal {deal_id}")))?;

    let mut deal = session.get_or_create(&deal_id.to_string(), || Deal::new(deal_id, ctx.timestamp))?;
    deal.order_id = state.order_id;
    deal.coin_code = state.coin_code;
    deal.currency_code = state.currency_code;
    deal.price = to_decimal_18(state.price);
    deal.amount = to_decimal_18(state.amount);
    deal.fee = to_decimal_18(state.fee);
    deal.maker = state.maker;
    deal.taker = state.taker;
    deal.collateral_type = backing.collateral_type;
    deal.locked = to_decimal_18(backing.locked);
    deal.collateral = to_decimal_18(backing.collateral);
    deal.updated_at = ctx.timestamp;
    deal.block = ctx.position.block;

    let mut totals = totals(session)?;
    totals.block = ctx.position.block;
    totals.timestamp = ctx.timestamp;
    let mut daily = daily(session, ctx)?;

    match state.phase {
        0 => {
            deal.phase = DealPhase::Confirming;
            totals.deals_confirming += 1;
            daily.deals_confirming += 1;
        }
        1 => {
            deal.phase = DealPhase::Cancelled;
            totals.deals_confirming = totals.deals_confirming.saturating_sub(1);
            totals.deals_cancelled += 1;
            daily.deals_cancelled += 1;
        }
        _ => {
            deal.phase = DealPhase::Confirmed;
            totals.deals_confirming = totals.deals_confirming.saturating_sub(1);
            totals.deals_confirmed += 1;
            daily.deals_confirmed += 1;

            totals.volume += deal.amount;
            daily.volume += deal.amount;

            // Longest/shortest time from deal opening to confirmation.
            let trade_period = ctx.timestamp - state.opened_at;
            if trade_period > totals.longest_deal_secs {
                totals.longest_deal_secs = trade_period;
                if totals.shortest_deal_secs == 0 {
                    totals.shortest_deal_secs = trade_period;
                }
            } else if trade_period < totals.shortest_deal_secs {
                totals.shortest_deal_secs = trade_period;
            }
        }
    }

    session.put(&totals)?;
    session.put(&daily)?;
    session.put(&deal)?;
    Ok(())
}
