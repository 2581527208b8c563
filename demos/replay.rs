//! Replays a small synthetic event sequence through the metrics service and
//! prints the aggregates it produced.
//!
//! Run with `RUST_LOG=debug cargo run --example replay` to watch the rate
//! registrations and daily snapshots go by.

use std::sync::Arc;

use synth_metrics::aggregate::{PERIODS, bucket_start};
use synth_metrics::chain::{
    Address, CollateralExclusion, DealCollateral, DealState, EventContext, IssuanceData, Network,
    OrderState, Position, ProtocolReader, ReadError, ReadResult, TxHash, UnitKey,
};
use synth_metrics::entity::{TotalActiveStakers, TotalBucket};
use synth_metrics::event::{Event, ExchangeEvent, IssuanceEvent};
use synth_metrics::service::MetricsService;

const UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed-answer reader standing in for the historical-state collaborator.
struct DemoReader;

impl ProtocolReader for DemoReader {
    fn aggregator_source(&self, unit: &str, _at: &Position) -> ReadResult<Address> {
        match unit {
            "sETH" => Ok(Address([0x01; 20])),
            "sBTC" => Ok(Address([0x02; 20])),
            _ => Ok(Address::ZERO),
        }
    }

    fn rate_for_unit(&self, unit: &str, _at: &Position) -> ReadResult<u128> {
        match unit {
            // 1 sETH = 1600, 1 sBTC = 28000 in the unit of account.
            "sETH" => Ok(1600 * UNIT),
            "sBTC" => Ok(28_000 * UNIT),
            _ => Err(ReadError::Reverted),
        }
    }

    fn debt_balance(&self, _account: &Address, _unit: UnitKey<'_>, _at: &Position) -> ReadResult<u128> {
        Ok(40 * UNIT)
    }

    fn balance_of(&self, _account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(120 * UNIT)
    }

    fn collateral(&self, _account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(200 * UNIT)
    }

    fn transferable(&self, _account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(80 * UNIT)
    }

    fn total_issued(
        &self,
        _unit: UnitKey<'_>,
        _excluding: CollateralExclusion,
        _at: &Position,
    ) -> ReadResult<u128> {
        Ok(1_000_000 * UNIT)
    }

    fn effective_value(
        &self,
        _from: UnitKey<'_>,
        amount: u128,
        _to: UnitKey<'_>,
        _at: &Position,
    ) -> ReadResult<u128> {
        Ok(amount)
    }

    fn issuance_data(&self, _account: &Address, _at: &Position) -> ReadResult<IssuanceData> {
        Ok(IssuanceData { initial_debt_ownership: UNIT / 25, debt_entry_index: 1 })
    }

    fn debt_ledger(&self, _index: u64, _at: &Position) -> ReadResult<u128> {
        Ok(UNIT)
    }

    fn escrowed_balance(&self, _account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(10 * UNIT)
    }

    fn vested_balance(&self, _account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(UNIT)
    }

    fn order(&self, _venue: &Address, _maker: &Address, _at: &Position) -> ReadResult<OrderState> {
        Err(ReadError::Reverted)
    }

    fn deal(&self, _venue: &Address, _deal_id: u64, _at: &Position) -> ReadResult<DealState> {
        Err(ReadError::Reverted)
    }

    fn deal_collateral(
        &self,
        _venue: &Address,
        _deal_id: u64,
        _at: &Position,
    ) -> ReadResult<DealCollateral> {
        Err(ReadError::Reverted)
    }
}

fn ctx(block: u64, log_index: u32, timestamp: i64) -> EventContext {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&block.to_be_bytes());
    hash[8..12].copy_from_slice(&log_index.to_be_bytes());
    EventContext {
        network: Network::Mainnet,
        position: Position { block, log_index },
        timestamp,
        tx_hash: TxHash(hash),
        tx_from: Address([0x11; 20]),
        tx_to: Some(Address([0xee; 20])),
        // issueSynths(uint256)
        tx_selector: Some([0x8a, 0x29, 0x00, 0x14]),
        source: Address([0xfe; 20]),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let db = sled::open(dir.path().join("replay.db"))?;
    let service = MetricsService::new(Arc::new(db), DemoReader);

    let trader = Address([0x11; 20]);
    let day_one = 1_700_000_000i64;

    let events = [
        (
            ctx(9_600_000, 0, day_one),
            Event::Exchange(ExchangeEvent::SynthExchange {
                account: trader,
                from_unit: "sUSD".to_owned(),
                to_unit: "sETH".to_owned(),
                from_amount: 3200 * UNIT,
                to_amount: 2 * UNIT,
                to_address: trader,
            }),
        ),
        (
            ctx(9_600_050, 0, day_one + 600),
            Event::Exchange(ExchangeEvent::SynthExchange {
                account: trader,
                from_unit: "sETH".to_owned(),
                to_unit: "sBTC".to_owned(),
                from_amount: UNIT,
                to_amount: 57 * UNIT / 1000,
                to_address: trader,
            }),
        ),
        (
            ctx(9_600_100, 0, day_one + 1200),
            Event::Issuance(IssuanceEvent::Issued {
                value: 500 * UNIT,
                source_unit: "sUSD".to_owned(),
            }),
        ),
    ];

    for (context, event) in &events {
        service.handle_event(context, event)?;
    }

    println!("aggregates for the replayed day:");
    for period in PERIODS {
        let start = bucket_start(day_one, period);
        let id = TotalBucket::compose_id(start, 0, None, period);
        if let Some(bucket) = service.store().load::<TotalBucket>(&id)? {
            println!(
                "  period {:>9}s  trades {}  volume {:.2}  fees {:.4}",
                period, bucket.trades, bucket.volume_usd, bucket.fees_usd
            );
        }
    }

    if let Some(stakers) = service.store().load::<TotalActiveStakers>(TotalActiveStakers::ID)? {
        println!("active stakers: {}", stakers.count);
    }

    Ok(())
}
