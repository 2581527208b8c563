//! Shared fixtures for the integration suites: a configurable in-memory
//! protocol reader and event-context builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use synth_metrics::chain::{
    Address, CollateralExclusion, DealCollateral, DealState, EventContext, IssuanceData, Network,
    OrderState, Position, ProtocolReader, ReadError, ReadResult, TxHash, UnitKey,
};
use synth_metrics::service::MetricsService;

/// One whole token at the protocol's 18-digit scale.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

pub fn addr(tag: u8) -> Address {
    Address([tag; 20])
}

/// Reader answering from fixed tables. Absent entries behave like the real
/// collaborator: rate and order/deal reads revert, balance-style reads
/// answer zero.
#[derive(Default)]
pub struct StaticReader {
    pub aggregators: HashMap<String, Address>,
    pub rates: HashMap<String, u128>,
    pub debts: HashMap<Address, u128>,
    /// Force every debt read to revert, regardless of the table.
    pub debt_reverts: bool,
    pub balances: HashMap<Address, u128>,
    pub collaterals: HashMap<Address, u128>,
    pub transferables: HashMap<Address, u128>,
    pub total_issued: Option<u128>,
    /// Claim-conversion answers keyed by the raw input amount.
    pub effective_values: HashMap<u128, u128>,
    pub issuance_data: HashMap<Address, IssuanceData>,
    pub debt_ledger: HashMap<u64, u128>,
    pub escrowed: HashMap<Address, u128>,
    pub vested: HashMap<Address, u128>,
    pub orders: HashMap<Address, OrderState>,
    pub deals: HashMap<u64, DealState>,
    pub deal_collaterals: HashMap<u64, DealCollateral>,
}

impl StaticReader {
    /// Register a priced unit: a nonzero rate source plus its raw rate.
    pub fn with_rate(mut self, unit: &str, source_tag: u8, raw_rate: u128) -> Self {
        self.aggregators.insert(unit.to_owned(), addr(source_tag));
        self.rates.insert(unit.to_owned(), raw_rate);
        self
    }
}

impl ProtocolReader for StaticReader {
    fn aggregator_source(&self, unit: &str, _at: &Position) -> ReadResult<Address> {
        Ok(self.aggregators.get(unit).copied().unwrap_or(Address::ZERO))
    }

    fn rate_for_unit(&self, unit: &str, _at: &Position) -> ReadResult<u128> {
        self.rates.get(unit).copied().ok_or(ReadError::Reverted)
    }

    fn debt_balance(
        &self,
        account: &Address,
        _unit: UnitKey<'_>,
        _at: &Position,
    ) -> ReadResult<u128> {
        if self.debt_reverts {
            return Err(ReadError::Reverted);
        }
        Ok(self.debts.get(account).copied().unwrap_or(0))
    }

    fn balance_of(&self, account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(self.balances.get(account).copied().unwrap_or(0))
    }

    fn collateral(&self, account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(self.collaterals.get(account).copied().unwrap_or(0))
    }

    fn transferable(&self, account: &Address, _at: &Position) -> ReadResult<u128> {
        Ok(self.transferables.get(account).copied().unwrap_or(0))
    }

    fn total_issued(
        &self,
        _unit: UnitKey<'_>,
        _excluding: CollateralExclusion,
        _at: &Position,
    ) -> ReadResult<u128> {
        self.total_issued.ok_or(ReadError::Reverted)
    }

    fn effective_value(
        &self,
        _from: UnitKey<'_>,
        amount: u128,
        _to: UnitKey<'_>,
        _at: &Position,
    ) -> ReadResult<u128> {
        self.effective_values.get(&amount).copied().ok_or(ReadError::Reverted)
    }

    fn issuance_data(&self, account: &Address, _at: &Position) -> ReadResult<IssuanceData> {
        self.issuance_data.get(account).copied().ok_or(ReadError::Reverted)
    }

    fn debt_ledger(&self, index: u64, _at: &Position) -> ReadResult<u128> {
        self.debt_ledger.get(&index).copied().ok_or(ReadError::Reverted)
    }

    fn escrowed_balance(&self, account: &Address, _at: &Position) -> ReadResult<u128> {
        self.escrowed.get(account).copied().ok_or(ReadError::Reverted)
    }

    fn vested_balance(&self, account: &Address, _at: &Position) -> ReadResult<u128> {
        self.vested.get(account).copied().ok_or(ReadError::Reverted)
    }

    fn order(&self, _venue: &Address, maker: &Address, _at: &Position) -> ReadResult<OrderState> {
        self.orders.get(maker).cloned().ok_or(ReadError::Reverted)
    }

    fn deal(&self, _venue: &Address, deal_id: u64, _at: &Position) -> ReadResult<DealState> {
        self.deals.get(&deal_id).cloned().ok_or(ReadError::Reverted)
    }

    fn deal_collateral(
        &self,
        _venue: &Address,
        deal_id: u64,
        _at: &Position,
    ) -> ReadResult<DealCollateral> {
        self.deal_collaterals.get(&deal_id).cloned().ok_or(ReadError::Reverted)
    }
}

/// Mainnet event context with a tx hash derived from the position, so record
/// ids are unique and deterministic across a test.
pub fn ctx(block: u64, log_index: u32, timestamp: i64) -> EventContext {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&block.to_be_bytes());
    hash[8..12].copy_from_slice(&log_index.to_be_bytes());
    EventContext {
        network: Network::Mainnet,
        position: Position { block, log_index },
        timestamp,
        tx_hash: TxHash(hash),
        tx_from: addr(0xaa),
        tx_to: Some(addr(0xcc)),
        tx_selector: None,
        source: addr(0xfe),
    }
}

pub fn ctx_with_selector(
    block: u64,
    log_index: u32,
    timestamp: i64,
    selector: [u8; 4],
) -> EventContext {
    let mut context = ctx(block, log_index, timestamp);
    context.tx_selector = Some(selector);
    context
}

/// Context for issuance transactions, which additionally pin the sender that
/// the derived tracking follows.
pub fn issuance_ctx(
    block: u64,
    log_index: u32,
    timestamp: i64,
    selector: [u8; 4],
    from: u8,
) -> EventContext {
    let mut context = ctx_with_selector(block, log_index, timestamp, selector);
    context.tx_from = addr(from);
    context
}

/// Fresh service over a temp sled database. The temp dir must outlive the
/// service, sled holds a file lock inside it.
pub fn service(reader: StaticReader) -> (tempfile::TempDir, MetricsService<StaticReader>) {
    let dir = tempfile::tempdir().unwrap();
    let db = sled::open(dir.path().join("metrics.db")).unwrap();
    (dir, MetricsService::new(Arc::new(db), reader))
}

/// Second service over the same database path, used when a test needs later
/// events to observe different collaborator state. Sled holds an exclusive
/// file lock, so drop the previous service first.
pub fn reopen(dir: &tempfile::TempDir, reader: StaticReader) -> MetricsService<StaticReader> {
    let db = sled::open(dir.path().join("metrics.db")).unwrap();
    MetricsService::new(Arc::new(db), reader)
}
