//! Interfaces to the external collaborators the engine runs against: the
//! position/context attached to every delivered event, and read-only calls
//! into historical protocol state.
//!
//! The delivery runtime guarantees ordered, reorg-safe events and owns the
//! rollback of already-committed writes; nothing here assumes re-delivery can
//! be requested.

use crate::error::EventError;

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl<C> minicbor::Encode<C> for Address {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        self.0.encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Address {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw: [u8; 20] = d.decode()?;
        Ok(Address(raw))
    }
}

/// Transaction hash, kept only for building deterministic record ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Total-order key of an event: block height plus intra-block log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub block: u64,
    pub log_index: u32,
}

/// Network the event stream was produced on. Version resolution falls back to
/// the latest variant for networks without a threshold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Optimism,
    Other,
}

/// Context supplied implicitly with every delivered event.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub network: Network,
    pub position: Position,
    /// Block timestamp, unix seconds.
    pub timestamp: i64,
    pub tx_hash: TxHash,
    /// Sender of the transaction that emitted the event.
    pub tx_from: Address,
    /// Contract the transaction was sent to, when known.
    pub tx_to: Option<Address>,
    /// First four bytes of the transaction input, used to recognize which
    /// historical calling convention produced the event.
    pub tx_selector: Option<[u8; 4]>,
    /// Contract that emitted the event.
    pub source: Address,
}

impl EventContext {
    /// Deterministic id for per-event records: `{tx_hash}-{log_index}`.
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.tx_hash.to_hex(), self.position.log_index)
    }
}

/// Failure of a historical read. `Reverted` is a normal, expected outcome and
/// every call site decides how to absorb it.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("call reverted")]
    Reverted,
    #[error("read collaborator unavailable: {0}")]
    Unavailable(String),
}

impl ReadError {
    /// Promote this read failure into an event-abandoning error.
    pub fn into_unresolvable(self, context: &str) -> EventError {
        EventError::Unresolvable(format!("{context}: {self}"))
    }
}

pub type ReadResult<T> = Result<T, ReadError>;

/// A symbolic currency key together with the encoding width the resolved
/// protocol variant expects for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKey<'a> {
    Bytes4(&'a str),
    Bytes32(&'a str),
}

impl UnitKey<'_> {
    pub fn symbol(&self) -> &str {
        match self {
            UnitKey::Bytes4(s) | UnitKey::Bytes32(s) => s,
        }
    }
}

/// Which collateral class a total-debt read excludes. Newer protocol variants
/// only answer the broader exclusion; call sites fall back to the narrower one
/// when the first read reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollateralExclusion {
    Other,
    Ether,
}

/// Snapshot of an open order as held by the trading contract.
#[derive(Debug, Clone)]
pub struct OrderState {
    pub coin_code: String,
    pub currency_code: String,
    pub price: u128,
    pub remaining: u128,
    pub locked: u128,
}

/// Per-account issuance bookkeeping held by the protocol state contract.
#[derive(Debug, Clone, Copy)]
pub struct IssuanceData {
    pub initial_debt_ownership: u128,
    /// Index into the debt ledger at which the account last moved its debt.
    pub debt_entry_index: u64,
}

/// Collateral backing a deal, held in a separate table on the trading
/// contract and read after the deal fields.
#[derive(Debug, Clone)]
pub struct DealCollateral {
    pub collateral_type: String,
    pub locked: u128,
    pub collateral: u128,
}

/// Snapshot of a deal as held by the trading contract. `phase` carries the raw
/// state discriminant: 0 confirming, 1 cancelled, anything else confirmed.
#[derive(Debug, Clone)]
pub struct DealState {
    pub coin_code: String,
    pub currency_code: String,
    pub order_id: u64,
    pub price: u128,
    pub amount: u128,
    pub fee: u128,
    /// When the deal was opened on-chain, unix seconds.
    pub opened_at: i64,
    pub maker: Address,
    pub taker: Address,
    pub phase: u8,
}

/// Read-only calls against protocol state at a specific historical position.
///
/// All raw amounts are fixed-precision integers scaled by 18 digits unless
/// noted otherwise. Implementations must answer as of `at`, not as of head.
pub trait ProtocolReader {
    /// Address of the reference-rate source registered for a unit, or the zero
    /// address when none exists.
    fn aggregator_source(&self, unit: &str, at: &Position) -> ReadResult<Address>;

    /// Current reference rate for a unit.
    fn rate_for_unit(&self, unit: &str, at: &Position) -> ReadResult<u128>;

    /// Outstanding debt of an account denominated in `unit`.
    fn debt_balance(&self, account: &Address, unit: UnitKey<'_>, at: &Position) -> ReadResult<u128>;

    /// Token balance of an account.
    fn balance_of(&self, account: &Address, at: &Position) -> ReadResult<u128>;

    /// Total collateral (held plus escrowed) of an account.
    fn collateral(&self, account: &Address, at: &Position) -> ReadResult<u128>;

    /// Transferable portion of an account's balance. Reverts while rates are
    /// stale, which callers tolerate.
    fn transferable(&self, account: &Address, at: &Position) -> ReadResult<u128>;

    /// System-wide issued total for a unit, excluding one collateral class.
    fn total_issued(
        &self,
        unit: UnitKey<'_>,
        excluding: CollateralExclusion,
        at: &Position,
    ) -> ReadResult<u128>;

    /// Value of `amount` of `from` expressed in `to`.
    fn effective_value(
        &self,
        from: UnitKey<'_>,
        amount: u128,
        to: UnitKey<'_>,
        at: &Position,
    ) -> ReadResult<u128>;

    /// Issuance bookkeeping for an account on the state contract.
    fn issuance_data(&self, account: &Address, at: &Position) -> ReadResult<IssuanceData>;

    /// Debt ledger entry at an index. Reverts around reorg boundaries when
    /// the ledger has not grown on the surviving fork; callers tolerate it.
    fn debt_ledger(&self, index: u64, at: &Position) -> ReadResult<u128>;

    /// Balance held for an account by the reward escrow contract.
    fn escrowed_balance(&self, account: &Address, at: &Position) -> ReadResult<u128>;

    /// Total amount already vested for an account by the reward escrow.
    fn vested_balance(&self, account: &Address, at: &Position) -> ReadResult<u128>;

    /// Current order fields for a maker on the trading venue.
    fn order(&self, venue: &Address, maker: &Address, at: &Position) -> ReadResult<OrderState>;

    /// Current deal fields by deal id on the trading venue.
    fn deal(&self, venue: &Address, deal_id: u64, at: &Position) -> ReadResult<DealState>;

    /// Collateral backing a deal on the trading venue.
    fn deal_collateral(
        &self,
        venue: &Address,
        deal_id: u64,
        at: &Position,
    ) -> ReadResult<DealCollateral>;
}
