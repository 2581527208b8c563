//! Derived entity records persisted through the entity store.
//!
//! Every identity is a deterministic composite string built from domain
//! fields; no identity is ever reused for two semantically distinct records.
//! Values are minicbor-encoded for storage, with decimal fields carried as the
//! 16-byte serialized form of [`rust_decimal::Decimal`].

use crate::chain::Address;
use rust_decimal::Decimal;

/// A record the entity store can load, save and delete by `(KIND, id)`.
pub trait Entity: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// minicbor with-module for `Decimal` fields.
pub mod dec {
    use rust_decimal::Decimal;

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        v: &Decimal,
        e: &mut minicbor::Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&v.serialize())?.ok()
    }

    pub fn decode<'b, Ctx>(
        d: &mut minicbor::Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<Decimal, minicbor::decode::Error> {
        let raw: [u8; 16] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("decimal field is not 16 bytes"))?;
        Ok(Decimal::deserialize(raw))
    }
}

/// Rolling aggregate over one `(scope, period, magnitude, bucket start)` cell.
/// Counters and sums are strictly additive for a fixed identity.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct TotalBucket {
    #[n(0)]
    pub id: String,
    /// Bucket start timestamp; the all-time bucket uses the zero sentinel.
    #[n(1)]
    pub timestamp: i64,
    /// Bucket width in seconds; zero means no time bucketing.
    #[n(2)]
    pub period: i64,
    #[n(3)]
    pub magnitude: u32,
    /// Sub-scope unit symbol, absent for the global scope.
    #[n(4)]
    pub scope: Option<String>,
    #[n(5)]
    pub trades: u64,
    /// Distinct participants seen in this bucket.
    #[n(6)]
    pub exchangers: u64,
    /// Participants whose first-ever activity landed in this bucket's event.
    #[n(7)]
    pub new_exchangers: u64,
    #[cbor(n(8), with = "dec")]
    pub volume_usd: Decimal,
    #[cbor(n(9), with = "dec")]
    pub fees_usd: Decimal,
}

impl TotalBucket {
    /// Composite identity: `{bucket start}-{magnitude}-{scope}-{period}`.
    pub fn compose_id(timestamp: i64, magnitude: u32, scope: Option<&str>, period: i64) -> String {
        format!("{timestamp}-{magnitude}-{}-{period}", scope.unwrap_or("global"))
    }

    pub fn new(timestamp: i64, magnitude: u32, scope: Option<&str>, period: i64) -> Self {
        Self {
            id: Self::compose_id(timestamp, magnitude, scope, period),
            timestamp,
            period,
            magnitude,
            scope: scope.map(str::to_owned),
            trades: 0,
            exchangers: 0,
            new_exchangers: 0,
            volume_usd: Decimal::ZERO,
            fees_usd: Decimal::ZERO,
        }
    }
}

impl Entity for TotalBucket {
    const KIND: &'static str = "total";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Participant record. The global record is keyed by account alone and must
/// exist before or together with any bucket-scoped record for that account.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Exchanger {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub first_seen: i64,
    #[n(2)]
    pub last_seen: i64,
    #[n(3)]
    pub trades: u64,
    #[cbor(n(4), with = "dec")]
    pub volume_usd: Decimal,
    #[cbor(n(5), with = "dec")]
    pub fees_usd: Decimal,
}

impl Exchanger {
    pub fn global_id(account: &Address) -> String {
        account.to_hex()
    }

    pub fn bucket_id(account: &Address, bucket: &str) -> String {
        format!("{}-{bucket}", account.to_hex())
    }

    pub fn new(id: String, seen_at: i64) -> Self {
        Self {
            id,
            first_seen: seen_at,
            last_seen: seen_at,
            trades: 0,
            volume_usd: Decimal::ZERO,
            fees_usd: Decimal::ZERO,
        }
    }
}

impl Entity for Exchanger {
    const KIND: &'static str = "exchanger";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Immutable per-event projection of one exchange.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct ExchangeRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub account: Address,
    #[n(2)]
    pub from_unit: String,
    #[n(3)]
    pub to_unit: String,
    #[cbor(n(4), with = "dec")]
    pub from_amount: Decimal,
    #[cbor(n(5), with = "dec")]
    pub from_amount_usd: Decimal,
    #[cbor(n(6), with = "dec")]
    pub to_amount: Decimal,
    #[cbor(n(7), with = "dec")]
    pub to_amount_usd: Decimal,
    #[cbor(n(8), with = "dec")]
    pub fees_usd: Decimal,
    #[n(9)]
    pub to_address: Address,
    #[n(10)]
    pub timestamp: i64,
    #[n(11)]
    pub block: u64,
}

impl Entity for ExchangeRecord {
    const KIND: &'static str = "exchange";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Settlement adjustment projection. Reclaims and rebates are distinct events
/// in the source stream, never negative re-applications of an exchange.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct SettlementRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub account: Address,
    #[n(2)]
    pub unit: String,
    #[cbor(n(3), with = "dec")]
    pub amount: Decimal,
    #[cbor(n(4), with = "dec")]
    pub amount_usd: Decimal,
    /// True for a reclaim, false for a rebate.
    #[n(5)]
    pub reclaim: bool,
    #[n(6)]
    pub timestamp: i64,
    #[n(7)]
    pub block: u64,
}

impl Entity for SettlementRecord {
    const KIND: &'static str = "settlement";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Per-unit exchange fee rate, fully overwritten on each update event.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct FeeRate {
    #[n(0)]
    pub id: String,
    #[cbor(n(1), with = "dec")]
    pub rate: Decimal,
}

impl Entity for FeeRate {
    const KIND: &'static str = "fee_rate";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Latest known exchange rate for a unit, maintained by the rate cache.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct LatestRate {
    #[n(0)]
    pub id: String,
    #[cbor(n(1), with = "dec")]
    pub rate: Decimal,
}

impl Entity for LatestRate {
    const KIND: &'static str = "latest_rate";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration of a unit known to be pegged to the unit of account.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct StableUnit {
    #[n(0)]
    pub id: String,
}

impl Entity for StableUnit {
    const KIND: &'static str = "stable_unit";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration of the reference-rate source discovered for a unit.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct RateSource {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub source: Address,
}

impl Entity for RateSource {
    const KIND: &'static str = "rate_source";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Existence record for an account that has ever issued.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Issuer {
    #[n(0)]
    pub id: String,
}

impl Entity for Issuer {
    const KIND: &'static str = "issuer";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Singleton counters read and written across unrelated handlers. Owned by
/// the store rather than ambient globals.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Metadata {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub issuers: u64,
    #[n(2)]
    pub holders: u64,
}

impl Metadata {
    pub const ID: &'static str = "1";

    pub fn new() -> Self {
        Self { id: Self::ID.to_owned(), issuers: 0, holders: 0 }
    }
}

impl Entity for Metadata {
    const KIND: &'static str = "metadata";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Per-account balance projection; the 0 <-> nonzero balance crossing drives
/// the holders counter.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Holder {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub block: u64,
    #[n(2)]
    pub timestamp: i64,
    #[cbor(n(3), with = "dec")]
    pub balance: Decimal,
    #[cbor(n(4), with = "dec")]
    pub collateral: Decimal,
    /// Zero while the transferable read reverts (stale rates).
    #[cbor(n(5), with = "dec")]
    pub transferable: Decimal,
    #[n(6)]
    pub mints: u64,
    #[n(7)]
    pub claims: u64,
    /// Zero under the eras whose state contract had no issuance bookkeeping.
    #[cbor(n(8), with = "dec")]
    pub initial_debt_ownership: Decimal,
    #[cbor(n(9), with = "dec")]
    pub debt_entry_at_index: Decimal,
}

impl Holder {
    pub fn new(id: String) -> Self {
        Self {
            id,
            block: 0,
            timestamp: 0,
            balance: Decimal::ZERO,
            collateral: Decimal::ZERO,
            transferable: Decimal::ZERO,
            mints: 0,
            claims: 0,
            initial_debt_ownership: Decimal::ZERO,
            debt_entry_at_index: Decimal::ZERO,
        }
    }
}

impl Entity for Holder {
    const KIND: &'static str = "holder";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Point-in-time debt position of the transaction sender, written once per
/// recognized issue or burn event.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct DebtSnapshot {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub account: Address,
    #[cbor(n(2), with = "dec")]
    pub balance: Decimal,
    #[cbor(n(3), with = "dec")]
    pub collateral: Decimal,
    #[cbor(n(4), with = "dec")]
    pub debt: Decimal,
    /// Zero under the eras whose state contract had no issuance bookkeeping.
    #[cbor(n(5), with = "dec")]
    pub initial_debt_ownership: Decimal,
    /// Zero while the ledger-entry read reverts around a reorg boundary.
    #[cbor(n(6), with = "dec")]
    pub debt_entry_at_index: Decimal,
    #[n(7)]
    pub timestamp: i64,
    #[n(8)]
    pub block: u64,
}

impl DebtSnapshot {
    pub fn new(id: String, account: Address, timestamp: i64, block: u64) -> Self {
        Self {
            id,
            account,
            balance: Decimal::ZERO,
            collateral: Decimal::ZERO,
            debt: Decimal::ZERO,
            initial_debt_ownership: Decimal::ZERO,
            debt_entry_at_index: Decimal::ZERO,
            timestamp,
            block,
        }
    }
}

impl Entity for DebtSnapshot {
    const KIND: &'static str = "debt_snapshot";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Escrowed-reward position of an account, fully overwritten from the escrow
/// contract on every vest event.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct RewardEscrowHolder {
    #[n(0)]
    pub id: String,
    #[cbor(n(1), with = "dec")]
    pub balance: Decimal,
    #[cbor(n(2), with = "dec")]
    pub vested_balance: Decimal,
}

impl Entity for RewardEscrowHolder {
    const KIND: &'static str = "reward_escrow_holder";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Immutable per-event projection of an issue or burn.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct IssuanceRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub account: Address,
    #[cbor(n(2), with = "dec")]
    pub value: Decimal,
    #[n(3)]
    pub source_unit: String,
    #[n(4)]
    pub burned: bool,
    #[n(5)]
    pub timestamp: i64,
    #[n(6)]
    pub block: u64,
}

impl Entity for IssuanceRecord {
    const KIND: &'static str = "issuance";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Immutable per-event projection of a fee claim, value normalized into the
/// unit of account under the resolved variant.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct FeesClaimedRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub account: Address,
    #[cbor(n(2), with = "dec")]
    pub value: Decimal,
    #[cbor(n(3), with = "dec")]
    pub rewards: Decimal,
    #[n(4)]
    pub timestamp: i64,
    #[n(5)]
    pub block: u64,
}

impl Entity for FeesClaimedRecord {
    const KIND: &'static str = "fees_claimed";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Existence record marking an account as a currently active staker. The
/// "active" flag is never stored as a boolean; presence of this record is
/// diffed against freshly read eligibility.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct ActiveStaker {
    #[n(0)]
    pub id: String,
}

impl Entity for ActiveStaker {
    const KIND: &'static str = "active_staker";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Global count of accounts currently in the active state.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct TotalActiveStakers {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub count: u64,
}

impl TotalActiveStakers {
    pub const ID: &'static str = "1";

    pub fn new() -> Self {
        Self { id: Self::ID.to_owned(), count: 0 }
    }
}

impl Entity for TotalActiveStakers {
    const KIND: &'static str = "total_active_stakers";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Snapshot of the active-staker count, written at most once per calendar day
/// the first time that day is observed.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct DailyActiveStakers {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub timestamp: i64,
    #[n(2)]
    pub count: u64,
}

impl Entity for DailyActiveStakers {
    const KIND: &'static str = "daily_active_stakers";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Per-day issued/burned totals together with the system debt at last write.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct DailyIssuance {
    #[n(0)]
    pub id: String,
    #[cbor(n(1), with = "dec")]
    pub issued: Decimal,
    #[cbor(n(2), with = "dec")]
    pub burned: Decimal,
    #[cbor(n(3), with = "dec")]
    pub total_debt: Decimal,
}

impl DailyIssuance {
    pub fn new(id: String) -> Self {
        Self {
            id,
            issued: Decimal::ZERO,
            burned: Decimal::ZERO,
            total_debt: Decimal::ZERO,
        }
    }
}

impl Entity for DailyIssuance {
    const KIND: &'static str = "daily_issuance";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Open-order projection with a two-state lifecycle: open until closed.
/// Fields always reflect the latest authoritative read, not a running
/// computation.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: u64,
    #[n(2)]
    pub maker: Address,
    #[n(3)]
    pub coin_code: String,
    #[n(4)]
    pub currency_code: String,
    #[cbor(n(5), with = "dec")]
    pub price: Decimal,
    #[cbor(n(6), with = "dec")]
    pub remaining: Decimal,
    #[cbor(n(7), with = "dec")]
    pub locked: Decimal,
    #[n(8)]
    pub closed: bool,
    #[n(9)]
    pub created_at: i64,
    #[n(10)]
    pub updated_at: i64,
    #[n(11)]
    pub block: u64,
}

impl Order {
    pub fn new(order_id: u64, maker: Address, created_at: i64) -> Self {
        Self {
            id: order_id.to_string(),
            order_id,
            maker,
            coin_code: String::new(),
            currency_code: String::new(),
            price: Decimal::ZERO,
            remaining: Decimal::ZERO,
            locked: Decimal::ZERO,
            closed: false,
            created_at,
            updated_at: created_at,
            block: 0,
        }
    }
}

impl Entity for Order {
    const KIND: &'static str = "order";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum DealPhase {
    #[n(0)]
    Confirming,
    #[n(1)]
    Cancelled,
    #[n(2)]
    Confirmed,
}

/// Pending-deal projection, fully overwritten from the authoritative read on
/// each relevant event.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Deal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub deal_id: u64,
    #[n(2)]
    pub order_id: u64,
    #[n(3)]
    pub coin_code: String,
    #[n(4)]
    pub currency_code: String,
    #[cbor(n(5), with = "dec")]
    pub price: Decimal,
    #[cbor(n(6), with = "dec")]
    pub amount: Decimal,
    #[cbor(n(7), with = "dec")]
    pub fee: Decimal,
    #[n(8)]
    pub maker: Address,
    #[n(9)]
    pub taker: Address,
    #[n(10)]
    pub phase: DealPhase,
    #[n(11)]
    pub created_at: i64,
    #[n(12)]
    pub updated_at: i64,
    #[n(13)]
    pub block: u64,
    #[n(14)]
    pub collateral_type: String,
    #[cbor(n(15), with = "dec")]
    pub locked: Decimal,
    #[cbor(n(16), with = "dec")]
    pub collateral: Decimal,
}

impl Deal {
    pub fn new(deal_id: u64, created_at: i64) -> Self {
        Self {
            id: deal_id.to_string(),
            deal_id,
            order_id: 0,
            coin_code: String::new(),
            currency_code: String::new(),
            price: Decimal::ZERO,
            amount: Decimal::ZERO,
            fee: Decimal::ZERO,
            maker: Address::ZERO,
            taker: Address::ZERO,
            phase: DealPhase::Confirming,
            created_at,
            updated_at: created_at,
            block: 0,
            collateral_type: String::new(),
            locked: Decimal::ZERO,
            collateral: Decimal::ZERO,
        }
    }
}

impl Entity for Deal {
    const KIND: &'static str = "deal";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Singleton totals for the over-the-counter venue.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct OtcTotals {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub users: u64,
    #[n(2)]
    pub orders: u64,
    #[cbor(n(3), with = "dec")]
    pub volume: Decimal,
    #[n(4)]
    pub deals_confirming: u64,
    #[n(5)]
    pub deals_cancelled: u64,
    #[n(6)]
    pub deals_confirmed: u64,
    #[n(7)]
    pub longest_deal_secs: i64,
    #[n(8)]
    pub shortest_deal_secs: i64,
    #[n(9)]
    pub block: u64,
    #[n(10)]
    pub timestamp: i64,
}

impl OtcTotals {
    pub const ID: &'static str = "OTC_TOTAL";

    pub fn new() -> Self {
        Self {
            id: Self::ID.to_owned(),
            users: 0,
            orders: 0,
            volume: Decimal::ZERO,
            deals_confirming: 0,
            deals_cancelled: 0,
            deals_confirmed: 0,
            longest_deal_secs: 0,
            shortest_deal_secs: 0,
            block: 0,
            timestamp: 0,
        }
    }
}

impl Entity for OtcTotals {
    const KIND: &'static str = "otc_totals";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Per-calendar-day rollup for the over-the-counter venue.
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct DailyOtc {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub timestamp: i64,
    #[n(2)]
    pub block: u64,
    #[cbor(n(3), with = "dec")]
    pub volume: Decimal,
    #[n(4)]
    pub profiles_opened: u64,
    #[n(5)]
    pub profiles_closed: u64,
    #[n(6)]
    pub orders_opened: u64,
    #[n(7)]
    pub orders_closed: u64,
    #[n(8)]
    pub deals_confirming: u64,
    #[n(9)]
    pub deals_cancelled: u64,
    #[n(10)]
    pub deals_confirmed: u64,
}

impl DailyOtc {
    pub fn new(id: String) -> Self {
        Self {
            id,
            timestamp: 0,
            block: 0,
            volume: Decimal::ZERO,
            profiles_opened: 0,
            profiles_closed: 0,
            orders_opened: 0,
            orders_closed: 0,
            deals_confirming: 0,
            deals_cancelled: 0,
            deals_confirmed: 0,
        }
    }
}

impl Entity for DailyOtc {
    const KIND: &'static str = "daily_otc";

    fn id(&self) -> &str {
        &self.id
    }
}
