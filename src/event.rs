//! Decoded domain events as handed over by the delivery collaborator.
//!
//! Events are immutable and arrive exactly once in causal order; the engine
//! never constructs or re-requests them.

use crate::chain::Address;

#[derive(Debug, Clone)]
pub enum Event {
    Exchange(ExchangeEvent),
    Issuance(IssuanceEvent),
    Otc(OtcEvent),
}

/// Events emitted by the exchange contract. All raw amounts are scaled by
/// 18 digits.
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    SynthExchange {
        account: Address,
        from_unit: String,
        to_unit: String,
        from_amount: u128,
        to_amount: u128,
        to_address: Address,
    },
    ExchangeReclaim {
        account: Address,
        unit: String,
        amount: u128,
    },
    ExchangeRebate {
        account: Address,
        unit: String,
        amount: u128,
    },
    FeeRateUpdated {
        unit: String,
        rate: u128,
    },
}

/// Events emitted by the issuance and escrow contracts.
///
/// Issue and burn events carry no account: the position moved belongs to the
/// transaction sender, which arrives with the event context.
#[derive(Debug, Clone)]
pub enum IssuanceEvent {
    Issued {
        value: u128,
        /// Currency key of the synth contract the event came from.
        source_unit: String,
    },
    Burned {
        value: u128,
        source_unit: String,
    },
    FeesClaimed {
        account: Address,
        value: u128,
        rewards: u128,
    },
    /// Reward escrow vesting for a beneficiary.
    Vested {
        account: Address,
        value: u128,
    },
}

/// Events emitted by the over-the-counter trading contract.
#[derive(Debug, Clone)]
pub enum OtcEvent {
    RegisterProfile { who: Address },
    DestroyProfile { who: Address },
    OpenOrder { order_id: u64, maker: Address },
    UpdateOrder { order_id: u64, maker: Address },
    CloseOrder { order_id: u64 },
    UpdateDeal { deal_id: u64 },
}
