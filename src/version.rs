//! Resolution of which historically superseded protocol variant governs an
//! event, plus the calling-convention tables those variants used.
//!
//! Resolution is re-evaluated per event rather than cached: events within one
//! run routinely straddle an upgrade threshold.

use crate::chain::{Network, Position, UnitKey};

/// A historically distinct semantic/encoding ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variant {
    /// Pre-rebrand single-currency era.
    Havven,
    /// Multicurrency with 4-byte symbolic keys.
    KeyBytes4,
    /// 32-byte symbolic keys, older state-contract topology.
    KeyBytes32,
    /// Latest ruleset.
    Current,
}

impl Variant {
    /// Encode a unit symbol at the key width this variant expects.
    pub fn unit_key<'a>(&self, symbol: &'a str) -> UnitKey<'a> {
        match self {
            Variant::Havven | Variant::KeyBytes4 => UnitKey::Bytes4(symbol),
            Variant::KeyBytes32 | Variant::Current => UnitKey::Bytes32(symbol),
        }
    }

    /// Whether staking activity is tracked at all under this variant. The
    /// single-currency era had no debt ledger to read.
    pub fn tracks_staking(&self) -> bool {
        *self != Variant::Havven
    }

    /// Whether the extended holder sub-reads (transferable balance, daily
    /// issuance totals) exist under this variant.
    pub fn has_extended_reads(&self) -> bool {
        *self == Variant::Current
    }

    /// Whether the state contract answers issuance-data reads reliably. The
    /// 4-byte and single-currency eras get best-effort reads with zero
    /// defaults instead.
    pub fn has_issuance_state(&self) -> bool {
        matches!(self, Variant::KeyBytes32 | Variant::Current)
    }
}

/// Mainnet upgrade heights. Each entry activates its variant from that block
/// onward; resolution picks the greatest threshold at or below the position.
const MAINNET_THRESHOLDS: [(u64, Variant); 4] = [
    (0, Variant::Havven),
    (6_841_188, Variant::KeyBytes4),
    (8_622_911, Variant::KeyBytes32),
    (9_518_914, Variant::Current),
];

/// Per-network variant threshold table. Networks without recorded upgrade
/// history resolve to the latest variant for every position.
#[derive(Debug, Default, Clone)]
pub struct VersionTable;

impl VersionTable {
    pub fn new() -> Self {
        Self
    }

    /// Total over all networks and positions.
    pub fn resolve(&self, network: Network, position: &Position) -> Variant {
        let table: &[(u64, Variant)] = match network {
            Network::Mainnet => &MAINNET_THRESHOLDS,
            Network::Optimism | Network::Other => return Variant::Current,
        };

        let mut resolved = table[0].1;
        for (threshold, variant) in table {
            if *threshold <= position.block {
                resolved = *variant;
            }
        }
        resolved
    }
}

/// Known issue-call selectors across every historical calling convention.
const ISSUE_SELECTORS: [[u8; 4]; 10] = [
    [0xaf, 0x08, 0x6c, 0x7e], // issueMaxSynths()
    [0x32, 0x02, 0x23, 0xdb], // issueMaxSynthsOnBehalf(address)
    [0x8a, 0x29, 0x00, 0x14], // issueSynths(uint256)
    [0xe8, 0xe0, 0x9b, 0x8b], // issueSynthsOnBehalf(address,uint256)
    [0xef, 0x7f, 0xae, 0x7c], // issueMaxSynths(bytes32)
    [0x0e, 0xe5, 0x4a, 0x1d], // issueSynths(bytes32,uint256)
    [0x9f, 0xf8, 0xc6, 0x3f], // issueMaxSynths(bytes4)
    [0x49, 0x75, 0x5b, 0x9e], // issueSynths(bytes4,uint256)
    [0xda, 0x53, 0x41, 0xa8], // issueMaxNomins()
    [0x18, 0x7c, 0xba, 0x25], // issueNomins(uint256)
];

/// Known burn-call selectors across every historical calling convention.
const BURN_SELECTORS: [[u8; 4]; 7] = [
    [0x29, 0x5d, 0xa8, 0x7d], // burnSynths(uint256)
    [0xc2, 0xbf, 0x38, 0x80], // burnSynthsOnBehalf(address,uint256)
    [0x97, 0x41, 0xfb, 0x22], // burnSynthsToTarget()
    [0x2c, 0x95, 0x5f, 0xa7], // burnSynthsToTargetOnBehalf(address)
    [0xea, 0x16, 0x8b, 0x62], // burnSynths(bytes32,uint256)
    [0xaf, 0x02, 0x33, 0x35], // burnSynths(bytes4,uint256)
    [0x32, 0x53, 0xcc, 0xdf], // burnNomins(uint256)
];

pub fn is_known_issue_call(selector: [u8; 4]) -> bool {
    ISSUE_SELECTORS.contains(&selector)
}

pub fn is_known_burn_call(selector: [u8; 4]) -> bool {
    BURN_SELECTORS.contains(&selector)
}
