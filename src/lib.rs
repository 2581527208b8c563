//! Derived aggregate metrics over a strictly ordered synthetic-asset exchange
//! event log.
//!
//! The engine consumes immutable events one at a time, resolves which
//! historical protocol variant governs each one, normalizes raw amounts into
//! the unit of account, and fans the event out into rolling aggregates and
//! participant lifecycle records persisted through a keyed entity store.

pub mod aggregate;
pub mod chain;
pub mod entity;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod numeric;
pub mod otc;
pub mod rates;
pub mod service;
pub mod store;
pub mod version;
