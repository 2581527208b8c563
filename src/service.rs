//! Service layer: the engine side of the delivery collaborator's callback.
//!
//! Events are handed in one at a time in total order. Each event runs inside
//! its own store session and commits atomically; any per-event failure is
//! logged and the session is dropped uncommitted, so processing is
//! all-or-nothing per event. No in-process state survives between events,
//! which keeps a rollback-then-replay by the delivery collaborator equivalent
//! to never having processed past the rollback point.

use crate::chain::{EventContext, ProtocolReader};
use crate::error::EventError;
use crate::event::Event;
use crate::store::MetricsStore;
use crate::version::VersionTable;
use crate::{aggregate, lifecycle, otc};
use log::{error, warn};
use std::sync::Arc;

pub struct MetricsService<R: ProtocolReader> {
    store: MetricsStore,
    reader: R,
    versions: VersionTable,
}

impl<R: ProtocolReader> MetricsService<R> {
    pub fn new(instance: Arc<sled::Db>, reader: R) -> Self {
        Self {
            store: MetricsStore::new(instance),
            reader,
            versions: VersionTable::new(),
        }
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Process one delivered event to completion.
    ///
    /// Returns `Err` only for store-level failures; the per-event error
    /// taxonomy (unresolvable reference, unrecognized shape, missing
    /// prerequisite) is absorbed here after logging, because the delivery
    /// collaborator owns redelivery policy and none of those conditions
    /// benefit from a retry.
    pub fn handle_event(&self, ctx: &EventContext, event: &Event) -> anyhow::Result<()> {
        let variant = self.versions.resolve(ctx.network, &ctx.position);
        let mut session = self.store.session();

        let outcome = match event {
            Event::Exchange(e) => {
                aggregate::handle_exchange_event(&mut session, &self.reader, ctx, e)
            }
            Event::Issuance(e) => {
                lifecycle::handle_issuance_event(&mut session, &self.reader, ctx, variant, e)
            }
            Event::Otc(e) => otc::handle_otc_event(&mut session, &self.reader, ctx, e),
        };

        match outcome {
            Ok(()) => {
                session.commit()?;
                Ok(())
            }
            Err(EventError::Unresolvable(context)) => {
                error!(
                    "abandoning event at block {} log {}: {context}",
                    ctx.position.block, ctx.position.log_index
                );
                Ok(())
            }
            Err(EventError::UnrecognizedShape(context)) => {
                warn!("skipping event with unrecognized shape: {context}");
                Ok(())
            }
            Err(EventError::MissingPrerequisite { kind, id }) => {
                debug_assert!(false, "missing prerequisite entity {kind} with id {id}");
                error!(
                    "skipping event at block {} log {}: missing prerequisite {kind} {id}",
                    ctx.position.block, ctx.position.log_index
                );
                Ok(())
            }
            Err(EventError::Store(e)) => Err(e.into()),
        }
    }
}
