//! Cancellable lifecycle hooks for the write path.
//!
//! Hooks are plain callbacks registered per [`StoreEvent`]; there is no
//! expression evaluation. A before-hook may veto the pending SQL write by
//! cancelling its context; the matching after-hook still runs. Hooks can
//! rewrite the outgoing payload but cannot replace the in-flight entity,
//! which they only see read-only. Save-level hooks observe a snapshot of
//! the payload; the insert/update payload is re-derived from the entity.

use std::collections::HashMap;
use std::fmt;

use geodata_core::Record;

use crate::driver::Row;

/// Lifecycle events emitted around insert, update, and save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    /// Before the insert statement runs. May veto.
    BeforeInsert,
    /// After the insert lifecycle, vetoed or not.
    AfterInsert,
    /// Before the update statement runs. May veto.
    BeforeUpdate,
    /// After the update lifecycle, vetoed or not.
    AfterUpdate,
    /// Before save dispatches to insert or update. May veto.
    BeforeSave,
    /// After save dispatched (or was vetoed).
    AfterSave,
}

/// What a hook gets to see and touch.
pub struct HookContext<'a> {
    payload: &'a mut Row,
    record: &'a Record,
    cancelled: bool,
}

impl<'a> HookContext<'a> {
    fn new(payload: &'a mut Row, record: &'a Record) -> Self {
        Self {
            payload,
            record,
            cancelled: false,
        }
    }

    /// The outgoing write payload.
    pub fn payload(&self) -> &Row {
        self.payload
    }

    /// Mutable access to the outgoing write payload.
    pub fn payload_mut(&mut self) -> &mut Row {
        self.payload
    }

    /// Read-only view of the in-flight entity.
    pub fn record(&self) -> &Record {
        self.record
    }

    /// Veto the pending operation. The SQL write is skipped; the after-hook
    /// still runs.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether a hook has vetoed the operation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

type Hook = Box<dyn Fn(&mut HookContext<'_>)>;

/// Registered callbacks keyed by lifecycle event.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<StoreEvent, Vec<Hook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event, hooks) in &self.hooks {
            map.entry(event, &hooks.len());
        }
        map.finish()
    }
}

impl HookRegistry {
    /// Register a callback for an event. Multiple callbacks run in
    /// registration order.
    pub fn on(&mut self, event: StoreEvent, hook: impl Fn(&mut HookContext<'_>) + 'static) {
        self.hooks.entry(event).or_default().push(Box::new(hook));
    }

    /// Run the callbacks for an event. Returns `false` when any hook vetoed.
    pub(crate) fn dispatch(&self, event: StoreEvent, payload: &mut Row, record: &Record) -> bool {
        let Some(hooks) = self.hooks.get(&event) else {
            return true;
        };
        let mut context = HookContext::new(payload, record);
        for hook in hooks {
            hook(&mut context);
        }
        !context.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn dispatch_without_hooks_allows() {
        let registry = HookRegistry::default();
        let mut payload = Row::new();
        let record = Record::new("id");
        assert!(registry.dispatch(StoreEvent::BeforeInsert, &mut payload, &record));
    }

    #[rstest]
    fn hooks_can_rewrite_the_payload() {
        let mut registry = HookRegistry::default();
        registry.on(StoreEvent::BeforeInsert, |ctx| {
            ctx.payload_mut().insert("audited".into(), json!(true));
        });
        let mut payload = Row::new();
        let record = Record::new("id");
        assert!(registry.dispatch(StoreEvent::BeforeInsert, &mut payload, &record));
        assert_eq!(payload["audited"], json!(true));
    }

    #[rstest]
    fn a_single_veto_cancels_the_operation() {
        let mut registry = HookRegistry::default();
        registry.on(StoreEvent::BeforeUpdate, |_ctx| {});
        registry.on(StoreEvent::BeforeUpdate, |ctx| ctx.cancel());
        let mut payload = Row::new();
        let record = Record::new("id");
        assert!(!registry.dispatch(StoreEvent::BeforeUpdate, &mut payload, &record));
    }
}
