//! Event handler trait and the per-listener dispatch table

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::event::{Event, EventType};

/// Something that reacts to events delivered by a listener
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<()>;
}

/// Default handler for types nobody registered for
pub struct NoopHandler;

#[async_trait]
impl EventHandler for NoopHandler {
    async fn handle(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Handler built from a plain function, used by the static plugin registry.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<()> {
        (self.0)(event)
    }
}

/// Routes each event type to a handler, with a fallback for the rest
#[derive(Clone)]
pub struct HandlerTable {
    by_type: HashMap<EventType, Arc<dyn EventHandler>>,
    fallback: Arc<dyn EventHandler>,
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            fallback: Arc::new(NoopHandler),
        }
    }

    pub fn on(mut self, kind: EventType, handler: Arc<dyn EventHandler>) -> Self {
        self.by_type.insert(kind, handler);
        self
    }

    pub fn on_all(mut self, kinds: &[EventType], handler: Arc<dyn EventHandler>) -> Self {
        for kind in kinds {
            self.by_type.insert(*kind, Arc::clone(&handler));
        }
        self
    }

    pub fn fallback(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.fallback = handler;
        self
    }

    pub fn handler_for(&self, kind: EventType) -> &Arc<dyn EventHandler> {
        self.by_type.get(&kind).unwrap_or(&self.fallback)
    }

    pub fn handles(&self, kind: EventType) -> bool {
        self.by_type.contains_key(&kind)
    }
}
