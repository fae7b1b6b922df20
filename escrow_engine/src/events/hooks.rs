use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DisputeOpenedEvent,
    EscrowFundedEvent,
    EscrowRefundedEvent,
    EscrowReleasedEvent,
    EventHandler,
    EventProducer,
    Handler,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub escrow_funded_producer: Vec<EventProducer<EscrowFundedEvent>>,
    pub escrow_released_producer: Vec<EventProducer<EscrowReleasedEvent>>,
    pub escrow_refunded_producer: Vec<EventProducer<EscrowRefundedEvent>>,
    pub dispute_opened_producer: Vec<EventProducer<DisputeOpenedEvent>>,
}

impl EventProducers {
    pub async fn publish_escrow_funded(&self, event: EscrowFundedEvent) {
        for producer in &self.escrow_funded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_escrow_released(&self, event: EscrowReleasedEvent) {
        for producer in &self.escrow_released_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_escrow_refunded(&self, event: EscrowRefundedEvent) {
        for producer in &self.escrow_refunded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_dispute_opened(&self, event: DisputeOpenedEvent) {
        for producer in &self.dispute_opened_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_escrow_funded: Option<EventHandler<EscrowFundedEvent>>,
    pub on_escrow_released: Option<EventHandler<EscrowReleasedEvent>>,
    pub on_escrow_refunded: Option<EventHandler<EscrowRefundedEvent>>,
    pub on_dispute_opened: Option<EventHandler<DisputeOpenedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_escrow_funded: hooks.on_escrow_funded.map(|f| EventHandler::new(buffer_size, f)),
            on_escrow_released: hooks.on_escrow_released.map(|f| EventHandler::new(buffer_size, f)),
            on_escrow_refunded: hooks.on_escrow_refunded.map(|f| EventHandler::new(buffer_size, f)),
            on_dispute_opened: hooks.on_dispute_opened.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_escrow_funded {
            result.escrow_funded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_escrow_released {
            result.escrow_released_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_escrow_refunded {
            result.escrow_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_dispute_opened {
            result.dispute_opened_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per configured handler. Each task ends once all of its producers have been dropped.
    pub fn start_handlers(self) {
        if let Some(handler) = self.on_escrow_funded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_escrow_released {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_escrow_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_dispute_opened {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_escrow_funded: Option<Handler<EscrowFundedEvent>>,
    pub on_escrow_released: Option<Handler<EscrowReleasedEvent>>,
    pub on_escrow_refunded: Option<Handler<EscrowRefundedEvent>>,
    pub on_dispute_opened: Option<Handler<DisputeOpenedEvent>>,
}

impl EventHooks {
    pub fn on_escrow_funded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EscrowFundedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_escrow_funded = Some(Arc::new(f));
        self
    }

    pub fn on_escrow_released<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EscrowReleasedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_escrow_released = Some(Arc::new(f));
        self
    }

    pub fn on_escrow_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EscrowRefundedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_escrow_refunded = Some(Arc::new(f));
        self
    }

    pub fn on_dispute_opened<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DisputeOpenedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_dispute_opened = Some(Arc::new(f));
        self
    }
}
