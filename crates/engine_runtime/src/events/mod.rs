//! Typed event bus
//!
//! Key principles:
//! - Handlers register per event type (only interested handlers are notified)
//! - Delivery is synchronous, in subscription order
//! - A failing handler never starves the handlers registered after it
//! - Queuing support (immediate publish + deferred dispatch)
//!
//! Lifecycle events for worlds live in [`lifecycle`].

pub mod lifecycle;

pub use lifecycle::{WorldWasCreated, WorldWasDestroyed};

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Marker trait for values that can travel over the bus
pub trait Event: Any + Send + Sync {}

/// Error type handlers report failures with
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every handler
pub type HandlerResult = Result<(), HandlerError>;

type ErasedHandler = Arc<dyn Fn(&dyn Any) -> HandlerResult + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: ErasedHandler,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: HashMap<TypeId, Vec<Subscriber>>,
    queued: Vec<Box<dyn FnOnce(&EventBus) -> Delivery + Send>>,
}

/// A handler that did not complete successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Subscription id of the failing handler
    pub subscription: u64,
    /// Error message or panic payload
    pub message: String,
}

/// Outcome of a single publish
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that completed successfully
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failures: Vec<HandlerFailure>,
}

impl Delivery {
    /// Whether every handler completed successfully
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }
}

/// Synchronous typed publish/subscribe channel
///
/// Shared as `Arc<EventBus>`; the subscriber lock is never held while
/// handlers run, so handlers may publish or (un)subscribe re-entrantly.
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    /// Create an empty event bus
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
        }
    }

    /// Register a handler for events of type `E`
    ///
    /// The handler stays registered until the returned token is dropped or
    /// explicitly unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |event: &dyn Any| {
            event
                .downcast_ref::<E>()
                .map_or(Ok(()), |event| handler(event))
        });

        let type_id = TypeId::of::<E>();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .subscribers
            .entry(type_id)
            .or_default()
            .push(Subscriber { id, handler: erased });

        log::trace!("Subscription {} registered for {}", id, std::any::type_name::<E>());

        Subscription {
            bus: Arc::downgrade(&self.state),
            type_id,
            id,
            active: true,
        }
    }

    /// Deliver `event` to every current subscriber of its type
    pub fn publish<E: Event>(&self, event: &E) -> Delivery {
        let handlers: Vec<(u64, ErasedHandler)> = {
            let state = self.state.lock();
            state
                .subscribers
                .get(&TypeId::of::<E>())
                .map(|subscribers| {
                    subscribers
                        .iter()
                        .map(|s| (s.id, Arc::clone(&s.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut delivery = Delivery::default();
        for (id, handler) in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event as &dyn Any)));
            let message = match outcome {
                Ok(Ok(())) => {
                    delivery.delivered += 1;
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };

            log::error!(
                "Handler {} failed for {}: {}",
                id,
                std::any::type_name::<E>(),
                message
            );
            delivery.failures.push(HandlerFailure { subscription: id, message });
        }
        delivery
    }

    /// Queue `event` for the next [`EventBus::dispatch_queued`]
    pub fn enqueue<E: Event>(&self, event: E) {
        self.state
            .lock()
            .queued
            .push(Box::new(move |bus: &Self| bus.publish(&event)));
    }

    /// Publish every queued event in FIFO order
    ///
    /// Events enqueued by handlers during dispatch wait for the next call.
    pub fn dispatch_queued(&self) -> Delivery {
        let queued = std::mem::take(&mut self.state.lock().queued);
        let mut delivery = Delivery::default();
        for publish in queued {
            delivery.merge(publish(self));
        }
        delivery
    }

    /// Number of queued events
    pub fn queued_len(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Number of handlers registered for `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventBus")
            .field("event_types", &state.subscribers.len())
            .field("queued", &state.queued.len())
            .finish()
    }
}

/// Token returned by [`EventBus::subscribe`]
///
/// Dropping the token unsubscribes the handler.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<Mutex<BusState>>,
    type_id: TypeId,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Identifier of this subscription, as reported in [`HandlerFailure`]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the handler now
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let Some(state) = self.bus.upgrade() else {
            return;
        };
        // Handlers may own subscriptions themselves, so they are dropped
        // after the lock is released.
        let removed: Vec<Subscriber> = {
            let mut state = state.lock();
            let Some(subscribers) = state.subscribers.get_mut(&self.type_id) else {
                return;
            };
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(subscribers)
                .into_iter()
                .partition(|s| s.id == self.id);
            *subscribers = kept;
            if subscribers.is_empty() {
                state.subscribers.remove(&self.type_id);
            }
            removed
        };
        drop(removed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ButtonClicked {
        button_id: u32,
    }
    impl Event for ButtonClicked {}

    #[derive(Debug)]
    struct MouseMoved;
    impl Event for MouseMoved {}

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subscriptions: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                bus.subscribe(move |event: &ButtonClicked| {
                    order.lock().push((i, event.button_id));
                    Ok(())
                })
            })
            .collect();

        let delivery = bus.publish(&ButtonClicked { button_id: 42 });
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*order.lock(), vec![(0, 42), (1, 42), (2, 42)]);
        drop(subscriptions);
    }

    #[test]
    fn test_only_matching_type_is_notified() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = bus.subscribe(move |_: &MouseMoved| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&ButtonClicked { button_id: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.publish(&MouseMoved);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_handlers_do_not_starve_later_ones() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        let _err = bus.subscribe(|_: &ButtonClicked| Err("bad state".into()));
        let _panic = bus.subscribe(|_: &ButtonClicked| -> HandlerResult { panic!("boom") });
        let counter = Arc::clone(&reached);
        let _ok = bus.subscribe(move |_: &ButtonClicked| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivery = bus.publish(&ButtonClicked { button_id: 7 });
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.failures.len(), 2);
        assert_eq!(delivery.failures[0].message, "bad state");
        assert!(delivery.failures[1].message.contains("boom"));
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let sub = bus.subscribe(|_: &MouseMoved| Ok(()));
        let kept = bus.subscribe(|_: &MouseMoved| Ok(()));
        assert_eq!(bus.subscriber_count::<MouseMoved>(), 2);

        drop(sub);
        assert_eq!(bus.subscriber_count::<MouseMoved>(), 1);

        kept.unsubscribe();
        assert_eq!(bus.subscriber_count::<MouseMoved>(), 0);
        assert_eq!(bus.publish(&MouseMoved).delivered, 0);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.publish(&ButtonClicked { button_id: 1 });

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = bus.subscribe(move |_: &ButtonClicked| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handlers_may_subscribe_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let bus_handle = Arc::clone(&bus);
        let store = Arc::clone(&inner);
        let _outer = bus.subscribe(move |_: &ButtonClicked| {
            let sub = bus_handle.subscribe(|_: &MouseMoved| Ok(()));
            store.lock().push(sub);
            Ok(())
        });

        bus.publish(&ButtonClicked { button_id: 3 });
        assert_eq!(bus.subscriber_count::<MouseMoved>(), 1);
    }

    #[test]
    fn test_deferred_dispatch() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let _sub = bus.subscribe(move |event: &ButtonClicked| {
            store.lock().push(event.button_id);
            Ok(())
        });

        bus.enqueue(ButtonClicked { button_id: 1 });
        bus.enqueue(ButtonClicked { button_id: 2 });
        assert!(seen.lock().is_empty());
        assert_eq!(bus.queued_len(), 2);

        let delivery = bus.dispatch_queued();
        assert_eq!(delivery.delivered, 2);
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(bus.queued_len(), 0);
    }
}
