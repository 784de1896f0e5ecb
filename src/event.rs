use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backfill::{Backfill, BackfillTicket};
use crate::input::UiCommand;
use crate::model::tick::Tick;
use crate::stream::ConnectionState;

/// Everything the session loop reacts to, in delivery order.
#[derive(Debug, Clone)]
pub enum AppEvent {
    MarketTick(Tick),
    WsStatus(ConnectionState),
    WsDisconnected(String),
    WsError(String),
    HistoricalCandles {
        ticket: BackfillTicket,
        backfill: Backfill,
    },
    Command(UiCommand),
}

/// Handle returned by [`Subscribers::subscribe`]; pass it back to unsubscribe.
/// Unique across registries, so one owner can hold handles from several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(0);

type Callback<T> = Box<dyn FnMut(&T)>;

/// Ordered callback registry.
///
/// Callbacks run in registration order. A panicking callback is logged and
/// skipped; the remaining subscribers still receive the value.
pub struct Subscribers<T> {
    entries: Vec<(Subscription, Callback<T>)>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let id = Subscription(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Returns false when the handle was not registered here.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != subscription);
        self.entries.len() != before
    }

    /// Deliver `value` to every subscriber. Returns how many callbacks panicked.
    pub fn emit(&mut self, value: &T) -> usize {
        let mut failed = 0;
        for (id, callback) in self.entries.iter_mut() {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                failed += 1;
                tracing::error!(subscription = id.0, "Subscriber panicked, continuing delivery");
            }
        }
        failed
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut subs = Subscribers::<u32>::new();
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            subs.subscribe(move |v| seen.borrow_mut().push(format!("{tag}{v}")));
        }
        subs.emit(&7);
        assert_eq!(*seen.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut subs = Subscribers::<()>::new();
        let c = count.clone();
        let handle = subs.subscribe(move |_| *c.borrow_mut() += 1);
        subs.emit(&());
        assert!(subs.unsubscribe(handle));
        assert!(!subs.unsubscribe(handle));
        subs.emit(&());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let reached = Rc::new(RefCell::new(false));
        let mut subs = Subscribers::<u8>::new();
        subs.subscribe(|_| panic!("boom"));
        let r = reached.clone();
        subs.subscribe(move |_| *r.borrow_mut() = true);
        assert_eq!(subs.emit(&1), 1);
        assert!(*reached.borrow());
    }
}
