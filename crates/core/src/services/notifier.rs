use std::sync::{Arc, Mutex};

use crate::models::event::LedgerChange;

type Observer = Arc<dyn Fn(&LedgerChange) + Send + Sync>;

/// Explicit on-change notification list attached to each ledger.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: Mutex<Vec<Observer>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&LedgerChange) + Send + Sync + 'static,
    {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(observer));
    }

    /// Deliver `change` to every observer. Observers are invoked outside the
    /// list lock, so an observer may subscribe further observers.
    pub fn notify(&self, change: LedgerChange) {
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in observers {
            observer(&change);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
