//! Listener registry and change fan-out
//!
//! Registration is append-only. Fan-out runs on the frame delivery task;
//! listeners are snapshotted before they are called so a listener may
//! register further listeners without deadlocking.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::protocol::{Parameter, Value};

/// Callback for a decoded parameter change
pub type Listener = Arc<dyn Fn(Parameter, Value) + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    global: RwLock<Vec<Listener>>,
    per_param: RwLock<HashMap<Parameter, Vec<Listener>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called for every change
    pub fn add_global_listener(&self, listener: Listener) {
        self.global.write().push(listener);
    }

    /// Register a listener called only for changes of `param`
    pub fn add_param_listener(&self, param: Parameter, listener: Listener) {
        self.per_param.write().entry(param).or_default().push(listener);
    }

    /// Call global listeners, then listeners for exactly `param`, each in
    /// registration order. Returns the number of listeners invoked.
    ///
    /// Panics raised by a listener are not caught.
    pub fn dispatch(&self, param: Parameter, value: Value) -> usize {
        let global = self.global.read().clone();
        let specific = self
            .per_param
            .read()
            .get(&param)
            .cloned()
            .unwrap_or_default();

        for listener in global.iter().chain(specific.iter()) {
            listener(param, value);
        }

        let count = global.len() + specific.len();
        trace!("Dispatched {}={} to {} listeners", param, value, count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Listener {
        let log = log.clone();
        let tag = tag.to_string();
        Arc::new(move |param: Parameter, value: Value| {
            log.lock().push(format!("{} {} {}", tag, param, value))
        })
    }

    #[test]
    fn test_global_before_param_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let param = Parameter::new(51, 0, 3);

        dispatcher.add_param_listener(param, recorder(&log, "p1"));
        dispatcher.add_global_listener(recorder(&log, "g1"));
        dispatcher.add_param_listener(param, recorder(&log, "p2"));
        dispatcher.add_global_listener(recorder(&log, "g2"));
        dispatcher.add_global_listener(recorder(&log, "g3"));

        assert_eq!(dispatcher.dispatch(param, 9), 5);
        assert_eq!(
            *log.lock(),
            vec!["g1 51:0:3 9", "g2 51:0:3 9", "g3 51:0:3 9", "p1 51:0:3 9", "p2 51:0:3 9"]
        );
    }

    #[test]
    fn test_param_listener_exact_match_only() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.add_param_listener(Parameter::new(51, 0, 3), recorder(&log, "p"));

        assert_eq!(dispatcher.dispatch(Parameter::new(51, 0, 4), 1), 0);
        assert_eq!(dispatcher.dispatch(Parameter::new(51, 1, 3), 1), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_no_listeners_is_noop() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.dispatch(Parameter::new(0, 0, 0), 0), 0);
    }

    #[test]
    fn test_listener_may_register_listener() {
        let dispatcher = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner = dispatcher.clone();
        let inner_log = log.clone();
        dispatcher.add_global_listener(Arc::new(move |_: Parameter, _: Value| {
            inner.add_global_listener(recorder(&inner_log, "late"));
        }));

        assert_eq!(dispatcher.dispatch(Parameter::new(1, 1, 1), 1), 1);
        assert_eq!(dispatcher.dispatch(Parameter::new(1, 1, 1), 2), 2);
        assert_eq!(*log.lock(), vec!["late 1:1:1 2"]);
    }
}
