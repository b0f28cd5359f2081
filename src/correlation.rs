//! Pending request slots
//!
//! A slot pairs an outstanding request with the change notification that
//! eventually answers it. There is at most one slot per parameter, plus one
//! unkeyed "next touched parameter" slot. Concurrent requests for the same
//! key attach to the same slot and all observe the same result. A slot is
//! removed when it resolves; a waiter giving up (timeout) leaves it in place
//! so a late reply still reaches any other waiter.
//!
//! Once the table is closed every outstanding slot is dropped, its waiters
//! fail with [`Error::Closed`], and new requests are refused.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{Parameter, Value};

type Slot<T> = watch::Sender<Option<T>>;

/// Handle to a pending slot
#[derive(Debug)]
pub struct Pending<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Pending<T> {
    /// Wait until the slot resolves
    ///
    /// Fails with [`Error::Closed`] if the table is closed or dropped first.
    /// Callers bound the wait with `tokio::time::timeout`.
    pub async fn wait(mut self) -> Result<T> {
        let value = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Closed)?
            .clone();
        value.ok_or(Error::Closed)
    }
}

#[derive(Default)]
pub struct CorrelationTable {
    values: Mutex<HashMap<Parameter, Slot<Value>>>,
    next_touched: Mutex<Option<Slot<Parameter>>>,
    // Only flipped while holding both slot locks
    closed: AtomicBool,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or attach to the value slot for `param`
    pub fn request_value(&self, param: Parameter) -> Result<Pending<Value>> {
        let mut values = self.values.lock();
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let slot = values
            .entry(param)
            .or_insert_with(|| watch::channel(None).0);
        Ok(Pending {
            rx: slot.subscribe(),
        })
    }

    /// Create or attach to the "next touched parameter" slot
    pub fn await_next_touched(&self) -> Result<Pending<Parameter>> {
        let mut next_touched = self.next_touched.lock();
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let slot = next_touched.get_or_insert_with(|| watch::channel(None).0);
        Ok(Pending {
            rx: slot.subscribe(),
        })
    }

    /// Resolve and remove the value slot for `param`, if any
    pub fn resolve_value(&self, param: Parameter, value: Value) -> bool {
        let slot = self.values.lock().remove(&param);
        match slot {
            Some(slot) => {
                trace!(
                    "Resolved pending value {}={} ({} waiters)",
                    param,
                    value,
                    slot.receiver_count()
                );
                slot.send_replace(Some(value));
                true
            }
            None => false,
        }
    }

    /// Resolve and clear the "next touched" slot, if any
    pub fn resolve_touched(&self, param: Parameter) -> bool {
        let slot = self.next_touched.lock().take();
        match slot {
            Some(slot) => {
                slot.send_replace(Some(param));
                true
            }
            None => false,
        }
    }

    /// Drop every pending slot and refuse further requests
    pub fn close(&self) {
        let mut values = self.values.lock();
        let mut next_touched = self.next_touched.lock();
        self.closed.store(true, Ordering::Release);

        let dropped = values.len() + usize::from(next_touched.is_some());
        values.clear();
        next_touched.take();
        debug!("Correlation table closed ({} pending slots dropped)", dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of parameters with an unresolved value slot
    #[cfg(test)]
    pub(crate) fn pending_values(&self) -> usize {
        self.values.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, param: Parameter) -> bool {
        self.values.lock().contains_key(&param)
    }

    #[cfg(test)]
    pub(crate) fn touched_pending(&self) -> bool {
        self.next_touched.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const P: Parameter = Parameter::new(51, 0, 10);

    #[tokio::test]
    async fn test_resolve_wakes_every_waiter() {
        let table = CorrelationTable::new();
        let first = table.request_value(P).unwrap();
        let second = table.request_value(P).unwrap();
        assert_eq!(table.pending_values(), 1);

        assert!(table.resolve_value(P, 77));
        assert!(!table.is_pending(P));

        assert_eq!(first.wait().await.unwrap(), 77);
        assert_eq!(second.wait().await.unwrap(), 77);
    }

    #[tokio::test]
    async fn test_resolve_other_parameter_is_noop() {
        let table = CorrelationTable::new();
        let _pending = table.request_value(P).unwrap();
        assert!(!table.resolve_value(Parameter::new(51, 0, 11), 1));
        assert!(table.is_pending(P));
    }

    #[tokio::test]
    async fn test_new_request_after_resolution_gets_new_slot() {
        let table = CorrelationTable::new();
        let first = table.request_value(P).unwrap();
        table.resolve_value(P, 1);

        let second = table.request_value(P).unwrap();
        table.resolve_value(P, 2);

        assert_eq!(first.wait().await.unwrap(), 1);
        assert_eq!(second.wait().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_keeps_slot() {
        let table = CorrelationTable::new();
        let impatient = table.request_value(P).unwrap();
        let patient = table.request_value(P).unwrap();

        let res = tokio::time::timeout(Duration::from_millis(50), impatient.wait()).await;
        assert!(res.is_err());
        assert!(table.is_pending(P));

        assert!(table.resolve_value(P, -5));
        assert_eq!(patient.wait().await.unwrap(), -5);
    }

    #[tokio::test]
    async fn test_next_touched_shared_then_cleared() {
        let table = CorrelationTable::new();
        assert!(!table.resolve_touched(P));

        let first = table.await_next_touched().unwrap();
        let second = table.await_next_touched().unwrap();
        assert!(table.touched_pending());

        assert!(table.resolve_touched(P));
        assert!(!table.touched_pending());
        assert_eq!(first.wait().await.unwrap(), P);
        assert_eq!(second.wait().await.unwrap(), P);
    }

    #[tokio::test]
    async fn test_dropped_table_closes_waiters() {
        let table = CorrelationTable::new();
        let pending = table.request_value(P).unwrap();
        drop(table);
        assert!(matches!(pending.wait().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_close_fails_waiters_and_refuses_requests() {
        let table = CorrelationTable::new();
        let value = table.request_value(P).unwrap();
        let touched = table.await_next_touched().unwrap();

        table.close();
        assert!(table.is_closed());
        assert!(!table.is_pending(P));
        assert!(!table.touched_pending());

        assert!(matches!(value.wait().await, Err(Error::Closed)));
        assert!(matches!(touched.wait().await, Err(Error::Closed)));
        assert!(matches!(table.request_value(P), Err(Error::Closed)));
        assert!(matches!(table.await_next_touched(), Err(Error::Closed)));
    }
}
