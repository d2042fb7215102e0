//! Emission manager: the event worker pool.
//!
//! `emit` appends a dispatch record to the subscription's own FIFO and
//! schedules the subscription on the manager's work queue at most once; a
//! worker drains one subscription at a time, which preserves emit order per
//! handle without ordering anything across handles. Destroy-requested
//! subscriptions ride the deletable queue until no in-flight dispatch
//! references them, then become reclaimable.

use super::{DispatchRecord, EventNotification, STATE_RECLAIMABLE, Subscription};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

struct EmissionState {
    ready: VecDeque<Arc<Subscription>>,
    deletable: VecDeque<Arc<Subscription>>,
    /// Subscriptions currently being drained or retired by a worker.
    active: u32,
}

struct EmissionShared {
    state: Mutex<EmissionState>,
    work_cond: Condvar,
    idle_cond: Condvar,
    running: AtomicBool,
}

enum Task {
    Dispatch(Arc<Subscription>),
    Retire(Arc<Subscription>),
    Exit,
}

/// Worker pool delivering event callbacks off the mutator threads.
pub(crate) struct EmissionManager {
    shared: Arc<EmissionShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EmissionManager {
    /// Spawn `threads` dispatch workers (at least one).
    pub fn new(threads: u32) -> Self {
        let shared = Arc::new(EmissionShared {
            state: Mutex::new(EmissionState {
                ready: VecDeque::new(),
                deletable: VecDeque::new(),
                active: 0,
            }),
            work_cond: Condvar::new(),
            idle_cond: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let workers = (0..threads.max(1))
            .map(|index| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("semgraph-dispatch-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn dispatch worker")
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue one dispatch record for a subscription.
    pub fn push(&self, sub: &Arc<Subscription>, record: DispatchRecord) {
        sub.pending.lock().push_back(record);
        if !sub.scheduled.swap(true, Ordering::AcqRel) {
            let mut state = self.shared.state.lock();
            state.ready.push_back(sub.clone());
            self.shared.work_cond.notify_one();
        }
    }

    /// Enqueue a destroy-requested subscription for reclamation.
    pub fn push_deletable(&self, sub: Arc<Subscription>) {
        let mut state = self.shared.state.lock();
        state.deletable.push_back(sub);
        self.shared.work_cond.notify_one();
    }

    /// Block until every queued dispatch has been delivered and the workers
    /// are idle. Returns immediately once the manager is stopped.
    pub fn drain(&self) {
        let mut state = self.shared.state.lock();
        while self.shared.running.load(Ordering::Acquire)
            && (state.active != 0 || !state.ready.is_empty() || !state.deletable.is_empty())
        {
            self.shared.idle_cond.wait(&mut state);
        }
    }

    /// Stop the pool: workers finish the remaining queue, then exit and are
    /// joined. Idempotent.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.work_cond.notify_all();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.shared.idle_cond.notify_all();
    }
}

impl Drop for EmissionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: &EmissionShared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(sub) = state.deletable.pop_front() {
                    state.active += 1;
                    break Task::Retire(sub);
                }
                if let Some(sub) = state.ready.pop_front() {
                    state.active += 1;
                    break Task::Dispatch(sub);
                }
                if !shared.running.load(Ordering::Acquire) {
                    break Task::Exit;
                }
                shared.work_cond.wait(&mut state);
            }
        };

        match task {
            Task::Exit => return,
            Task::Retire(sub) => {
                retire(&sub);
                finish_task(shared);
            }
            Task::Dispatch(sub) => {
                drain_subscription(&sub);
                finish_task(shared);
            }
        }
    }
}

fn finish_task(shared: &EmissionShared) {
    let mut state = shared.state.lock();
    state.active -= 1;
    if state.active == 0 && state.ready.is_empty() && state.deletable.is_empty() {
        shared.idle_cond.notify_all();
    }
}

/// Deliver a subscription's pending records in order. The `scheduled` flag
/// guarantees a single drainer, so callbacks of one handle never run
/// concurrently and never out of order.
///
/// Records are delivered even when destruction has been requested in the
/// meantime: matching against live subscriptions happens at emit time, and
/// everything queued before the destruction must still reach the callback.
fn drain_subscription(sub: &Arc<Subscription>) {
    loop {
        let record = sub.pending.lock().pop_front();
        match record {
            Some(record) => {
                let notification = EventNotification {
                    element: sub.element,
                    kind: sub.kind,
                    connector: record.connector,
                    other: record.other,
                };
                (sub.callback)(&notification);
            }
            None => {
                sub.scheduled.store(false, Ordering::Release);
                if sub.pending.lock().is_empty() {
                    return;
                }
                // An emitter raced the unschedule; whoever wins the swap
                // keeps draining.
                if sub.scheduled.swap(true, Ordering::AcqRel) {
                    return;
                }
            }
        }
    }
}

/// Mark a destroy-requested subscription reclaimable. Records it still has
/// queued remain scheduled and are delivered by the normal drain; the final
/// reference drop retires the subscription for good.
fn retire(sub: &Arc<Subscription>) {
    sub.advance_state(STATE_RECLAIMABLE);
}

#[cfg(test)]
mod tests {
    use super::super::{EventKind, STATE_DESTROY_REQUESTED, Subscription};
    use super::*;
    use semgraph::addr::Addr;
    use std::sync::atomic::AtomicUsize;

    fn counting_subscription(
        counter: Arc<AtomicUsize>,
    ) -> Arc<Subscription> {
        Subscription::new(
            Addr::new(1, 1),
            EventKind::AddOutputArc,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        )
    }

    #[test]
    fn delivers_every_record() {
        let manager = EmissionManager::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = counting_subscription(counter.clone());

        for _ in 0..100 {
            manager.push(
                &sub,
                DispatchRecord {
                    connector: Addr::new(1, 2),
                    other: Addr::new(1, 3),
                },
            );
        }
        manager.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        manager.stop();
    }

    #[test]
    fn preserves_order_per_subscription() {
        let manager = EmissionManager::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let sub = Subscription::new(
            Addr::new(1, 1),
            EventKind::AddOutputArc,
            Box::new(move |notification| {
                seen2.lock().push(notification.connector.off);
            }),
            None,
        );

        for off in 0..500 {
            manager.push(
                &sub,
                DispatchRecord {
                    connector: Addr::new(1, off),
                    other: Addr::EMPTY,
                },
            );
        }
        manager.drain();
        let seen = seen.lock();
        assert_eq!(seen.len(), 500);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        manager.stop();
    }

    #[test]
    fn queued_records_survive_destruction() {
        let manager = EmissionManager::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = counting_subscription(counter.clone());

        // A record queued before the destroy request is still delivered;
        // the subscription ends up reclaimable afterwards.
        manager.push(
            &sub,
            DispatchRecord {
                connector: Addr::EMPTY,
                other: Addr::EMPTY,
            },
        );
        sub.advance_state(STATE_DESTROY_REQUESTED);
        manager.push_deletable(sub.clone());
        manager.drain();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(sub.state.load(Ordering::SeqCst), STATE_RECLAIMABLE);
        manager.stop();
    }

    #[test]
    fn stop_finishes_remaining_work() {
        let manager = EmissionManager::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = counting_subscription(counter.clone());
        for _ in 0..10 {
            manager.push(
                &sub,
                DispatchRecord {
                    connector: Addr::EMPTY,
                    other: Addr::EMPTY,
                },
            );
        }
        manager.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        // Idempotent.
        manager.stop();
    }
}
