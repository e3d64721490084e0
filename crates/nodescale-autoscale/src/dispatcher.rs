//! Per-group dispatch of reconciliation triggers.
//!
//! Each worker task owns a mailbox and the cooldown state of its group and
//! runs passes one at a time. Workers for different groups run
//! concurrently.
//!
//! A mailbox holds at most one pending pass per run of non-deletion
//! events: a trigger that arrives while a pass is already waiting replaces
//! that pass's snapshot and shares its outcome. The backlog of a slow group
//! therefore stays bounded and always acts on the newest snapshot.
//!
//! A `Deleted` event is never merged. It retires the group's worker once
//! the mailbox drains. If the group comes back, the new worker waits for
//! the retired one to finish before taking its first job, so passes for
//! one name never overlap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nodescale_core::{EventKind, NodeGroup};

use crate::cooldown::CooldownTracker;
use crate::reconciler::{ReconcileOutcome, Reconciler};

/// A queued reconciliation. Every caller merged into it gets the outcome.
struct Job {
    group: NodeGroup,
    event: EventKind,
    replies: Vec<oneshot::Sender<ReconcileOutcome>>,
}

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Single-consumer job queue for one worker.
#[derive(Default)]
struct Mailbox {
    queue: Mutex<Queue>,
    notify: Notify,
}

impl Mailbox {
    /// Queue a pass. Returns `true` if it was merged into a pending one.
    async fn push(
        &self,
        group: NodeGroup,
        event: EventKind,
        reply: oneshot::Sender<ReconcileOutcome>,
    ) -> bool {
        let mut queue = self.queue.lock().await;

        if event != EventKind::Deleted
            && let Some(pending) = queue.jobs.back_mut()
            && pending.event != EventKind::Deleted
        {
            pending.group = group;
            pending.event = event;
            pending.replies.push(reply);
            return true;
        }

        queue.jobs.push_back(Job {
            group,
            event,
            replies: vec![reply],
        });
        drop(queue);
        self.notify.notify_one();
        false
    }

    /// Let the worker exit once the queue is empty.
    async fn close(&self) {
        self.queue.lock().await.closed = true;
        self.notify.notify_one();
    }

    async fn next(&self) -> Option<Job> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(job) = queue.jobs.pop_front() {
                    return Some(job);
                }
                if queue.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    async fn len(&self) -> usize {
        self.queue.lock().await.jobs.len()
    }
}

/// A running per-group worker.
struct Worker {
    mailbox: Arc<Mailbox>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Workers {
    /// Live workers: group name → worker.
    active: HashMap<String, Worker>,
    /// Workers retired by a deletion that may still be draining.
    retiring: HashMap<String, JoinHandle<()>>,
}

impl Workers {
    async fn retire(&mut self, name: &str) {
        if let Some(worker) = self.active.remove(name) {
            worker.mailbox.close().await;
            self.retiring.insert(name.to_string(), worker.handle);
            debug!(node_group = %name, "reconcile worker retired");
        }
    }
}

/// Serializes reconciliation per node group.
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    workers: Mutex<Workers>,
}

impl Dispatcher {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            workers: Mutex::new(Workers::default()),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Queue a pass and return a receiver for its outcome.
    ///
    /// Dropping the receiver does not cancel the pass.
    pub async fn submit(
        &self,
        group: NodeGroup,
        event: EventKind,
    ) -> oneshot::Receiver<ReconcileOutcome> {
        let (reply, rx) = oneshot::channel();

        let Some(name) = group.identity().map(str::to_string) else {
            // Nothing to serialize on; the reconciler skips it immediately.
            self.run_detached(group, event, reply).await;
            return rx;
        };

        let mut guard = self.workers.lock().await;
        let workers = &mut *guard;
        workers.retiring.retain(|_, handle| !handle.is_finished());

        // A worker only stops early if it panicked; its queued replies are
        // dropped with it and those callers see `Abandoned`.
        if workers
            .active
            .get(&name)
            .is_some_and(|worker| worker.handle.is_finished())
        {
            warn!(node_group = %name, "reconcile worker stopped unexpectedly, restarting");
            workers.active.remove(&name);
        }

        if !workers.active.contains_key(&name) {
            // Passes that cannot touch cooldown or the sink need no worker:
            // a deletion of a group without one, or a group outside the
            // target filter.
            let selected = self.reconciler.config().current().selects(&name);
            if event == EventKind::Deleted || !selected {
                drop(guard);
                self.run_detached(group, event, reply).await;
                return rx;
            }

            let predecessor = workers.retiring.remove(&name);
            let worker = self.spawn_worker(&name, predecessor);
            workers.active.insert(name.clone(), worker);
        }

        if let Some(worker) = workers.active.get(&name)
            && worker.mailbox.push(group, event, reply).await
        {
            debug!(node_group = %name, %event, "merged into pending reconciliation");
        }

        if event == EventKind::Deleted {
            workers.retire(&name).await;
        }

        rx
    }

    /// Queue a pass and wait for its outcome.
    pub async fn reconcile(&self, group: NodeGroup, event: EventKind) -> ReconcileOutcome {
        self.submit(group, event)
            .await
            .await
            .unwrap_or(ReconcileOutcome::Abandoned)
    }

    /// Retire the workers of groups missing from `live`.
    ///
    /// Catches groups whose deletion was never delivered, or that a sweep
    /// re-submitted after their deletion.
    pub async fn retain_groups(&self, live: &HashSet<String>) {
        let mut guard = self.workers.lock().await;
        let workers = &mut *guard;
        let stale: Vec<String> = workers
            .active
            .keys()
            .filter(|name| !live.contains(*name))
            .cloned()
            .collect();
        for name in stale {
            workers.retire(&name).await;
        }
    }

    /// Names of groups with a live worker.
    pub async fn active_groups(&self) -> Vec<String> {
        let workers = self.workers.lock().await;
        let mut names: Vec<String> = workers.active.keys().cloned().collect();
        names.sort();
        names
    }

    /// Passes waiting for `group`'s worker, excluding one in progress.
    pub async fn pending(&self, group: &str) -> usize {
        let mailbox = {
            let workers = self.workers.lock().await;
            match workers.active.get(group) {
                Some(worker) => worker.mailbox.clone(),
                None => return 0,
            }
        };
        mailbox.len().await
    }

    /// Close every mailbox and wait for queued passes to finish.
    pub async fn shutdown(&self) {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        {
            let mut guard = self.workers.lock().await;
            let workers = &mut *guard;
            for (_, worker) in workers.active.drain() {
                worker.mailbox.close().await;
                handles.push(worker.handle);
            }
            handles.extend(workers.retiring.drain().map(|(_, handle)| handle));
        }
        for handle in handles {
            let _ = handle.await;
        }
        debug!("dispatcher stopped");
    }

    async fn run_detached(
        &self,
        group: NodeGroup,
        event: EventKind,
        reply: oneshot::Sender<ReconcileOutcome>,
    ) {
        let outcome = self
            .reconciler
            .reconcile(&mut CooldownTracker::new(), &group, event)
            .await;
        let _ = reply.send(outcome);
    }

    fn spawn_worker(&self, name: &str, predecessor: Option<JoinHandle<()>>) -> Worker {
        let mailbox = Arc::new(Mailbox::default());
        let reconciler = self.reconciler.clone();
        let name = name.to_string();
        debug!(node_group = %name, "starting reconcile worker");
        let handle = tokio::spawn(run_worker(name, reconciler, predecessor, mailbox.clone()));
        Worker { mailbox, handle }
    }
}

async fn run_worker(
    name: String,
    reconciler: Arc<Reconciler>,
    predecessor: Option<JoinHandle<()>>,
    mailbox: Arc<Mailbox>,
) {
    if let Some(previous) = predecessor {
        let _ = previous.await;
    }

    let mut cooldown = CooldownTracker::new();
    while let Some(job) = mailbox.next().await {
        let outcome = reconciler
            .reconcile(&mut cooldown, &job.group, job.event)
            .await;
        for reply in job.replies {
            let _ = reply.send(outcome.clone());
        }
    }

    debug!(node_group = %name, "reconcile worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::reconciler::SkipReason;
    use crate::testing::{HangingMetrics, RecordingSink, ScriptedMetrics};
    use nodescale_core::{AutoscalerConfig, ConfigHandle};
    use nodescale_metrics::MetricsSource;

    fn dispatcher_with(
        config: AutoscalerConfig,
        metrics: Arc<dyn MetricsSource>,
        sink: Arc<RecordingSink>,
    ) -> Dispatcher {
        let reconciler = Reconciler::new(ConfigHandle::new(config).unwrap(), metrics, sink)
            .with_clock(Arc::new(ManualClock::new(1_000_000)));
        Dispatcher::new(Arc::new(reconciler))
    }

    fn dispatcher(metrics: ScriptedMetrics, sink: Arc<RecordingSink>) -> Dispatcher {
        let config = AutoscalerConfig {
            cooldown_seconds: 180,
            ..Default::default()
        };
        dispatcher_with(config, Arc::new(metrics), sink)
    }

    async fn wait_for_started(sink: &RecordingSink, n: usize) {
        for _ in 0..200 {
            if sink.started() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("apply call never started");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_triggers_for_one_group_scale_once() {
        let sink = Arc::new(RecordingSink::gated("web-pool"));
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink.clone());
        let group = NodeGroup::new("web-pool", 3);

        // Timer tick and watch event: the second arrives while the first
        // pass is parked inside the apply call.
        let first = dispatcher.submit(group.clone(), EventKind::Modified).await;
        wait_for_started(&sink, 1).await;
        let second = dispatcher.submit(group.clone(), EventKind::Modified).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.started(), 1);

        sink.release();

        assert_eq!(first.await.unwrap(), ReconcileOutcome::Scaled { from: 3, to: 4 });
        assert!(matches!(
            second.await.unwrap(),
            ReconcileOutcome::Skipped(SkipReason::Cooldown { .. })
        ));
        assert_eq!(sink.applied(), vec![("web-pool".to_string(), 4)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn groups_do_not_block_each_other() {
        let sink = Arc::new(RecordingSink::gated("web-pool"));
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink.clone());

        let blocked = dispatcher
            .submit(NodeGroup::new("web-pool", 3), EventKind::Modified)
            .await;
        wait_for_started(&sink, 1).await;

        let outcome = dispatcher
            .reconcile(NodeGroup::new("batch-pool", 2), EventKind::Modified)
            .await;
        assert_eq!(outcome, ReconcileOutcome::Scaled { from: 2, to: 3 });

        sink.release();
        assert_eq!(blocked.await.unwrap(), ReconcileOutcome::Scaled { from: 3, to: 4 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn triggers_behind_a_running_pass_are_merged() {
        let metrics = Arc::new(ScriptedMetrics::utilization(95.0, 95.0));
        let sink = Arc::new(RecordingSink::gated("web-pool"));
        let config = AutoscalerConfig {
            cooldown_seconds: 0,
            ..Default::default()
        };
        let dispatcher = dispatcher_with(config, metrics.clone(), sink.clone());

        let running = dispatcher
            .submit(NodeGroup::new("web-pool", 3), EventKind::Modified)
            .await;
        wait_for_started(&sink, 1).await;

        let mut waiting = Vec::new();
        for size in 4..=53 {
            waiting.push(
                dispatcher
                    .submit(NodeGroup::new("web-pool", size.min(9)), EventKind::Modified)
                    .await,
            );
        }
        assert_eq!(dispatcher.pending("web-pool").await, 1);

        sink.release();
        assert_eq!(running.await.unwrap(), ReconcileOutcome::Scaled { from: 3, to: 4 });

        // One more pass, on the newest snapshot, answers every waiter.
        for rx in waiting {
            assert_eq!(rx.await.unwrap(), ReconcileOutcome::Scaled { from: 9, to: 10 });
        }
        assert_eq!(metrics.calls(), 2);
        assert_eq!(
            sink.applied(),
            vec![("web-pool".to_string(), 4), ("web-pool".to_string(), 10)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_group_backlog_stays_bounded() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher =
            dispatcher_with(AutoscalerConfig::default(), Arc::new(HangingMetrics), sink);

        // A metrics call times out after 10s; triggers arrive every 5s.

        let mut receivers = Vec::new();
        for _ in 0..120 {
            receivers.push(
                dispatcher
                    .submit(NodeGroup::new("web-pool", 3), EventKind::Modified)
                    .await,
            );
            assert!(dispatcher.pending("web-pool").await <= 1);
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        dispatcher.shutdown().await;
        for rx in receivers {
            assert_eq!(rx.await.unwrap(), ReconcileOutcome::MetricsFailed);
        }
    }

    #[tokio::test]
    async fn deletion_is_never_merged() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink.clone());
        let group = NodeGroup::new("web-pool", 3);

        let scaling = dispatcher.submit(group.clone(), EventKind::Modified).await;
        let deleted = dispatcher.submit(group.clone(), EventKind::Deleted).await;
        assert!(dispatcher.active_groups().await.is_empty());

        // The pending pass still runs, then the deletion.
        assert_eq!(scaling.await.unwrap(), ReconcileOutcome::Scaled { from: 3, to: 4 });
        assert_eq!(deleted.await.unwrap(), ReconcileOutcome::Skipped(SkipReason::Deleted));
        assert_eq!(sink.applied(), vec![("web-pool".to_string(), 4)]);
    }

    #[tokio::test]
    async fn deletion_retires_worker_and_resets_cooldown() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink.clone());
        let group = NodeGroup::new("web-pool", 3);

        let outcome = dispatcher.reconcile(group.clone(), EventKind::Created).await;
        assert_eq!(outcome, ReconcileOutcome::Scaled { from: 3, to: 4 });
        assert_eq!(dispatcher.active_groups().await, vec!["web-pool".to_string()]);

        let outcome = dispatcher.reconcile(group.clone(), EventKind::Deleted).await;
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::Deleted));
        assert!(dispatcher.active_groups().await.is_empty());

        // Re-created under the same name: no cooldown carried over.
        let outcome = dispatcher.reconcile(group, EventKind::Created).await;
        assert_eq!(outcome, ReconcileOutcome::Scaled { from: 3, to: 4 });
        assert_eq!(sink.applied().len(), 2);
    }

    #[tokio::test]
    async fn nameless_group_is_skipped_without_a_worker() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink);

        let outcome = dispatcher
            .reconcile(NodeGroup::new("", 3), EventKind::Created)
            .await;

        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::NoIdentity));
        assert!(dispatcher.active_groups().await.is_empty());
    }

    #[tokio::test]
    async fn untargeted_and_deleted_groups_get_no_worker() {
        let sink = Arc::new(RecordingSink::new());
        let config = AutoscalerConfig {
            target_node_group: Some("web-pool".to_string()),
            ..Default::default()
        };
        let dispatcher = dispatcher_with(
            config,
            Arc::new(ScriptedMetrics::utilization(95.0, 95.0)),
            sink.clone(),
        );

        let outcome = dispatcher
            .reconcile(NodeGroup::new("batch-pool", 3), EventKind::Modified)
            .await;
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::NotTargeted));

        let outcome = dispatcher
            .reconcile(NodeGroup::new("web-pool", 3), EventKind::Deleted)
            .await;
        assert_eq!(outcome, ReconcileOutcome::Skipped(SkipReason::Deleted));

        assert!(dispatcher.active_groups().await.is_empty());
        assert!(sink.applied().is_empty());
    }

    #[tokio::test]
    async fn retain_groups_retires_vanished_groups() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = dispatcher(ScriptedMetrics::utilization(50.0, 50.0), sink);

        for name in ["web-pool", "batch-pool"] {
            dispatcher
                .reconcile(NodeGroup::new(name, 3), EventKind::Modified)
                .await;
        }
        assert_eq!(dispatcher.active_groups().await.len(), 2);

        dispatcher
            .retain_groups(&HashSet::from(["web-pool".to_string()]))
            .await;
        assert_eq!(dispatcher.active_groups().await, vec!["web-pool".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_drains_queues() {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = dispatcher(ScriptedMetrics::utilization(95.0, 95.0), sink.clone());

        let pending = dispatcher
            .submit(NodeGroup::new("web-pool", 3), EventKind::Modified)
            .await;
        dispatcher.shutdown().await;

        assert_eq!(pending.await.unwrap(), ReconcileOutcome::Scaled { from: 3, to: 4 });
        assert!(dispatcher.active_groups().await.is_empty());
    }
}
