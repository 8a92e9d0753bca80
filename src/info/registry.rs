//! Bookkeeping for in-flight hierarchy extractions.
//!
//! The registry owns the `key -> job` map. Keys identify the requesting navigator item;
//! the registry never looks inside them. At most one job exists per key, finished jobs
//! stay registered until the next sweep, and teardown drops everything that is left.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::hierarchy::{Completion, HierarchyError, HierarchyMaker, result_code};
use super::line::LineParser;
use super::node::InfoNode;
use super::source::NodeSource;

/// How often finished jobs are reclaimed unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

pub struct HierarchyRegistry<K> {
    source: Arc<dyn NodeSource>,
    parser: LineParser,
    jobs: HashMap<K, HierarchyMaker>,
    sender: Sender<Completion<K>>,
    receiver: Receiver<Completion<K>>,
    sweep_interval: Duration,
    last_sweep: Instant,
}

impl<K> HierarchyRegistry<K>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
{
    pub fn new(source: Arc<dyn NodeSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            source,
            parser: LineParser::new(),
            jobs: HashMap::new(),
            sender,
            receiver,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            last_sweep: Instant::now(),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Start extracting `(topic)start` for `key` unless a job is already registered.
    ///
    /// Returns `true` when a new job was created.
    pub fn ensure_job(&mut self, key: K, topic: &str, start: &str) -> bool {
        if let Some(maker) = self.jobs.get(&key) {
            debug!(?key, topic = maker.topic(), "hierarchy creation already in progress");
            return false;
        }

        debug!(?key, topic, start, "starting hierarchy creation");
        let mut maker = HierarchyMaker::new(topic, start);
        maker.create_hierarchy(
            key.clone(),
            Arc::clone(&self.source),
            self.parser.clone(),
            self.sender.clone(),
        );
        self.jobs.insert(key, maker);
        true
    }

    /// Deliver every completion that arrived since the last call.
    ///
    /// Returns the number of completions handed to `on_created`.
    pub fn poll<F>(&mut self, mut on_created: F) -> usize
    where
        F: FnMut(K, Result<InfoNode, HierarchyError>),
    {
        let mut delivered = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(Completion { key, result }) => {
                    debug!(?key, code = %result_code(&result), "info hierarchy created");
                    on_created(key, result);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }

    /// Remove every job that is no longer working. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|key, maker| {
            let keep = maker.is_working();
            if !keep {
                debug!(
                    ?key,
                    topic = maker.topic(),
                    start = maker.start_node(),
                    "deleting a not-working hierarchy maker"
                );
            }
            keep
        });
        before - self.jobs.len()
    }

    /// Run [`sweep`](Self::sweep) if the sweep interval has elapsed since the last one.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_sweep) < self.sweep_interval {
            return false;
        }
        self.last_sweep = now;
        self.sweep();
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.jobs.contains_key(key)
    }

    /// The job registered for `key`, finished or not.
    pub fn job(&self, key: &K) -> Option<&HierarchyMaker> {
        self.jobs.get(key)
    }

    /// `Some(working)` for a registered key, `None` otherwise.
    pub fn is_working(&self, key: &K) -> Option<bool> {
        self.jobs.get(key).map(HierarchyMaker::is_working)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every job regardless of state. Running jobs are cancelled and never report.
    pub fn teardown(&mut self) {
        for (key, maker) in self.jobs.drain() {
            if maker.is_working() {
                debug!(?key, topic = maker.topic(), "cancelling running hierarchy maker");
            }
        }
        while self.receiver.try_recv().is_ok() {}
    }
}

impl<K> Drop for HierarchyRegistry<K> {
    fn drop(&mut self) {
        // Dropping the makers sets their cancel flags
        self.jobs.clear();
    }
}
