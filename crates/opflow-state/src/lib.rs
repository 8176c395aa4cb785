//! State recorders and the named-state registry for opflow
//!
//! A [`StateRecorder`] holds the most recent time a named signal became
//! true. External producers (perception, sensors, input hooks) write to
//! recorders; condition evaluation only ever reads from them.
//!
//! The [`StateRecorderSet`] is the registry the compiler resolves state
//! names against. It also applies the mutex cascade: recording a state
//! clears the recorded time of every state it declares as mutually
//! exclusive.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tracing::{debug, trace};

/// Records the most recent trigger time of one named state
///
/// Timestamps are seconds on the caller's clock. A recorder never
/// manufactures time itself; producers pass `now` in, and the stored
/// value is monotonically non-decreasing.
#[derive(Debug)]
pub struct StateRecorder {
    /// State name, unique within a recorder set
    state_name: String,

    /// States cleared whenever this one records
    mutex_states: Vec<String>,

    /// Most recent trigger time, absent until the first record
    last_record_time: RwLock<Option<f64>>,
}

impl StateRecorder {
    /// Create a recorder with no mutex states
    pub fn new(state_name: impl Into<String>) -> Self {
        Self {
            state_name: state_name.into(),
            mutex_states: Vec::new(),
            last_record_time: RwLock::new(None),
        }
    }

    /// Create a recorder that clears the named states whenever it records
    pub fn with_mutex_states(
        state_name: impl Into<String>,
        mutex_states: Vec<String>,
    ) -> Self {
        Self {
            state_name: state_name.into(),
            mutex_states,
            last_record_time: RwLock::new(None),
        }
    }

    /// The state name this recorder tracks
    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    /// States that must be cleared when this one records
    pub fn mutex_states(&self) -> &[String] {
        &self.mutex_states
    }

    /// Record a trigger at `now`
    ///
    /// A timestamp older than the stored one is ignored, keeping the
    /// recorded time monotonically non-decreasing.
    pub fn record(&self, now: f64) {
        let mut last = self
            .last_record_time
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if last.is_some_and(|t| t > now) {
            trace!(state = %self.state_name, now, "ignoring stale record");
            return;
        }
        *last = Some(now);
    }

    /// Most recent trigger time, if the state ever recorded
    pub fn last_record_time(&self) -> Option<f64> {
        *self
            .last_record_time
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Forget the recorded time
    pub fn clear(&self) {
        let mut last = self
            .last_record_time
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *last = None;
    }
}

/// Registry of recorders keyed by state name
///
/// The compiler resolves condition-expression leaves against this set;
/// producers use [`StateRecorderSet::record`] so the mutex cascade is
/// applied in one place.
#[derive(Debug, Default)]
pub struct StateRecorderSet {
    recorders: DashMap<String, Arc<StateRecorder>>,
}

impl StateRecorderSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recorder, replacing any previous one with the same name
    pub fn register(&self, recorder: StateRecorder) -> Arc<StateRecorder> {
        let recorder = Arc::new(recorder);
        self.recorders
            .insert(recorder.state_name().to_string(), recorder.clone());
        recorder
    }

    /// Look up a recorder by state name
    pub fn get(&self, state_name: &str) -> Option<Arc<StateRecorder>> {
        self.recorders.get(state_name).map(|r| r.clone())
    }

    /// Whether a recorder exists for the name
    pub fn contains(&self, state_name: &str) -> bool {
        self.recorders.contains_key(state_name)
    }

    /// Record a trigger for a named state and apply its mutex cascade
    ///
    /// Returns false when no recorder is registered under the name.
    pub fn record(&self, state_name: &str, now: f64) -> bool {
        let Some(recorder) = self.get(state_name) else {
            debug!(state = state_name, "record for unregistered state");
            return false;
        };
        recorder.record(now);
        for mutex_name in recorder.mutex_states() {
            if let Some(other) = self.get(mutex_name) {
                trace!(state = state_name, cleared = %mutex_name, "mutex cascade");
                other.clear();
            }
        }
        true
    }

    /// Clear every recorder's time, keeping registrations
    pub fn clear_all(&self) {
        for entry in self.recorders.iter() {
            entry.value().clear();
        }
    }

    /// All registered state names
    pub fn state_names(&self) -> Vec<String> {
        self.recorders.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of registered recorders
    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}
