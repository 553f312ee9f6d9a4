//! Debounced up/down tracking per endpoint.
//!
//! Every failing poll bumps the endpoint's counter. When the counter reaches
//! the threshold the endpoint joins the known-error set and a single OFFLINE
//! transition is emitted. A later successful poll removes it again and emits a
//! single ONLINE transition; successes below the threshold just reset the
//! counter.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::debug;

use crate::models::StatusSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Offline { endpoint: String, error: String },
    Online { endpoint: String },
}

impl Transition {
    pub fn endpoint(&self) -> &str {
        match self {
            Transition::Offline { endpoint, .. } | Transition::Online { endpoint } => endpoint,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Transition::Offline { .. })
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Offline { endpoint, error } => {
                write!(f, "{endpoint} has transitioned to OFFLINE. Error: {error}")
            }
            Transition::Online { endpoint } => write!(f, "{endpoint} has transitioned to ONLINE."),
        }
    }
}

/// Debounce state of one endpoint as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Healthy,
    Degraded(u32),
    ConfirmedDown,
}

/// Per-endpoint failure counters plus the set of endpoints already announced
/// as down. Owned by the poll loop; not shared.
#[derive(Debug)]
pub struct StateTracker {
    threshold: u32,
    failures: HashMap<String, u32>,
    known_errors: BTreeSet<String>,
}

impl StateTracker {
    pub fn new(threshold: u32) -> Self {
        Self::with_known_errors(threshold, std::iter::empty::<String>())
    }

    /// Seeds the known-error set, e.g. from a persisted list, so outages that
    /// were already announced before a restart are not announced again.
    pub fn with_known_errors<I, S>(threshold: u32, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
            known_errors: known.into_iter().map(Into::into).collect(),
        }
    }

    /// Advances one endpoint by one poll.
    pub fn observe(
        &mut self,
        endpoint: &str,
        was_erroring: bool,
        is_erroring: bool,
        error: &str,
    ) -> Option<Transition> {
        if was_erroring != is_erroring {
            debug!(%endpoint, was_erroring, is_erroring, "raw poll state changed");
        }

        if is_erroring {
            let count = self.failures.entry(endpoint.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            if *count >= self.threshold && self.known_errors.insert(endpoint.to_string()) {
                return Some(Transition::Offline { endpoint: endpoint.to_string(), error: error.to_string() });
            }
            return None;
        }

        self.failures.remove(endpoint);
        if self.known_errors.remove(endpoint) {
            return Some(Transition::Online { endpoint: endpoint.to_string() });
        }
        None
    }

    /// Runs every endpoint of `next` through [`observe`](Self::observe),
    /// using `prev` for the raw previous state. Each endpoint id is observed
    /// once per call even when several snapshot entries share it.
    pub fn track(&mut self, prev: &StatusSnapshot, next: &StatusSnapshot) -> Vec<Transition> {
        let before: HashMap<String, bool> = merged(prev)
            .into_iter()
            .map(|(id, err)| (id, !err.is_empty()))
            .collect();

        merged(next)
            .into_iter()
            .filter_map(|(id, err)| {
                let was = before.get(&id).copied().unwrap_or(false);
                self.observe(&id, was, !err.is_empty(), &err)
            })
            .collect()
    }

    pub fn state(&self, endpoint: &str) -> EndpointState {
        if self.known_errors.contains(endpoint) {
            return EndpointState::ConfirmedDown;
        }
        match self.failures.get(endpoint).copied().unwrap_or(0) {
            0 => EndpointState::Healthy,
            n => EndpointState::Degraded(n),
        }
    }

    pub fn failure_count(&self, endpoint: &str) -> u32 {
        self.failures.get(endpoint).copied().unwrap_or(0)
    }

    /// Known-error endpoints in sorted order.
    pub fn known_errors(&self) -> Vec<String> {
        self.known_errors.iter().cloned().collect()
    }
}

/// Endpoints of `snapshot` with repeated ids folded together, in first-seen
/// order. A folded endpoint is failing if any of its entries failed.
fn merged(snapshot: &StatusSnapshot) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (id, err) in snapshot.endpoints() {
        match index.get(&id) {
            Some(&i) => {
                if out[i].1.is_empty() {
                    out[i].1 = err;
                }
            }
            None => {
                index.insert(id.clone(), out.len());
                out.push((id, err));
            }
        }
    }
    out
}
