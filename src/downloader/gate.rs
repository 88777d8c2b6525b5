//! Admission control shared by all workers of a run

use tokio::sync::watch;

use super::recovery::RecoveryDecision;

#[derive(Clone, Debug, Default)]
struct GateState {
    paused: bool,
    aborted: bool,
    /// Number of incidents opened so far; incident ids start at 1
    opened: u64,
    /// Decision of incident `i` is at index `i - 1`
    resolved: Vec<RecoveryDecision>,
}

/// Result of waiting for admission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    Proceed,
    Aborted,
}

/// Role of a failing worker within a failure incident
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IncidentRole {
    /// Opened the incident and must resolve it
    Leader(u64),
    /// Failed while the incident was open and adopts the leader's decision
    Follower(u64),
    /// Failed after the gate was aborted; no incident is opened
    Aborted,
}

/// Pause/abort state broadcast to every worker over a watch channel
///
/// Workers call [`admit`](Self::admit) before each fetch. The first failure
/// pauses the gate and becomes the incident leader; later failures join the
/// same incident until the leader calls [`resolve`](Self::resolve).
pub(crate) struct AdmissionGate {
    tx: watch::Sender<GateState>,
}

impl AdmissionGate {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::default());
        Self { tx }
    }

    /// Wait until the gate is open or aborted
    pub(crate) async fn admit(&self) -> Admission {
        let mut rx = self.tx.subscribe();
        let aborted = match rx.wait_for(|s| s.aborted || !s.paused).await {
            Ok(state) => state.aborted,
            // unreachable while `self` holds the sender
            Err(_) => true,
        };
        if aborted {
            Admission::Aborted
        } else {
            Admission::Proceed
        }
    }

    /// Record a failure, pausing the gate if no incident is open
    ///
    /// Once aborted the gate stays closed and opens no further incidents.
    pub(crate) fn report_failure(&self) -> IncidentRole {
        let mut role = IncidentRole::Follower(0);
        self.tx.send_if_modified(|s| {
            if s.aborted {
                role = IncidentRole::Aborted;
                false
            } else if s.paused {
                role = IncidentRole::Follower(s.opened);
                false
            } else {
                s.paused = true;
                s.opened += 1;
                role = IncidentRole::Leader(s.opened);
                true
            }
        });
        role
    }

    /// Close the open incident with `decision` and release waiting workers
    pub(crate) fn resolve(&self, decision: RecoveryDecision) {
        self.tx.send_modify(|s| {
            s.resolved.push(decision);
            s.paused = false;
            if decision == RecoveryDecision::AbortAll {
                s.aborted = true;
            }
        });
    }

    /// Wait for the decision of `incident`
    ///
    /// Resolves to [`RecoveryDecision::AbortAll`] if the gate is aborted first.
    pub(crate) async fn decision_for(&self, incident: u64) -> RecoveryDecision {
        let index = incident.saturating_sub(1) as usize;
        let mut rx = self.tx.subscribe();
        match rx
            .wait_for(|s| s.resolved.len() > index || s.aborted)
            .await
        {
            Ok(state) => state
                .resolved
                .get(index)
                .copied()
                .unwrap_or(RecoveryDecision::AbortAll),
            Err(_) => RecoveryDecision::AbortAll,
        }
    }

    /// Stop admitting work for good
    pub(crate) fn abort(&self) {
        self.tx.send_if_modified(|s| {
            let changed = !s.aborted;
            s.aborted = true;
            changed
        });
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.tx.borrow().aborted
    }

    pub(crate) fn incidents(&self) -> u64 {
        self.tx.borrow().opened
    }
}
