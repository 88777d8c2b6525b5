//! Recovery policies for failed fetches
//!
//! When a fetch fails the downloader halts admission and asks a
//! [`RecoveryPolicy`] what to do. Concurrent failures join the open incident,
//! so a policy is consulted once per incident, never once per failure.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RecoveryMode;

/// What the downloader does after a failure incident
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDecision {
    /// Record the failed locators and resume admission
    Skip,
    /// Resume admission and fetch each failed locator of the incident once more
    ResumeAll,
    /// Stop admitting locators; in-flight fetches finish and the run is aborted
    AbortAll,
}

/// Context handed to a [`RecoveryPolicy`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureIncident {
    /// URL of the locator whose failure opened the incident
    pub url: String,
    /// Error description
    pub error: String,
    /// Locators completed so far
    pub completed: usize,
    /// Locators in the run
    pub total: usize,
}

/// Decides how a run continues after a fetch failure
#[async_trait::async_trait]
pub trait RecoveryPolicy: Send + Sync {
    /// Decide the outcome of one incident
    ///
    /// Admission of new fetches stays halted until this returns.
    async fn decide(&self, incident: &FailureIncident) -> RecoveryDecision;
}

/// Answers every incident with the same decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedDecision(pub RecoveryDecision);

#[async_trait::async_trait]
impl RecoveryPolicy for FixedDecision {
    async fn decide(&self, incident: &FailureIncident) -> RecoveryDecision {
        tracing::debug!(url = %incident.url, decision = ?self.0, "applying fixed recovery decision");
        self.0
    }
}

/// Asks the operator on the terminal
///
/// If the terminal cannot be used (no TTY, closed stdin) the run is aborted,
/// since nobody is there to acknowledge the failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;

const PROMPT_CHOICES: [(&str, RecoveryDecision); 3] = [
    ("Skip the failed file and continue", RecoveryDecision::Skip),
    ("Retry the failed file and continue", RecoveryDecision::ResumeAll),
    ("Abort the download", RecoveryDecision::AbortAll),
];

#[async_trait::async_trait]
impl RecoveryPolicy for ConsolePrompt {
    async fn decide(&self, incident: &FailureIncident) -> RecoveryDecision {
        let prompt = format!(
            "Failed to download {} ({}) [{}/{} done]",
            incident.url, incident.error, incident.completed, incident.total
        );

        let answer = tokio::task::spawn_blocking(move || {
            let labels: Vec<&str> = PROMPT_CHOICES.iter().map(|(label, _)| *label).collect();
            dialoguer::Select::new()
                .with_prompt(prompt)
                .items(&labels)
                .default(0)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(index)) => PROMPT_CHOICES
                .get(index)
                .map(|(_, decision)| *decision)
                .unwrap_or(RecoveryDecision::AbortAll),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "recovery prompt failed, aborting");
                RecoveryDecision::AbortAll
            }
            Err(e) => {
                tracing::error!(error = %e, "recovery prompt task failed, aborting");
                RecoveryDecision::AbortAll
            }
        }
    }
}

/// Policy matching a configured [`RecoveryMode`]
pub fn policy_for(mode: RecoveryMode) -> Arc<dyn RecoveryPolicy> {
    match mode {
        RecoveryMode::Prompt => Arc::new(ConsolePrompt),
        RecoveryMode::Skip => Arc::new(FixedDecision(RecoveryDecision::Skip)),
        RecoveryMode::Abort => Arc::new(FixedDecision(RecoveryDecision::AbortAll)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn incident() -> FailureIncident {
        FailureIncident {
            url: "https://cdn.example/Android/ab12/char01.unity3d".to_string(),
            error: "HTTP 404 Not Found".to_string(),
            completed: 3,
            total: 10,
        }
    }

    #[tokio::test]
    async fn test_fixed_decision_always_answers_the_same() {
        let policy = FixedDecision(RecoveryDecision::ResumeAll);
        assert_eq!(policy.decide(&incident()).await, RecoveryDecision::ResumeAll);
        assert_eq!(policy.decide(&incident()).await, RecoveryDecision::ResumeAll);
    }

    #[tokio::test]
    async fn test_policy_for_non_interactive_modes() {
        assert_eq!(
            policy_for(RecoveryMode::Skip).decide(&incident()).await,
            RecoveryDecision::Skip
        );
        assert_eq!(
            policy_for(RecoveryMode::Abort).decide(&incident()).await,
            RecoveryDecision::AbortAll
        );
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RecoveryDecision::ResumeAll).unwrap(),
            "\"resume_all\""
        );
    }
}
