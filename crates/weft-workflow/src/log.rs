use tokio::sync::mpsc::UnboundedSender;

use weft_core::step::ExecutionStep;

/// Append-only ordered log of build and run events, owned by one execution.
///
/// When an event sender is attached (streaming mode), every appended step is
/// also forwarded to it as it happens.
pub struct StepLog {
    steps: Vec<ExecutionStep>,
    events: Option<UnboundedSender<ExecutionStep>>,
}

impl StepLog {
    pub fn new(events: Option<UnboundedSender<ExecutionStep>>) -> Self {
        Self {
            steps: Vec::new(),
            events,
        }
    }

    pub fn push(&mut self, step: ExecutionStep) {
        if let Some(ref tx) = self.events {
            // A closed receiver just means the subscriber went away;
            // the log itself is still authoritative.
            let _ = tx.send(step.clone());
        }
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ExecutionStep> {
        self.steps
    }
}
