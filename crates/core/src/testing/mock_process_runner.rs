//! Mock process runner for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::stages::{ProcessError, ProcessRunner, ToolInvocation, ToolOutput};

type Handler = Arc<dyn Fn(&ToolInvocation) -> Result<ToolOutput, ProcessError> + Send + Sync>;

/// Mock implementation of the ProcessRunner trait.
///
/// Records every invocation and answers through a configurable handler.
/// The default handler reports a clean exit without touching the
/// filesystem; tests that need output files write them from the handler.
#[derive(Clone)]
pub struct MockProcessRunner {
    invocations: Arc<Mutex<Vec<ToolInvocation>>>,
    handler: Arc<Mutex<Handler>>,
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProcessRunner")
            .field("invocations", &self.invocations().len())
            .finish()
    }
}

impl MockProcessRunner {
    /// Create a new mock runner answering every invocation with success.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
            handler: Arc::new(Mutex::new(Arc::new(|_: &ToolInvocation| Ok(ToolOutput::ok())))),
        }
    }

    /// Replace the handler.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&ToolInvocation) -> Result<ToolOutput, ProcessError> + Send + Sync + 'static,
    {
        *self.handler.lock().unwrap() = Arc::new(handler);
    }

    /// All invocations so far, in order.
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Clear recorded invocations.
    pub fn clear(&self) {
        self.invocations.lock().unwrap().clear();
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        _limit: Duration,
    ) -> Result<ToolOutput, ProcessError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let handler = Arc::clone(&self.handler.lock().unwrap());
        handler(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_answers() {
        let runner = MockProcessRunner::new();
        let output = runner
            .run(&ToolInvocation::new("ffmpeg").arg("-version"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(output.success);

        runner.set_handler(|_| Ok(ToolOutput::failed(3, "nope")));
        let output = runner
            .run(&ToolInvocation::new("demucs"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[1].display(), "demucs");

        runner.clear();
        assert!(runner.invocations().is_empty());
    }
}
