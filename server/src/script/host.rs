use super::context::ScriptContext;
use super::runner::ScriptRunner;
use super::{ScriptCommand, ScriptError, ScriptResult};
use crate::mechanics::MechanicIdAllocator;
use log::{error, info};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Starts top-level scripts. Each one runs as its own task, so a failing or
/// panicking script only ends itself.
#[derive(Clone)]
pub struct ScriptHost {
    commands: mpsc::UnboundedSender<ScriptCommand>,
    ids: MechanicIdAllocator,
}

impl ScriptHost {
    pub fn new(commands: mpsc::UnboundedSender<ScriptCommand>, ids: MechanicIdAllocator) -> Self {
        Self { commands, ids }
    }

    pub fn runner(&self, name: &str) -> ScriptRunner {
        ScriptRunner::new(name, self.commands.clone(), self.ids.clone())
    }

    pub fn launch<F, Fut>(&self, name: &str, script: F) -> JoinHandle<ScriptResult>
    where
        F: FnOnce(ScriptRunner, ScriptContext) -> Fut + Send + 'static,
        Fut: Future<Output = ScriptResult> + Send + 'static,
    {
        let runner = self.runner(name);
        let name = name.to_string();

        tokio::spawn(async move {
            info!("Script '{}' started", name);
            let task = tokio::spawn(script(runner, ScriptContext::new()));

            let result = match task.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(ScriptError::Failed("script panicked".to_string())),
                Err(e) => Err(ScriptError::Failed(e.to_string())),
            };

            match &result {
                Ok(()) => info!("Script '{}' finished", name),
                Err(e) => error!("Script '{}' failed: {}", name, e),
            }
            result
        })
    }
}
