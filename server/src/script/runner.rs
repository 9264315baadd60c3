use super::context::ScriptContext;
use super::timeline::Timeline;
use super::{MechanicSpec, ScriptCommand, ScriptError, ScriptResult};
use crate::mechanics::{MechanicIdAllocator, Resolution};
use log::{error, info};
use shared::{GameState, MechanicId, PeriodicDamage, PlayerId, StatusKind};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The handle an encounter script drives the fight through.
///
/// Cloning a runner shares its clock and timeline. [`ScriptRunner::run`]
/// creates a child with a fresh clock, timeline and context instead.
#[derive(Clone)]
pub struct ScriptRunner {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<ScriptCommand>,
    ids: MechanicIdAllocator,
    origin: Instant,
    timeline: Arc<Mutex<Timeline>>,
}

impl ScriptRunner {
    pub fn new(
        name: &str,
        commands: mpsc::UnboundedSender<ScriptCommand>,
        ids: MechanicIdAllocator,
    ) -> Self {
        Self {
            name: Arc::from(name),
            commands,
            ids,
            origin: Instant::now(),
            timeline: Arc::new(Mutex::new(Timeline::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Milliseconds since this script started.
    pub fn elapsed(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Queues a mechanic and returns its id right away. The mechanic goes
    /// live on the server loop's next pass over script commands.
    pub fn spawn(&self, spec: impl Into<MechanicSpec>) -> Result<MechanicId, ScriptError> {
        let spec = spec.into();
        let duration_ms = spec.resolve_duration(self.elapsed())?;
        let id = self.ids.next_id();
        self.send(ScriptCommand::Spawn {
            id,
            kind: spec.kind,
            duration_ms,
        })?;
        Ok(id)
    }

    pub async fn wait(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    pub async fn get_state(&self) -> Result<GameState, ScriptError> {
        let (reply, rx) = oneshot::channel();
        self.send(ScriptCommand::GetState { reply })?;
        rx.await.map_err(|_| ScriptError::Disconnected)
    }

    /// Runs a selector against a fresh snapshot.
    pub async fn select<F>(&self, ctx: &ScriptContext, selector: F) -> Result<Vec<PlayerId>, ScriptError>
    where
        F: FnOnce(&GameState, &ScriptContext) -> Vec<PlayerId>,
    {
        let state = self.get_state().await?;
        Ok(selector(&state, ctx))
    }

    pub async fn wait_for_resolve(&self, id: MechanicId) -> Result<Resolution, ScriptError> {
        let rx = self.register_waiter(id)?;
        rx.await.map_err(|_| ScriptError::Disconnected)?
    }

    /// Waits for several mechanics. Every waiter is registered before the
    /// first await, so none of the resolutions can be missed.
    pub async fn wait_for_all(&self, ids: &[MechanicId]) -> Result<Vec<Resolution>, ScriptError> {
        let receivers = ids
            .iter()
            .map(|id| self.register_waiter(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut resolutions = Vec::with_capacity(receivers.len());
        for rx in receivers {
            resolutions.push(rx.await.map_err(|_| ScriptError::Disconnected)??);
        }
        Ok(resolutions)
    }

    pub fn damage(&self, player_id: PlayerId, amount: f32) -> ScriptResult {
        self.send(ScriptCommand::Damage { player_id, amount })
    }

    pub fn apply_status(&self, player_id: PlayerId, kind: StatusKind, duration_ms: u64) -> ScriptResult {
        self.apply_status_with(player_id, kind, duration_ms, None, None)
    }

    pub fn apply_status_with(
        &self,
        player_id: PlayerId,
        kind: StatusKind,
        duration_ms: u64,
        periodic: Option<PeriodicDamage>,
        on_expire_damage: Option<f32>,
    ) -> ScriptResult {
        self.send(ScriptCommand::ApplyStatus {
            player_id,
            kind,
            duration_ms,
            periodic,
            on_expire_damage,
        })
    }

    /// Runs a sub-script with its own clock, timeline and an empty context.
    pub async fn run<F, Fut>(&self, script: F) -> ScriptResult
    where
        F: FnOnce(ScriptRunner, ScriptContext) -> Fut,
        Fut: Future<Output = ScriptResult>,
    {
        self.run_with(ScriptContext::new(), script).await
    }

    pub async fn run_with<F, Fut>(&self, ctx: ScriptContext, script: F) -> ScriptResult
    where
        F: FnOnce(ScriptRunner, ScriptContext) -> Fut,
        Fut: Future<Output = ScriptResult>,
    {
        script(self.child(), ctx).await
    }

    /// Schedules `action` at `at_ms` after [`ScriptRunner::run_timeline`] starts.
    pub fn at<F>(&self, at_ms: u64, action: F)
    where
        F: FnOnce(&ScriptRunner) -> ScriptResult + Send + 'static,
    {
        self.lock_timeline().push(at_ms, Box::new(action));
    }

    /// Runs queued callbacks in time order until none are left. The first
    /// failing callback stops the timeline and its error is returned.
    pub async fn run_timeline(&self) -> ScriptResult {
        let start = Instant::now();
        loop {
            let next = self.lock_timeline().pop_earliest();
            let Some(entry) = next else {
                return Ok(());
            };

            tokio::time::sleep_until(start + Duration::from_millis(entry.at_ms)).await;
            (entry.action)(self)?;
        }
    }

    /// Runs `branch` concurrently. Its error or panic is logged, never
    /// propagated.
    pub fn fork<Fut>(&self, branch: Fut) -> JoinHandle<()>
    where
        Fut: Future<Output = ScriptResult> + Send + 'static,
    {
        let name = self.name.clone();
        tokio::spawn(async move {
            match tokio::spawn(branch).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Script '{}' branch failed: {}", name, e),
                Err(e) if e.is_panic() => error!("Script '{}' branch panicked", name),
                Err(e) => error!("Script '{}' branch aborted: {}", name, e),
            }
        })
    }

    pub fn log(&self, message: impl AsRef<str>) {
        info!("[{}] {}", self.name, message.as_ref());
    }

    fn child(&self) -> ScriptRunner {
        Self {
            name: self.name.clone(),
            commands: self.commands.clone(),
            ids: self.ids.clone(),
            origin: Instant::now(),
            timeline: Arc::new(Mutex::new(Timeline::new())),
        }
    }

    fn send(&self, command: ScriptCommand) -> ScriptResult {
        self.commands
            .send(command)
            .map_err(|_| ScriptError::Disconnected)
    }

    fn register_waiter(
        &self,
        id: MechanicId,
    ) -> Result<oneshot::Receiver<Result<Resolution, ScriptError>>, ScriptError> {
        let (reply, rx) = oneshot::channel();
        self.send(ScriptCommand::WaitForResolve { id, reply })?;
        Ok(rx)
    }

    fn lock_timeline(&self) -> MutexGuard<'_, Timeline> {
        self.timeline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
