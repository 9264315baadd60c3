//! The authoritative game plus everything scripts need to talk to it.
//!
//! [`Simulation`] owns the [`Game`], the receiving end of the script command
//! channel and the [`ResolutionHub`]. The network server embeds one and
//! multiplexes it with socket traffic; tests drive it headless through
//! [`Simulation::run_for`].

use crate::game::Game;
use crate::mechanics::Resolution;
use crate::script::{ResolutionHub, ScriptCommand, ScriptContext, ScriptHost, ScriptResult, ScriptRunner};
use crate::utils::Clock;
use log::{debug, warn};
use shared::GameState;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub struct Simulation {
    pub game: Game,
    hub: ResolutionHub,
    scripts: ScriptHost,
    script_rx: mpsc::UnboundedReceiver<ScriptCommand>,
    clock: Clock,
    tick_duration: Duration,
}

impl Simulation {
    pub fn new(tick_duration: Duration) -> Self {
        let game = Game::new();
        let (script_tx, script_rx) = mpsc::unbounded_channel();
        let scripts = ScriptHost::new(script_tx, game.mechanic_ids());

        Self {
            game,
            hub: ResolutionHub::default(),
            scripts,
            script_rx,
            clock: Clock::new(),
            tick_duration,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn scripts(&self) -> &ScriptHost {
        &self.scripts
    }

    pub fn runner(&self, name: &str) -> ScriptRunner {
        self.scripts.runner(name)
    }

    pub fn launch<F, Fut>(&self, name: &str, script: F) -> JoinHandle<ScriptResult>
    where
        F: FnOnce(ScriptRunner, ScriptContext) -> Fut + Send + 'static,
        Fut: Future<Output = ScriptResult> + Send + 'static,
    {
        self.scripts.launch(name, script)
    }

    /// One physics step at the current clock time. Resolutions are handed to
    /// waiting scripts before being returned.
    pub fn physics_tick(&mut self) -> Vec<Resolution> {
        let now = self.now();
        let resolutions = self.game.tick(now);
        for resolution in &resolutions {
            self.hub.resolved(resolution.clone(), now);
        }
        self.hub.prune(now);
        resolutions
    }

    pub fn handle_script_command(&mut self, command: ScriptCommand) {
        let now = self.now();
        match command {
            ScriptCommand::Spawn {
                id,
                kind,
                duration_ms,
            } => {
                if self.game.spawn_with_id(id, kind, duration_ms, now) {
                    self.hub.track(id);
                } else {
                    warn!("Mechanic id {} already in use, spawn ignored", id);
                }
            }
            ScriptCommand::WaitForResolve { id, reply } => {
                self.hub.wait(id, reply);
            }
            ScriptCommand::Damage { player_id, amount } => {
                if self.game.damage(player_id, amount, now).is_none() {
                    debug!("Script damaged missing player {}", player_id);
                }
            }
            ScriptCommand::ApplyStatus {
                player_id,
                kind,
                duration_ms,
                periodic,
                on_expire_damage,
            } => {
                self.game.apply_status_with(
                    player_id,
                    kind,
                    duration_ms,
                    periodic,
                    on_expire_damage,
                    now,
                );
            }
            ScriptCommand::GetState { reply } => {
                let _ = reply.send(self.game.snapshot(now));
            }
        }
    }

    pub async fn next_script_command(&mut self) -> Option<ScriptCommand> {
        self.script_rx.recv().await
    }

    /// Applies every command already queued without waiting for more.
    pub fn drain_script_commands(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(command) = self.script_rx.try_recv() {
            self.handle_script_command(command);
            handled += 1;
        }
        handled
    }

    pub fn snapshot(&self) -> GameState {
        self.game.snapshot(self.now())
    }

    /// Runs the tick loop and script commands, with no network, for `duration`.
    pub async fn run_for(&mut self, duration: Duration) {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(command) = self.script_rx.recv() => {
                    self.handle_script_command(command);
                }
                _ = ticker.tick() => {
                    self.physics_tick();
                }
            }
        }
    }
}
