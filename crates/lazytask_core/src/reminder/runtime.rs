//! Async driver that owns a scheduler and multiplexes its trigger sources.
//!
//! # Responsibility
//! - Run one tokio task per scheduler; every source (interval, app
//!   foreground, focus, task mutation) becomes an event on that task.
//! - Guarantee teardown: once `ReminderHandle::stop` resolves, the task has
//!   exited and no further pass can run.
//!
//! # Invariants
//! - Events are handled one at a time, run-to-completion.
//! - Missed interval ticks are skipped, never queued.
//! - A loop is only spawned for a validated config.
//! - Commands win over ticks when both are ready, so a stop is never
//!   followed by a stray pass.

use crate::reminder::clock::Clock;
use crate::reminder::config::ConfigError;
use crate::reminder::dispatch::AlertDispatcher;
use crate::reminder::scheduler::{LifecycleError, ReminderScheduler, TriggerSource};
use crate::reminder::source::TaskSnapshotSource;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Host application lifecycle as reported by the platform shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

/// Why a reminder loop could not be spawned.
#[derive(Debug)]
pub enum SpawnError {
    /// The scheduler was already started or stopped.
    Lifecycle(LifecycleError),
    /// The config would stall or break the loop; nothing was started.
    InvalidConfig(ConfigError),
}

impl Display for SpawnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lifecycle(err) => write!(f, "{err}"),
            Self::InvalidConfig(err) => write!(f, "reminder config rejected: {err}"),
        }
    }
}

impl Error for SpawnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lifecycle(err) => Some(err),
            Self::InvalidConfig(err) => Some(err),
        }
    }
}

impl From<LifecycleError> for SpawnError {
    fn from(value: LifecycleError) -> Self {
        Self::Lifecycle(value)
    }
}

impl From<ConfigError> for SpawnError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

#[derive(Debug)]
enum LoopCommand {
    Trigger(TriggerSource),
    Stop(oneshot::Sender<()>),
}

enum LoopEvent {
    Command(Option<LoopCommand>),
    Tick,
    Lifecycle(Option<AppLifecycle>),
}

/// Cloneable sender for host-side trigger events.
///
/// Events sent after the loop stopped are dropped.
#[derive(Debug, Clone)]
pub struct ReminderTrigger {
    commands: mpsc::UnboundedSender<LoopCommand>,
}

impl ReminderTrigger {
    pub fn focus_gained(&self) {
        self.send(TriggerSource::FocusGained);
    }

    pub fn tasks_mutated(&self) {
        self.send(TriggerSource::TasksMutated);
    }

    /// Explicit foreground signal for hosts without a lifecycle channel.
    pub fn foreground(&self) {
        self.send(TriggerSource::Foreground);
    }

    fn send(&self, source: TriggerSource) {
        if self.commands.send(LoopCommand::Trigger(source)).is_err() {
            debug!(
                "event=reminder_trigger module=reminder status=dropped source={}",
                source.as_str()
            );
        }
    }
}

/// Owner handle for a running reminder loop.
///
/// Dropping the handle stops the loop without waiting for it.
#[derive(Debug)]
pub struct ReminderHandle {
    commands: mpsc::UnboundedSender<LoopCommand>,
    join: Option<JoinHandle<()>>,
}

impl ReminderHandle {
    pub fn trigger(&self) -> ReminderTrigger {
        ReminderTrigger {
            commands: self.commands.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Stops the loop and waits until it has exited. Idempotent.
    pub async fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(LoopCommand::Stop(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        if let Err(err) = join.await {
            warn!("event=reminder_loop module=reminder status=error error_code=join_failed error={err}");
        }
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            let (ack_tx, _ack_rx) = oneshot::channel();
            let _ = self.commands.send(LoopCommand::Stop(ack_tx));
        }
    }
}

/// Spawns reminder loops onto a tokio runtime.
pub struct ReminderRuntime;

impl ReminderRuntime {
    /// Starts `scheduler` (running its immediate pass) and moves it onto a
    /// dedicated task on `runtime`.
    ///
    /// The scheduler's config is validated first; an invalid config is
    /// rejected before the start pass runs.
    ///
    /// When `lifecycle` is given, every transition to `AppLifecycle::Active`
    /// triggers a foreground pass; the receiver is dropped with the loop.
    pub fn spawn<S, D, C>(
        runtime: &Handle,
        mut scheduler: ReminderScheduler<S, D, C>,
        lifecycle: Option<watch::Receiver<AppLifecycle>>,
    ) -> Result<ReminderHandle, SpawnError>
    where
        S: TaskSnapshotSource + Send + 'static,
        D: AlertDispatcher + Send + 'static,
        C: Clock + 'static,
    {
        if let Err(err) = scheduler.config().validate() {
            error!(
                "event=reminder_loop module=reminder status=error error_code=invalid_config error={err}"
            );
            return Err(err.into());
        }
        scheduler.start()?;

        let period = scheduler.config().tick_interval();
        let (commands, receiver) = mpsc::unbounded_channel();
        let join = runtime.spawn(run_loop(scheduler, receiver, lifecycle, period));

        Ok(ReminderHandle {
            commands,
            join: Some(join),
        })
    }
}

async fn run_loop<S, D, C>(
    mut scheduler: ReminderScheduler<S, D, C>,
    mut commands: mpsc::UnboundedReceiver<LoopCommand>,
    mut lifecycle: Option<watch::Receiver<AppLifecycle>>,
    period: Duration,
) where
    S: TaskSnapshotSource,
    D: AlertDispatcher,
    C: Clock,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if let Some(receiver) = lifecycle.as_mut() {
        let _ = receiver.borrow_and_update();
    }
    debug!(
        "event=reminder_loop module=reminder status=start period_ms={}",
        period.as_millis()
    );

    loop {
        let event = tokio::select! {
            biased;
            command = commands.recv() => LoopEvent::Command(command),
            _ = ticker.tick() => LoopEvent::Tick,
            state = next_lifecycle(&mut lifecycle) => LoopEvent::Lifecycle(state),
        };

        let source = match event {
            LoopEvent::Command(Some(LoopCommand::Trigger(source))) => source,
            LoopEvent::Command(Some(LoopCommand::Stop(ack))) => {
                scheduler.stop();
                let _ = ack.send(());
                break;
            }
            LoopEvent::Command(None) => {
                scheduler.stop();
                break;
            }
            LoopEvent::Tick => TriggerSource::Interval,
            LoopEvent::Lifecycle(Some(AppLifecycle::Active)) => TriggerSource::Foreground,
            LoopEvent::Lifecycle(Some(_)) => continue,
            LoopEvent::Lifecycle(None) => {
                lifecycle = None;
                continue;
            }
        };

        // Failures are logged by the scheduler and retried on the next event.
        let _ = scheduler.request_evaluation(source);
    }

    info!("event=reminder_loop module=reminder status=stopped");
}

async fn next_lifecycle(
    lifecycle: &mut Option<watch::Receiver<AppLifecycle>>,
) -> Option<AppLifecycle> {
    let Some(receiver) = lifecycle.as_mut() else {
        return std::future::pending().await;
    };
    if receiver.changed().await.is_err() {
        return None;
    }
    let state = *receiver.borrow_and_update();
    Some(state)
}
