//! Fixed-rate driver that owns a `BotController` on its own thread.
//! This module exists so pause/resume/stop can be requested from any thread without sharing the controller.
//! It does not own configuration loading or status persistence.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
    mpsc,
};
use std::thread;
use std::time::{Duration, Instant};

use agent_core::{Actuator, BotConfig, BotController, LootSelector, Statistics, StatusSnapshot, WorldProvider};
use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

/// Deadline arithmetic for a fixed-rate loop. Each boundary is the previous
/// boundary plus the interval; an overrun resynchronises to the current time.
#[derive(Clone, Copy, Debug)]
pub struct FixedRateTicker {
    interval: Duration,
    next: Instant,
}

impl FixedRateTicker {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self { interval, next: start + interval }
    }

    pub fn next_boundary(&self) -> Instant {
        self.next
    }

    /// How long to sleep from `now` to the pending boundary. Advances the schedule.
    pub fn wait(&mut self, now: Instant) -> Duration {
        if now >= self.next {
            let late = now - self.next;
            if late > self.interval {
                debug!(late_ms = late.as_millis() as u64, "tick overran; resynchronising");
            }
            self.next = now + self.interval;
            return Duration::ZERO;
        }
        let wait = self.next - now;
        self.next += self.interval;
        wait
    }
}

#[derive(Debug, Default)]
struct RunnerControl {
    stop: AtomicBool,
    paused: AtomicBool,
    status: Mutex<Option<StatusSnapshot>>,
}

impl RunnerControl {
    /// Overwrites any unread status, so a reader that falls behind holds one snapshot at most.
    fn publish(&self, status: StatusSnapshot) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    fn take_status(&self) -> Option<StatusSnapshot> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

pub struct BotRunner;

impl BotRunner {
    /// Builds the controller on a dedicated thread and drives it until stopped
    /// or until `max_ticks` agent ticks have run.
    ///
    /// The factory runs on the runner thread, so the provider and actuator it
    /// builds need not be `Send`.
    pub fn spawn<F, P, A, L>(config: BotConfig, max_ticks: Option<u64>, factory: F) -> Result<RunnerHandle>
    where
        F: FnOnce(BotConfig) -> Result<BotController<P, A, L>> + Send + 'static,
        P: WorldProvider + 'static,
        A: Actuator + 'static,
        L: LootSelector + 'static,
    {
        let control = Arc::new(RunnerControl::default());
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let worker_control = Arc::clone(&control);

        let worker = thread::Builder::new()
            .name("agent-runner".to_string())
            .spawn(move || {
                let bot = match factory(config) {
                    Ok(bot) => {
                        let _ = ready_tx.send(Ok(()));
                        bot
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Statistics::default();
                    }
                };
                drive(bot, &worker_control, max_ticks)
            })
            .context("spawning runner thread")?;

        let startup = ready_rx.recv().map_err(|_| anyhow!("runner thread exited during startup"));
        if let Err(err) = startup.and_then(|ready| ready) {
            let _ = worker.join();
            return Err(err);
        }

        Ok(RunnerHandle { control, latest: None, worker: Some(worker) })
    }
}

fn drive<P, A, L>(
    mut bot: BotController<P, A, L>,
    control: &RunnerControl,
    max_ticks: Option<u64>,
) -> Statistics
where
    P: WorldProvider,
    A: Actuator,
    L: LootSelector,
{
    bot.start();
    info!(interval_ms = bot.config().tick_interval_ms, "runner started");
    let mut ticker = FixedRateTicker::new(bot.config().tick_interval(), Instant::now());
    let mut paused = false;
    let mut active_ticks = 0u64;

    while !control.stop.load(Ordering::Acquire) {
        let want_pause = control.paused.load(Ordering::Acquire);
        if want_pause != paused {
            paused = want_pause;
            if paused {
                bot.pause();
            } else {
                bot.resume();
            }
        }

        let report = bot.tick(Instant::now());
        if !paused {
            active_ticks += 1;
        }
        control.publish(bot.status());
        if !paused && report.tick % 200 == 0 {
            debug!(tick = report.tick, state = report.state.as_str(), "runner heartbeat");
        }
        if max_ticks.is_some_and(|limit| active_ticks >= limit) {
            break;
        }

        thread::sleep(ticker.wait(Instant::now()));
    }

    bot.stop();
    let statistics = bot.statistics();
    info!(
        kills = statistics.monsters_killed,
        items = statistics.items_looted,
        maps = statistics.maps_cleared,
        deaths = statistics.deaths,
        "runner stopped"
    );
    statistics
}

/// Control surface for a running agent thread.
pub struct RunnerHandle {
    control: Arc<RunnerControl>,
    latest: Option<StatusSnapshot>,
    worker: Option<thread::JoinHandle<Statistics>>,
}

impl RunnerHandle {
    pub fn pause(&self) {
        self.control.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.control.paused.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|worker| worker.is_finished())
    }

    /// Most recent status published by the runner, if any tick has run.
    pub fn latest_status(&mut self) -> Option<&StatusSnapshot> {
        if let Some(status) = self.control.take_status() {
            self.latest = Some(status);
        }
        self.latest.as_ref()
    }

    /// Requests a cooperative stop and waits for the final counters.
    pub fn stop(mut self) -> Result<Statistics> {
        self.control.stop.store(true, Ordering::Release);
        self.join_worker()
    }

    /// Waits for a tick-limited run to end on its own.
    pub fn join(mut self) -> Result<Statistics> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<Statistics> {
        let worker = self.worker.take().context("runner already joined")?;
        worker.join().map_err(|_| anyhow!("runner thread panicked"))
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.control.stop.store(true, Ordering::Release);
            if worker.join().is_err() {
                warn!("runner thread panicked during shutdown");
            }
        }
    }
}
