use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Deadline used when a period does not fit on the clock (about 30 years out).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A timer registration: fire `period` after start, then every `period`
/// again when `repeat` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    pub name: &'static str,
    pub period: Duration,
    pub repeat: bool,
}

/// Accepts timer registrations from an input.
pub trait Scheduler {
    fn schedule(&mut self, timer: Timer);
}

/// The work the timers trigger.
#[async_trait]
pub trait Job: Send {
    async fn run(&mut self);
}

/// Drives registered timers on the tokio clock.
///
/// Every fire runs the job to completion before the next deadline is looked
/// at, so runs never overlap. A run that overshoots pushes the next fire of
/// its timer to one full period after it finished.
#[derive(Debug, Default)]
pub struct TimerScheduler {
    timers: Vec<Timer>,
}

impl Scheduler for TimerScheduler {
    fn schedule(&mut self, timer: Timer) {
        tracing::debug!(
            timer = timer.name,
            period = ?timer.period,
            repeat = timer.repeat,
            "Timer registered."
        );
        self.timers.push(timer);
    }
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Runs `job` on every timer fire until `shutdown` turns true (or its
    /// sender is dropped), or until no timer is left.
    ///
    /// A run in progress is never interrupted; shutdown is only observed
    /// between runs.
    pub async fn run<J: Job>(self, job: &mut J, mut shutdown: watch::Receiver<bool>) {
        let start = Instant::now();
        let mut pending: Vec<(Instant, Timer)> = self
            .timers
            .into_iter()
            .map(|timer| (deadline_after(start, timer.period), timer))
            .collect();

        while let Some(next) = earliest(&pending) {
            let deadline = pending[next].0;
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let (deadline, timer) = pending.swap_remove(next);
            tracing::debug!(timer = timer.name, "Timer fired.");
            job.run().await;

            if timer.repeat {
                let now = Instant::now();
                let mut next_deadline = deadline_after(deadline, timer.period);
                if next_deadline <= now {
                    tracing::warn!(
                        timer = timer.name,
                        period = ?timer.period,
                        "Run took longer than the timer period, delaying the next one."
                    );
                    next_deadline = deadline_after(now, timer.period);
                }
                pending.push((next_deadline, timer));
            }
        }

        tracing::info!("Scheduler stopped.");
    }
}

fn deadline_after(base: Instant, period: Duration) -> Instant {
    base.checked_add(period).unwrap_or_else(|| base + FAR_FUTURE)
}

fn earliest(pending: &[(Instant, Timer)]) -> Option<usize> {
    pending
        .iter()
        .enumerate()
        .min_by_key(|(_, (deadline, _))| *deadline)
        .map(|(index, _)| index)
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which is a shutdown as well.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
