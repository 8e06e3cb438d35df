use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::PlayerEvent;

/// Countdown that pauses playback when it reaches zero. The ticking task
/// only nudges the core once a second; the core owns the deadline.
#[derive(Default)]
pub struct SleepTimer {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl SleepTimer {
    /// Start (or restart) the countdown and return the total in seconds.
    pub fn start(&mut self, minutes: u32, tx: mpsc::Sender<PlayerEvent>) -> anyhow::Result<u64> {
        if minutes == 0 {
            anyhow::bail!("sleep timer needs at least one minute");
        }
        self.cancel();

        let total = u64::from(minutes) * 60;
        let now = Instant::now();
        let token = CancellationToken::new();
        self.deadline = Some(now + Duration::from_secs(total));
        self.cancel = Some(token.clone());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(now + Duration::from_secs(1), Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(PlayerEvent::SleepTick).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("sleep timer task exiting");
        });
        Ok(total)
    }

    /// Stop the countdown. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        self.deadline = None;
        match self.cancel.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<u64> {
        self.deadline.map(|d| remaining_secs(d, now))
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Whole seconds left, rounded up.
pub fn remaining_secs(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    (left.as_millis() as u64).div_ceil(1000)
}
