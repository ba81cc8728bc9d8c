//! The one-second countdown behind a pinned view.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

crate::define_seq_type!(u64, TimerGeneration);

/// Owns at most one running tick task.
///
/// Every tick carries the generation it was started with, so a tick that
/// was already queued when the timer got replaced can be told apart from
/// the current ones.
#[derive(Debug)]
pub struct CountdownTimer {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking for `generation`, aborting any previous task first.
    pub fn start(&mut self, generation: TimerGeneration, ticks: mpsc::UnboundedSender<TimerGeneration>) {
        self.cancel();

        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(generation).is_err() {
                    break;
                }
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<TimerGeneration>) -> Vec<TimerGeneration> {
        let mut out = Vec::new();
        while let Ok(generation) = rx.try_recv() {
            out.push(generation);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        timer.start(TimerGeneration::new(1), tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(drain(&mut rx), vec![TimerGeneration::new(1); 3]);
        assert!(timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        timer.start(TimerGeneration::new(1), tx.clone());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.start(TimerGeneration::new(2), tx);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(
            drain(&mut rx),
            vec![TimerGeneration::new(1), TimerGeneration::new(2), TimerGeneration::new(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = CountdownTimer::new(Duration::from_secs(1));
        timer.start(TimerGeneration::new(7), tx);
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(drain(&mut rx).is_empty());
        assert!(!timer.is_active());
    }
}
