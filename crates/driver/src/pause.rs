use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Time-bounded "monitoring paused" flag shared by one run's monitors and
/// driver. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct MonitorPause {
    until: Arc<Mutex<Option<Instant>>>,
}

impl MonitorPause {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses monitor faults for `window`. Never shortens an active pause.
    pub fn pause_for(&self, window: Duration) {
        let deadline = Instant::now() + window;
        let mut until = self.until.lock();
        if until.map_or(true, |current| current < deadline) {
            *until = Some(deadline);
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.until.lock().is_some_and(|deadline| Instant::now() < deadline)
    }

    pub fn resume(&self) {
        *self.until.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_expires() {
        let pause = MonitorPause::new();
        assert!(!pause.is_paused());

        pause.pause_for(Duration::from_secs(30));
        assert!(pause.is_paused());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(pause.is_paused());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!pause.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_pause_does_not_cut_longer_one() {
        let pause = MonitorPause::new();
        pause.pause_for(Duration::from_secs(60));
        pause.pause_for(Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(pause.is_paused());

        pause.resume();
        assert!(!pause.is_paused());
    }

    #[test]
    fn test_clones_share_state() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let pause = MonitorPause::new();
            let shared = pause.clone();
            pause.pause_for(Duration::from_secs(1));
            assert!(shared.is_paused());
        });
    }
}
