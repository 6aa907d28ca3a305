use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::config::LiveFeed;
use crate::error::Result;
use crate::source::{SourceAdapter, SyntheticSource, TcpJsonSource};
use crate::types::{Mode, Tick};

/// One running source group: every adapter started for the currently active
/// mode, kept around so a subsequent `set_mode` can stop them cleanly.
struct ActiveGroup {
    mode: Mode,
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

/// Owns the lifetime of the currently active source group and swaps
/// LIVE↔TEST atomically. `set_mode` is serialized by holding
/// the lock for the full swap: cancel and await the old group, then start
/// the new one, before publishing the new mode.
pub struct ModeManager {
    state: Mutex<ActiveGroup>,
    live_feeds: Vec<LiveFeed>,
    sink: mpsc::Sender<Tick>,
}

impl ModeManager {
    /// Constructs the manager and immediately activates LIVE mode.
    pub async fn start(live_feeds: Vec<LiveFeed>, sink: mpsc::Sender<Tick>) -> Result<Self> {
        let manager = Self {
            state: Mutex::new(ActiveGroup {
                mode: Mode::Live,
                adapters: Vec::new(),
            }),
            live_feeds,
            sink,
        };
        manager.set_mode(Mode::Live).await?;
        Ok(manager)
    }

    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        let mut group = self.state.lock().await;

        for adapter in group.adapters.drain(..) {
            adapter.stop().await;
        }

        let adapters = self.build_group(mode).await?;
        group.adapters = adapters;
        group.mode = mode;
        info!(mode = %mode, "mode switched");
        Ok(())
    }

    pub async fn get_mode(&self) -> Mode {
        self.state.lock().await.mode
    }

    async fn build_group(&self, mode: Mode) -> Result<Vec<Arc<dyn SourceAdapter>>> {
        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        match mode {
            Mode::Live => {
                for feed in &self.live_feeds {
                    let adapter: Arc<dyn SourceAdapter> =
                        Arc::new(TcpJsonSource::new(feed.exchange.clone(), feed.addr.clone()));
                    adapter.start(self.sink.clone()).await?;
                    adapters.push(adapter);
                }
            }
            Mode::Test => {
                let adapter: Arc<dyn SourceAdapter> = Arc::new(SyntheticSource::new());
                adapter.start(self.sink.clone()).await?;
                adapters.push(adapter);
            }
        }
        Ok(adapters)
    }

    /// Stops every adapter in the currently active group. Used at shutdown.
    pub async fn shutdown(&self) {
        let mut group = self.state.lock().await;
        for adapter in group.adapters.drain(..) {
            adapter.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn initial_mode_is_live() {
        let (tx, _rx) = mpsc::channel(16);
        let manager = ModeManager::start(Vec::new(), tx).await.unwrap();
        assert_eq!(manager.get_mode().await, Mode::Live);
    }

    #[tokio::test]
    async fn swap_to_test_publishes_new_mode_and_emits_ticks() {
        let (tx, mut rx) = mpsc::channel(64);
        let manager = ModeManager::start(Vec::new(), tx).await.unwrap();

        manager.set_mode(Mode::Test).await.unwrap();
        assert_eq!(manager.get_mode().await, Mode::Test);

        let tick = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("generator should emit within 2s")
            .expect("channel open");
        assert!(crate::config::TEST_EXCHANGES.contains(&tick.exchange.as_str()));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn swap_back_to_live_stops_test_generator() {
        let (tx, mut rx) = mpsc::channel(64);
        let manager = ModeManager::start(Vec::new(), tx).await.unwrap();
        manager.set_mode(Mode::Test).await.unwrap();
        // drain whatever the generator already emitted
        let _ = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;

        manager.set_mode(Mode::Live).await.unwrap();
        assert_eq!(manager.get_mode().await, Mode::Live);

        // No LIVE feeds configured in this test, so no further ticks of any
        // kind should arrive — and definitely none tagged with a TEST
        // exchange name.
        let res = tokio::time::timeout(Duration::from_millis(1500), rx.recv()).await;
        if let Ok(Some(tick)) = res {
            assert!(!crate::config::TEST_EXCHANGES.contains(&tick.exchange.as_str()));
        }
    }
}
