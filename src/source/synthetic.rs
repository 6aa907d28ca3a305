use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{GENERATOR_INTERVAL_SECS, SYMBOL_UNIVERSE, TEST_EXCHANGES};
use crate::error::Result;
use crate::source::SourceAdapter;
use crate::types::Tick;

/// TEST-mode synthetic generator. Once per second, emits one
/// tick per symbol in the universe, per virtual exchange, with price drawn
/// uniformly from (1, 101) — matching the original generator's
/// `rand.Float64()*100 + 1`.
pub struct SyntheticSource {
    token: CancellationToken,
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SourceAdapter for SyntheticSource {
    async fn start(&self, sink: mpsc::Sender<Tick>) -> Result<()> {
        let mut set = JoinSet::new();
        for &exchange in TEST_EXCHANGES {
            let token = self.token.clone();
            let sink = sink.clone();
            let exchange = exchange.to_string();
            set.spawn(async move { generate_for_exchange(exchange, sink, token).await });
        }
        *self.tasks.lock().await = Some(set);
        Ok(())
    }

    async fn stop(&self) {
        self.token.cancel();
        if let Some(mut set) = self.tasks.lock().await.take() {
            while set.join_next().await.is_some() {}
        }
    }
}

async fn generate_for_exchange(exchange: String, sink: mpsc::Sender<Tick>, token: CancellationToken) {
    debug!(exchange = %exchange, "synthetic generator started");
    let mut interval = tokio::time::interval(Duration::from_secs(GENERATOR_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(exchange = %exchange, "synthetic generator stopped");
                return;
            }
            _ = interval.tick() => {
                emit_tick_batch(&exchange, &sink);
            }
        }
    }
}

fn emit_tick_batch(exchange: &str, sink: &mpsc::Sender<Tick>) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let mut rng = rand::thread_rng();
    for &symbol in SYMBOL_UNIVERSE {
        let price = rng.gen_range(1.0..101.0);
        let tick = Tick {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            price,
            event_time: now,
        };
        if sink.try_send(tick).is_err() {
            warn!(exchange = %exchange, symbol, "ingress channel full, test tick dropped");
        }
    }
}
