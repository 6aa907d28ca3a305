use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RECONNECT_BACKOFF_SECS;
use crate::error::Result;
use crate::source::SourceAdapter;
use crate::types::{RawTickLine, Tick};

/// Newline-delimited JSON TCP source. Dials `addr`, reads
/// one JSON object per line, tags every parsed tick with `exchange`.
/// Reconnects with a fixed backoff on any I/O error or EOF; malformed lines
/// are logged and skipped without closing the connection.
pub struct TcpJsonSource {
    exchange: String,
    addr: String,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    dropped_ticks: Arc<AtomicU64>,
}

impl TcpJsonSource {
    pub fn new(exchange: String, addr: String) -> Self {
        Self {
            exchange,
            addr,
            token: CancellationToken::new(),
            handle: Mutex::new(None),
            dropped_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SourceAdapter for TcpJsonSource {
    async fn start(&self, sink: mpsc::Sender<Tick>) -> Result<()> {
        let exchange = self.exchange.clone();
        let addr = self.addr.clone();
        let token = self.token.clone();
        let dropped = Arc::clone(&self.dropped_ticks);

        let handle = tokio::spawn(async move {
            reconnect_loop(exchange, addr, sink, token, dropped).await;
        });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.token.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn reconnect_loop(
    exchange: String,
    addr: String,
    sink: mpsc::Sender<Tick>,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
) {
    loop {
        if token.is_cancelled() {
            return;
        }

        match connect_once(&exchange, &addr, &sink, &token, &dropped).await {
            Ok(()) => debug!(exchange = %exchange, "TCP feed closed cleanly"),
            Err(e) => warn!(exchange = %exchange, "TCP feed error: {e}"),
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(RECONNECT_BACKOFF_SECS)) => {}
        }
    }
}

async fn connect_once(
    exchange: &str,
    addr: &str,
    sink: &mpsc::Sender<Tick>,
    token: &CancellationToken,
    dropped: &Arc<AtomicU64>,
) -> std::io::Result<()> {
    let stream = TcpStream::connect(addr).await?;
    let mut lines = BufReader::new(stream).lines();

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            line = lines.next_line() => {
                match line? {
                    Some(text) => handle_line(&text, exchange, sink, dropped),
                    None => return Ok(()),
                }
            }
        }
    }
}

fn handle_line(text: &str, exchange: &str, sink: &mpsc::Sender<Tick>, dropped: &Arc<AtomicU64>) {
    let raw: RawTickLine = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(exchange = %exchange, "malformed JSON line, skipping: {e}");
            return;
        }
    };

    let tick = Tick {
        symbol: raw.symbol,
        exchange: exchange.to_string(),
        price: raw.price,
        event_time: raw.timestamp,
    };

    if sink.try_send(tick).is_err() {
        dropped.fetch_add(1, Ordering::Relaxed);
    }
}
