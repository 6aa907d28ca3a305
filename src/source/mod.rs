pub mod synthetic;
pub mod tcp_json;

pub use synthetic::SyntheticSource;
pub use tcp_json::TcpJsonSource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::Tick;

/// A source adapter connects to (or synthesizes) one exchange feed and
/// pushes ticks into a shared sink. Contract:
///
/// - `start` is non-blocking: it spawns its own producer task(s) and
///   returns immediately.
/// - Back-pressure policy is drop-on-full: adapters use `try_send`, never
///   a blocking send, so a full ingress channel never stalls a source.
/// - `stop` is idempotent and releases all resources (network connections,
///   spawned tasks) before returning. No ticks are emitted between a
///   `stop()` returning and a subsequent `start()`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn start(&self, sink: mpsc::Sender<Tick>) -> Result<()>;
    async fn stop(&self);
}
