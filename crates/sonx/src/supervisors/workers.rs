//! 🧵 Workers: the ones who actually hold the sockets while the Supervisor takes
//! all the credit in the sprint retro.

use anyhow::Result;
use tokio::task::JoinHandle;

mod partition_worker;
pub(super) use partition_worker::PartitionWorker;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
