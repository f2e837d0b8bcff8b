//! Keeps CPU-hungry external processes from oversubscribing the machine.

use std::sync::LazyLock;

use tokio::sync::Semaphore;

use crate::prelude::*;

/// One permit per core, shared by every `tesseract` and `pdftocairo` run.
static CPU_SEMAPHORE: LazyLock<Semaphore> =
    LazyLock::new(|| Semaphore::new(num_cpus::get().max(1)));

/// Run `f` once a core is free.
///
/// Concurrent `tools/call` requests each render and OCR pages, and both
/// tools want a full core. In-process decoding goes through
/// [`crate::async_utils::spawn_blocking_propagating_panics`] instead.
#[instrument(level = "trace", skip_all)]
pub async fn with_cpu_semaphore<Func, Fut, R>(f: Func) -> Result<R>
where
    Func: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let _permit = CPU_SEMAPHORE
        .acquire()
        .await
        .context("CPU semaphore was closed")?;
    trace!(free = CPU_SEMAPHORE.available_permits(), "holding CPU permit");
    f().await
}
