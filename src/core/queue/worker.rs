use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

use crate::core::queue::Queue;

/// Spawns the recurring tick loop for `queue`.
///
/// The loop only holds a weak reference, so it ends on its own once the
/// queue is dropped. Each tick runs on its own task; a slow consumer never
/// delays the next tick for other keys.
pub(super) fn spawn(runtime: &Handle, queue: &Arc<Queue>) -> JoinHandle<()> {
    let weak = Arc::downgrade(queue);
    let period = queue.interval();
    let id = queue.id().to_string();
    let tasks = runtime.clone();

    runtime.spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(queue) = weak.upgrade() else {
                break;
            };
            if queue.pending_len() == 0 {
                continue;
            }
            tasks.spawn(async move {
                queue.tick().await;
            });
        }

        trace!(queue = %id, "worker loop exited");
    })
}
