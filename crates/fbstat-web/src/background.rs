//! Background processing: periodic refresh loop.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use fbstat_core::{MonitorError, WalkSummary};

use crate::state::{SharedState, WebAppInner, release_memory_to_os};

/// Fetches and walks one report. Blocking; call from `spawn_blocking`.
pub(crate) fn refresh(inner: &WebAppInner) -> Result<WalkSummary, MonitorError> {
    let result = inner.monitor.refresh(inner.source.as_ref());
    release_memory_to_os();
    result
}

/// Refreshes on every tick. The first tick fires immediately.
pub(crate) async fn tick_loop(state: SharedState, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut refresh_count: u64 = 0;

    loop {
        tick.tick().await;

        let state_clone = state.clone();
        let t0 = Instant::now();
        let result = tokio::task::spawn_blocking(move || refresh(&state_clone)).await;
        let elapsed = t0.elapsed();

        let summary = match result {
            Ok(Ok(summary)) => summary,
            // Logged by the monitor; retry on the next tick.
            Ok(Err(_)) => continue,
            Err(e) => {
                error!(error = %e, "refresh panicked in spawn_blocking");
                continue;
            }
        };

        refresh_count += 1;
        if refresh_count == 1 {
            info!(
                duration_ms = elapsed.as_millis() as u64,
                gauges = state.registry.len(),
                "first report published"
            );
        } else {
            debug!(
                duration_ms = elapsed.as_millis() as u64,
                refresh_count,
                total_data_pages = summary.stats.total_data_pages,
                "tick completed"
            );
        }

        if elapsed > interval / 2 {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "refresh exceeded 50% of interval"
            );
        }
    }
}
