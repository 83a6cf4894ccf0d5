//! Shared application state and memory management.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Returns pages freed by a refresh to the operating system.
#[cfg(not(target_env = "msvc"))]
pub(crate) fn release_memory_to_os() {
    unsafe {
        // MALLCTL_ARENAS_ALL = 4096: purge dirty pages from every arena, not
        // just the one the blocking thread used.
        tikv_jemalloc_sys::mallctl(
            c"arena.4096.purge".as_ptr().cast(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
        );
    }
}

#[cfg(target_env = "msvc")]
pub(crate) fn release_memory_to_os() {}

use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;

use fbstat_core::DatabaseMonitor;
use fbstat_core::collector::StatisticsSource;
use fbstat_core::metrics::GaugeRegistry;

pub(crate) struct WebAppInner {
    pub(crate) monitor: DatabaseMonitor,
    pub(crate) registry: Arc<GaugeRegistry>,
    pub(crate) source: Box<dyn StatisticsSource>,
    pub(crate) interval: Duration,
}

pub(crate) type SharedState = Arc<WebAppInner>;

pub(crate) type AppState = State<SharedState>;
