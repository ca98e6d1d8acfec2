use std::sync::{Mutex, MutexGuard, OnceLock};

static SINK_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Jobs share the process-wide log sink state; tests that run jobs hold this lock.
pub fn lock_sink() -> MutexGuard<'static, ()> {
    SINK_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner())
}
