//! Terminal diagnostics for the launcher itself (not the tailed
//! gcloud output; that goes through the sink and the rotating file).

use std::sync::atomic::{AtomicBool, Ordering};

mod macros;

static PRINT_ENABLED: AtomicBool = AtomicBool::new(true);

/// Silence (or re-enable) the `info!`/`err!`/`pt!` macros.
/// Useful when a TUI owns the terminal.
pub fn set_print(enabled: bool) {
    PRINT_ENABLED.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn is_print() -> bool {
    PRINT_ENABLED.load(Ordering::Relaxed)
}
