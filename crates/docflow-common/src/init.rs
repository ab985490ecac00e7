//! Process-wide initialization

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the process environment.
///
/// Loads variables from a `.env` file if one exists. Safe to call multiple
/// times; only the first call has any effect.
pub fn initialize_environment() {
    INIT.call_once(|| {
        dotenvy::dotenv().ok();
    });
}
