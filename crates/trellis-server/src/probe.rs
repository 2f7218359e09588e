//! Startup dependency probe
//!
//! Best-effort warm-up of the backing CRUD API. Exhausting the retry budget
//! is non-fatal: the gateway keeps serving and individual commands fail on
//! their own if the dependency really is down. This is a deliberate
//! availability-over-consistency choice, not a readiness gate.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tracing::{info, warn};

use trellis_crud::CrudApi;

/// Maximum number of probe attempts before giving up.
pub const PROBE_MAX_ATTEMPTS: u32 = 10;

/// Fixed delay between probe attempts.
pub const PROBE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Probe the CRUD API's setup endpoint until it answers or the attempt
/// budget runs out. Returns whether the dependency was reachable.
pub async fn run_startup_probe(
    api: Arc<dyn CrudApi>,
    max_attempts: u32,
    retry_delay: Duration,
) -> bool {
    for attempt in 1..=max_attempts {
        match api.call(Method::GET, "/setup", None).await {
            Ok(_) => {
                info!(
                    "Database table initialized via CRUD API (attempt {}/{})",
                    attempt, max_attempts
                );
                return true;
            }
            Err(e) => {
                warn!(
                    "Database initialization attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                if attempt < max_attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
    warn!(
        "Database initialization failed after {} attempts, continuing without it",
        max_attempts
    );
    false
}
