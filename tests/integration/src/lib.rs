//! Integration tests for hmacgate.
//!
//! These tests drive the public API end to end: clients sign `http` requests,
//! servers validate them with configurations served by a `ConfigStore`, and
//! the store is reloaded from disk while requests are being validated.
//!
//! Run them with:
//! ```text
//! cargo test -p hmacgate-integration
//! ```

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use hmacgate_auth::StaticKeyRepository;

mod test_roundtrip;
mod test_store;
mod test_watch;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Key repository shared by the tests.
#[must_use]
pub fn test_keys() -> Arc<StaticKeyRepository> {
    Arc::new(StaticKeyRepository::new(vec![
        ("TestUser".to_owned(), "TestKey".to_owned()),
        ("alice".to_owned(), "alice-secret".to_owned()),
    ]))
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}
