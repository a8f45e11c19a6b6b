//! Shared online/offline flag.
//!
//! Set by the host (OS network events) and updated from gateway outcomes:
//! a response marks the terminal online, a transient failure marks it
//! offline. The resolver consults it before going remote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Connectivity {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::AcqRel);
        if was != online {
            info!(online = online, "Connectivity changed");
        }
    }

    /// Updates the flag from a gateway outcome.
    pub fn observe<T>(&self, result: &Result<T, GatewayError>) {
        match result {
            Err(e) if e.is_transient() => self.set_online(false),
            _ => self.set_online(true),
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_outcomes() {
        let connectivity = Connectivity::default();
        let shared = connectivity.clone();

        connectivity.observe::<()>(&Err(GatewayError::TransientNetwork("timeout".into())));
        assert!(!shared.is_online());

        // Any answer from the server, even a refusal, proves the link is up.
        connectivity.observe::<()>(&Err(GatewayError::NotFound("x".into())));
        assert!(shared.is_online());

        shared.set_online(false);
        connectivity.observe(&Ok(1));
        assert!(connectivity.is_online());
    }
}
