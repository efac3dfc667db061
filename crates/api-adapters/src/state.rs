use std::sync::Arc;

use domains::{Allowlist, SessionResolver};
use services::{Backends, Site};

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub site: Site,
    pub backends: Backends,
    pub resolver: Arc<dyn SessionResolver>,
    pub allowlist: Arc<Allowlist>,
}

impl AppState {
    pub fn new(backends: Backends, resolver: Arc<dyn SessionResolver>, allowlist: Allowlist) -> Self {
        Self {
            site: Site::new(Arc::clone(&backends.client), Arc::clone(&backends.clock)),
            backends,
            resolver,
            allowlist: Arc::new(allowlist),
        }
    }
}
