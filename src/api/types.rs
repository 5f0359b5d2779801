//! Shared types for the admin API layer.

use std::sync::Arc;

use uuid::Uuid;

use crate::admin::{AdminClient, ViewGenerations};
use crate::backend::Backend;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    /// Request-scoped access (publishable key); resolves bearer tokens.
    pub backend: Arc<dyn Backend>,
    /// Privileged access for administrative mutations.
    pub admin: Arc<AdminClient>,
    pub views: Arc<ViewGenerations>,
}

impl ApiContext {
    pub fn new(backend: Arc<dyn Backend>, admin: Arc<AdminClient>) -> Self {
        Self {
            backend,
            admin,
            views: Arc::new(ViewGenerations::new()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Caller context, injected by auth middleware
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub email: Option<String>,
}
