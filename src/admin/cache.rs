//! Invalidation of cached rendered views after a mutation.

use std::collections::HashMap;
use std::sync::Mutex;

pub const ADMIN_USERS_PATH: &str = "/admin/users";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Anything holding rendered views keyed by path.
pub trait ViewCache: Send + Sync {
    fn invalidate(&self, path: &str);
}

/// Per-path generation counters. A renderer caches a view together with the
/// generation it saw and re-renders once the counter moves.
#[derive(Default)]
pub struct ViewGenerations {
    generations: Mutex<HashMap<String, u64>>,
}

impl ViewGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self, path: &str) -> u64 {
        self.generations
            .lock()
            .map(|g| g.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl ViewCache for ViewGenerations {
    fn invalidate(&self, path: &str) {
        match self.generations.lock() {
            Ok(mut g) => {
                *g.entry(path.to_string()).or_insert(0) += 1;
                tracing::debug!(path, "view invalidated");
            }
            Err(_) => tracing::warn!(path, "view cache lock poisoned; invalidation dropped"),
        }
    }
}

/// Paths whose rendering depends on one profile.
pub fn profile_view_paths(profile_id: &uuid::Uuid) -> Vec<String> {
    vec![
        ADMIN_USERS_PATH.to_string(),
        format!("{ADMIN_USERS_PATH}/{profile_id}"),
        DASHBOARD_PATH.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_bumps_only_that_path() {
        let cache = ViewGenerations::new();
        assert_eq!(cache.generation(ADMIN_USERS_PATH), 0);
        cache.invalidate(ADMIN_USERS_PATH);
        cache.invalidate(ADMIN_USERS_PATH);
        assert_eq!(cache.generation(ADMIN_USERS_PATH), 2);
        assert_eq!(cache.generation(DASHBOARD_PATH), 0);
    }

    #[test]
    fn profile_paths_include_detail_view() {
        let id = uuid::Uuid::nil();
        let paths = profile_view_paths(&id);
        assert!(paths.contains(&format!("/admin/users/{id}")));
        assert_eq!(paths.len(), 3);
    }
}
