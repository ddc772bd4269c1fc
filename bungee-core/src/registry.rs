//! The runtime upstream registry: the route -> upstream-list map, rebuilt
//! wholesale from configuration and swapped in atomically so that
//! concurrent readers always see one complete generation or the next, never
//! a mix of the two.
//!
//! Deliberately not a module-level singleton (`static`/`OnceLock`) — callers
//! construct one [`Registry`], wrap it in an `Arc`, and thread it into the
//! selector, driver, and prober. `build_from_config` replaces the single
//! swapped pointer; it never mutates state reachable from an old generation,
//! so in-flight requests holding an `Arc<RouteState>` from the previous
//! generation keep serving from it to completion.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{FailoverConfig, HealthCheckConfig, RouteConfig};
use crate::model::RuntimeUpstream;

/// One route's resolved, immutable-for-this-generation configuration plus
/// its live upstream set.
pub struct RouteState {
    pub path: String,
    pub upstreams: Vec<Arc<RuntimeUpstream>>,
    pub failover: FailoverConfig,
    pub health_check: Option<HealthCheckConfig>,
}

struct Generation {
    routes: HashMap<String, Arc<RouteState>>,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

/// The registry: a single atomically-swapped pointer to the current
/// generation of route state.
pub struct Registry {
    current: ArcSwap<Generation>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Generation::default()),
        }
    }

    /// Replace all state from `routes`. Only routes with `failover.enabled`
    /// and at least one upstream are registered; others bypass the
    /// reliability subsystem entirely.
    pub fn build_from_config(&self, routes: &[RouteConfig]) {
        let mut next = HashMap::new();
        for route in routes {
            if !route.failover.enabled || route.upstreams.is_empty() {
                continue;
            }
            let upstreams = route
                .upstreams
                .iter()
                .map(|u| {
                    Arc::new(RuntimeUpstream::new(
                        u.target.clone(),
                        u.weight,
                        u.priority,
                        u.disabled,
                    ))
                })
                .collect();
            next.insert(
                route.path.clone(),
                Arc::new(RouteState {
                    path: route.path.clone(),
                    upstreams,
                    failover: route.failover.clone(),
                    health_check: route.health_check.clone(),
                }),
            );
        }
        self.current.store(Arc::new(Generation { routes: next }));
        tracing::info!(route_count = self.current.load().routes.len(), "registry generation built");
    }

    /// Look up the current generation's state for `path`, if registered.
    pub fn get_route(&self, path: &str) -> Option<Arc<RouteState>> {
        self.current.load().routes.get(path).cloned()
    }

    /// Visit every registered route in the current generation.
    pub fn for_each_route(&self, mut f: impl FnMut(&Arc<RouteState>)) {
        for route in self.current.load().routes.values() {
            f(route);
        }
    }

    /// Drop all routes, leaving an empty generation.
    pub fn clear(&self) {
        self.current.store(Arc::new(Generation::default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    fn route(path: &str, enabled: bool, upstream_count: usize) -> RouteConfig {
        RouteConfig {
            path: path.to_string(),
            upstreams: (0..upstream_count)
                .map(|i| UpstreamConfig {
                    target: format!("http://u{i}"),
                    weight: 100,
                    priority: 1,
                    disabled: false,
                })
                .collect(),
            failover: FailoverConfig {
                enabled,
                ..FailoverConfig::default()
            },
            health_check: None,
        }
    }

    #[test]
    fn only_enabled_routes_with_upstreams_are_registered() {
        let registry = Registry::new();
        registry.build_from_config(&[
            route("/a", true, 2),
            route("/b", false, 2),
            route("/c", true, 0),
        ]);
        assert!(registry.get_route("/a").is_some());
        assert!(registry.get_route("/b").is_none());
        assert!(registry.get_route("/c").is_none());
    }

    #[test]
    fn build_from_config_replaces_prior_generation_wholesale() {
        let registry = Registry::new();
        registry.build_from_config(&[route("/a", true, 1)]);
        assert!(registry.get_route("/a").is_some());
        registry.build_from_config(&[route("/b", true, 1)]);
        assert!(registry.get_route("/a").is_none());
        assert!(registry.get_route("/b").is_some());
    }

    #[test]
    fn old_generation_handle_keeps_serving_after_swap() {
        let registry = Registry::new();
        registry.build_from_config(&[route("/a", true, 1)]);
        let held = registry.get_route("/a").unwrap();
        registry.build_from_config(&[route("/b", true, 1)]);
        assert_eq!(held.path, "/a");
        assert!(registry.get_route("/a").is_none());
    }

    #[test]
    fn clear_empties_the_registry() {
        let registry = Registry::new();
        registry.build_from_config(&[route("/a", true, 1)]);
        registry.clear();
        assert!(registry.get_route("/a").is_none());
    }
}
