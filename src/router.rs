//! Path router: explicit routes first, naming convention second.
//!
//! An explicit [`Route`] maps a literal path prefix to an actor and action.
//! Routes are tried in registration order and the first match wins; every
//! path segment after the prefix becomes a positional parameter.
//!
//! When no explicit route matches, the path itself names the target:
//!
//! ```text
//! /users/show/5
//!   │     │   └── params  ["5"]
//!   │     └────── action  "Show"   (defaults to "Index")
//!   └──────────── actor   "Users"
//! ```
//!
//! The router only names things. Whether `Users` or `Show` exist is decided
//! by the [`App`](crate::App) that owns the actor registry.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Actor and action used for an empty path and for a missing action segment.
pub const DEFAULT_NAME: &str = "Index";

/// Routing failures. All of them surface as `404`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no actor named `{0}`")]
    ActorNotFound(String),

    #[error("actor `{actor}` has no action `{action}`")]
    ActionNotFound { actor: String, action: String },

    #[error("invalid route `{path}`: {reason}")]
    Invalid { path: String, reason: String },
}

/// An explicit route definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub actor: String,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    DEFAULT_NAME.to_owned()
}

impl Route {
    pub fn new(path: &str, actor: &str, action: &str) -> Self {
        Self { path: path.to_owned(), actor: actor.to_owned(), action: action.to_owned() }
    }
}

/// The outcome of routing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub actor: String,
    pub action: String,
    pub params: Vec<String>,
}

struct CompiledRoute {
    route: Route,
    pattern: Regex,
}

/// The path router. Build it once at startup.
#[derive(Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an explicit route. Routes match in the order they are pushed.
    pub fn push(&mut self, route: Route) -> Result<(), RouteError> {
        let prefix = route.path.trim_end_matches('/');
        if !route.path.starts_with('/') {
            return Err(RouteError::Invalid {
                path: route.path.clone(),
                reason: "path must start with `/`".to_owned(),
            });
        }
        let pattern = Regex::new(&format!("^{}((?:/[^/]+)*)/?$", regex::escape(prefix)))
            .map_err(|e| RouteError::Invalid { path: route.path.clone(), reason: e.to_string() })?;
        self.routes.push(CompiledRoute { route, pattern });
        Ok(())
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|r| &r.route)
    }

    /// Resolves `path` to an actor, an action and positional parameters.
    pub fn resolve(&self, path: &str) -> Resolution {
        for compiled in &self.routes {
            if let Some(caps) = compiled.pattern.captures(path) {
                let rest = caps.get(1).map_or("", |m| m.as_str());
                return Resolution {
                    actor: compiled.route.actor.clone(),
                    action: compiled.route.action.clone(),
                    params: segments(rest).map(str::to_owned).collect(),
                };
            }
        }
        by_convention(path)
    }
}

fn by_convention(path: &str) -> Resolution {
    let mut parts = segments(path);
    let actor = parts.next().map_or_else(|| DEFAULT_NAME.to_owned(), capitalize);
    let action = parts.next().map_or_else(|| DEFAULT_NAME.to_owned(), capitalize);
    Resolution { actor, action, params: parts.map(str::to_owned).collect() }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Upper-cases the first character: `users` → `Users`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(actor: &str, action: &str, params: &[&str]) -> Resolution {
        Resolution {
            actor: actor.to_owned(),
            action: action.to_owned(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn convention_splits_actor_action_and_params() {
        let router = Router::new();
        assert_eq!(router.resolve("/users/show/5"), resolution("Users", "Show", &["5"]));
        assert_eq!(router.resolve("/users"), resolution("Users", "Index", &[]));
        assert_eq!(router.resolve("/"), resolution("Index", "Index", &[]));
        assert_eq!(router.resolve("//users//list/a/b/"), resolution("Users", "List", &["a", "b"]));
    }

    #[test]
    fn explicit_route_matches_prefix_and_collects_segments() {
        let mut router = Router::new();
        router.push(Route::new("/api/users", "UserRepository", "Index")).unwrap();

        assert_eq!(router.resolve("/api/users"), resolution("UserRepository", "Index", &[]));
        assert_eq!(router.resolve("/api/users/"), resolution("UserRepository", "Index", &[]));
        assert_eq!(
            router.resolve("/api/users/7/orders"),
            resolution("UserRepository", "Index", &["7", "orders"])
        );
    }

    #[test]
    fn explicit_route_does_not_match_a_longer_literal() {
        let mut router = Router::new();
        router.push(Route::new("/api/users", "UserRepository", "Index")).unwrap();
        // `/api/usersx` is not `/api/users` followed by segments.
        assert_eq!(router.resolve("/api/usersx"), resolution("Api", "Usersx", &[]));
    }

    #[test]
    fn first_matching_route_wins() {
        let mut router = Router::new();
        router.push(Route::new("/shop", "Shop", "Index")).unwrap();
        router.push(Route::new("/shop/cart", "Cart", "Index")).unwrap();
        assert_eq!(router.resolve("/shop/cart/3"), resolution("Shop", "Index", &["cart", "3"]));
    }

    #[test]
    fn regex_metacharacters_in_paths_are_literal() {
        let mut router = Router::new();
        router.push(Route::new("/v1.0/items", "Items", "Index")).unwrap();
        assert_eq!(router.resolve("/v1.0/items/2").actor, "Items");
        assert_eq!(router.resolve("/v1x0/items/2").actor, "V1x0");
    }

    #[test]
    fn relative_route_paths_are_rejected() {
        let mut router = Router::new();
        let err = router.push(Route::new("users", "Users", "Index")).unwrap_err();
        assert!(matches!(err, RouteError::Invalid { .. }));
    }

    #[test]
    fn capitalize_only_touches_the_first_character() {
        assert_eq!(capitalize("orderItems"), "OrderItems");
        assert_eq!(capitalize(""), "");
    }
}
