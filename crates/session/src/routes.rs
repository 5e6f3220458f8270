//! Route table: maps request paths onto destinations and the guard.
//!
//! | path              | kind      |
//! |-------------------|-----------|
//! | `/login`          | public    |
//! | `/validate-role`  | public    |
//! | `/developer/*`    | protected |
//! | `/admin/*`        | protected |
//! | `/vendor/*`       | protected |
//! | `/unauthorized`   | public    |
//! | `/`               | redirect to login |
//! | anything else     | redirect to `/`   |

use serde::{Deserialize, Serialize};

use tenantgate_core::{DomainError, DomainResult};

use crate::guard::{GuardDecision, RouteGuard};
use crate::navigation::Destination;
use crate::store::SessionSnapshot;

/// Base paths of every destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePaths {
    pub login: String,
    pub validate_role: String,
    pub developer: String,
    pub admin: String,
    pub vendor: String,
    pub unauthorized: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            validate_role: "/validate-role".to_string(),
            developer: "/developer".to_string(),
            admin: "/admin".to_string(),
            vendor: "/vendor".to_string(),
            unauthorized: "/unauthorized".to_string(),
        }
    }
}

impl RoutePaths {
    pub fn path(&self, destination: Destination) -> &str {
        match destination {
            Destination::Login => &self.login,
            Destination::ValidateRole => &self.validate_role,
            Destination::DeveloperHome => &self.developer,
            Destination::AdminHome => &self.admin,
            Destination::VendorHome => &self.vendor,
            Destination::Unauthorized => &self.unauthorized,
        }
    }

    fn entries(&self) -> [(Destination, &str); 6] {
        [
            (Destination::Login, self.login.as_str()),
            (Destination::ValidateRole, self.validate_role.as_str()),
            (Destination::DeveloperHome, self.developer.as_str()),
            (Destination::AdminHome, self.admin.as_str()),
            (Destination::VendorHome, self.vendor.as_str()),
            (Destination::Unauthorized, self.unauthorized.as_str()),
        ]
    }

    /// Every path must be absolute, not the root, and distinct.
    pub fn validate(&self) -> DomainResult<()> {
        let entries = self.entries();
        for (i, (destination, path)) in entries.iter().enumerate() {
            if !path.starts_with('/') || *path == "/" || path.ends_with('/') {
                return Err(DomainError::validation(format!(
                    "{destination} path {path:?} must be absolute, non-root and without a trailing slash"
                )));
            }
            if entries[..i].iter().any(|(_, other)| other == path) {
                return Err(DomainError::validation(format!(
                    "{destination} path {path:?} is used twice"
                )));
            }
            // A protected prefix would capture the path before it is matched.
            let shadowed = entries.iter().enumerate().find(|(j, (other, base))| {
                *j != i && other.is_protected() && is_under(path, base)
            });
            if let Some((_, (other, base))) = shadowed {
                return Err(DomainError::validation(format!(
                    "{destination} path {path:?} lies under the {other} prefix {base:?}"
                )));
            }
        }
        Ok(())
    }
}

/// `path` equals `base` or is a sub-path of it.
fn is_under(path: &str, base: &str) -> bool {
    path.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// How a path is served, after following redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch {
    Public(Destination),
    Protected(Destination),
    Redirect(Destination),
}

/// What the caller should do for a requested path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Render(Destination),
    Redirect(Destination),
    /// Session restore still running; show a neutral placeholder.
    Pending,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    paths: RoutePaths,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(RoutePaths::default())
    }
}

impl RouteTable {
    pub fn new(paths: RoutePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &RoutePaths {
        &self.paths
    }

    pub fn path(&self, destination: Destination) -> &str {
        self.paths.path(destination)
    }

    pub fn match_path(&self, raw: &str) -> RouteMatch {
        let path = normalize(raw);

        for (destination, base) in self.paths.entries() {
            if destination.is_protected() {
                if is_under(path, base) {
                    return RouteMatch::Protected(destination);
                }
            } else if path == base {
                return RouteMatch::Public(destination);
            }
        }

        if path != "/" {
            tracing::debug!(path = %raw, "unknown route; redirecting to root");
        }
        // Root redirects to login; unknown paths redirect to root.
        RouteMatch::Redirect(Destination::Login)
    }

    /// Match `path` and apply the route guard to protected destinations.
    pub fn admit(&self, path: &str, snapshot: &SessionSnapshot) -> Admission {
        match self.match_path(path) {
            RouteMatch::Public(destination) => Admission::Render(destination),
            RouteMatch::Redirect(destination) => Admission::Redirect(destination),
            RouteMatch::Protected(destination) => match RouteGuard::new(destination).evaluate(snapshot) {
                GuardDecision::Pending => Admission::Pending,
                GuardDecision::Redirect(to) => Admission::Redirect(to),
                GuardDecision::Render(destination) => Admission::Render(*destination),
            },
        }
    }
}

/// Drop query/fragment and trailing slashes (keeping the root).
fn normalize(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = raw[..end].trim_end_matches('/');
    if path.is_empty() { "/" } else { path }
}
