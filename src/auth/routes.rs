//! Static route classification.
//!
//! Paths are categorized against fixed, ordered pattern tables. Protected
//! and user-context-API are independent classifications; auth-only and
//! public are mutually exclusive with protected (a path must not appear in
//! both lists). Asset and framework-internal paths bypass classification
//! entirely and must be checked before any other rule, or asset requests
//! issued from a login page would redirect-loop.

/// Routes that require authentication.
const PROTECTED_ROUTES: &[&str] = &["/profile", "/editor", "/bookmarks"];

/// Routes that redirect already-authenticated users away.
const AUTH_ROUTES: &[&str] = &["/login", "/signup", "/forgot-password"];

/// Routes served without any session requirement.
const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/search",
    "/article",
    "/maintenance",
    "/unauthorized",
    "/api",
    "/robots.txt",
    "/sitemap.xml",
];

/// API prefixes whose upstream handlers consume the injected identity
/// headers.
const USER_CONTEXT_API_ROUTES: &[&str] = &[
    "/api/auth",
    "/api/users",
    "/api/posts",
    "/api/social",
    "/api/uploads",
];

/// Classification of a request path. `protected` and `needs_user_context`
/// are independent flags; `auth_only` and `public` never co-occur with
/// `protected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteClass {
    pub protected: bool,
    pub auth_only: bool,
    pub public: bool,
    pub needs_user_context: bool,
}

/// Whether the path is a static asset or framework-internal route that the
/// gate forwards untouched.
pub fn is_asset_path(path: &str) -> bool {
    path.starts_with("/_next/") || path.starts_with("/static/") || path.contains('.')
}

/// Classify a request path. Callers must check [`is_asset_path`] first;
/// classification of an asset path is meaningless.
pub fn classify(path: &str) -> RouteClass {
    RouteClass {
        protected: matches_route(path, PROTECTED_ROUTES),
        auth_only: matches_route(path, AUTH_ROUTES),
        public: matches_route(path, PUBLIC_ROUTES),
        needs_user_context: matches_route(path, USER_CONTEXT_API_ROUTES),
    }
}

/// Check a path against a pattern table.
///
/// A pattern matches when the path equals it exactly or extends it with a
/// `/`-separated suffix. A trailing `*` turns the pattern into a plain
/// prefix match. Bracketed segments (`/article/[id]`) match any single
/// non-empty path segment in that position.
fn matches_route(path: &str, routes: &[&str]) -> bool {
    routes.iter().any(|route| {
        if let Some(prefix) = route.strip_suffix('*') {
            return path.starts_with(prefix);
        }
        if route.contains('[') {
            return matches_dynamic_route(path, route);
        }
        path == *route || path.starts_with(&format!("{}/", route))
    })
}

/// Positional match for patterns with bracketed segments.
fn matches_dynamic_route(path: &str, route: &str) -> bool {
    let route_segments: Vec<&str> = route.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    if route_segments.len() != path_segments.len() {
        return false;
    }
    route_segments
        .iter()
        .zip(&path_segments)
        .all(|(pattern, segment)| {
            if pattern.starts_with('[') && pattern.ends_with(']') {
                !segment.is_empty()
            } else {
                pattern == segment
            }
        })
}
