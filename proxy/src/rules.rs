use crate::config::Route;
use std::sync::Arc;

/// Ordered route table, immutable after load. The first matching rule in
/// table order decides the target; later rules never shadow earlier ones.
#[derive(Clone)]
pub struct RouteTable {
    routes: Arc<Vec<Route>>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }

    /// Finds the first route matching the request's host and path.
    pub fn find(&self, host: Option<&str>, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| matches(route, host, path))
    }
}

fn matches(route: &Route, host: Option<&str>, path: &str) -> bool {
    if let Some(expected_host) = &route.r#match.host {
        match host {
            Some(host) => {
                // Strip port if present for comparison
                let host_without_port = host.split(':').next().unwrap_or(host);
                if !host_without_port.eq_ignore_ascii_case(expected_host) {
                    return false;
                }
            }
            None => return false,
        }
    }

    if let Some(prefix) = &route.r#match.path_prefix
        && !path.starts_with(prefix.as_str())
    {
        return false;
    }

    true
}

/// Applies the route's optional rewrite: strip the matched prefix and
/// substitute the replacement.
pub fn rewrite_path(route: &Route, path: &str) -> String {
    match (&route.rewrite, &route.r#match.path_prefix) {
        (Some(replacement), Some(prefix)) if path.starts_with(prefix.as_str()) => {
            format!("{replacement}{}", &path[prefix.len()..])
        }
        _ => path.to_string(),
    }
}
