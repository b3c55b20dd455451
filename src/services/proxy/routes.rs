//! Static route table: path prefix → upstream service base URL.

use axum::http::Uri;
use url::Url;

use crate::services::proxy::client::ProxyError;

#[derive(Debug, Clone)]
struct Route {
    prefix: String,
    upstream: Url,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    // longest prefix first
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = (String, Url)>) -> Self {
        let mut routes: Vec<Route> = routes
            .into_iter()
            .map(|(prefix, upstream)| Route {
                prefix: prefix.trim_end_matches('/').to_string(),
                upstream,
            })
            .collect();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// Longest prefix on a segment boundary: `/api/orders` serves `/api/orders`
    /// and `/api/orders/7`, never `/api/ordersfoo`.
    pub fn resolve(&self, path: &str) -> Option<&Url> {
        self.routes
            .iter()
            .find(|r| match path.strip_prefix(r.prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || r.prefix.is_empty(),
                None => false,
            })
            .map(|r| &r.upstream)
    }

    /// Target URI on the upstream: base URL plus the original path and query.
    pub fn target_uri(&self, uri: &Uri) -> Result<Uri, ProxyError> {
        let upstream = self.resolve(uri.path()).ok_or(ProxyError::NoRoute)?;
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

        let base = upstream.as_str().trim_end_matches('/');
        format!("{base}{path_and_query}")
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new([
            ("/api/users".to_string(), Url::parse("http://users:8081").unwrap()),
            ("/api/users/admin/".to_string(), Url::parse("http://admin:9000/v2").unwrap()),
            ("/api/orders".to_string(), Url::parse("http://orders:8083/").unwrap()),
        ])
    }

    #[test]
    fn resolves_on_segment_boundaries() {
        let t = table();

        assert_eq!(t.resolve("/api/orders").unwrap().host_str(), Some("orders"));
        assert_eq!(t.resolve("/api/orders/12/items").unwrap().host_str(), Some("orders"));
        assert!(t.resolve("/api/ordersfoo").is_none());
        assert!(t.resolve("/api/payments").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let t = table();

        assert_eq!(t.resolve("/api/users/admin/stats").unwrap().host_str(), Some("admin"));
        assert_eq!(t.resolve("/api/users/42").unwrap().host_str(), Some("users"));
    }

    #[test]
    fn target_keeps_path_and_query() {
        let t = table();

        let uri: Uri = "/api/orders/7?expand=items".parse().unwrap();
        assert_eq!(
            t.target_uri(&uri).unwrap().to_string(),
            "http://orders:8083/api/orders/7?expand=items"
        );

        let uri: Uri = "/api/users/admin/stats".parse().unwrap();
        assert_eq!(
            t.target_uri(&uri).unwrap().to_string(),
            "http://admin:9000/v2/api/users/admin/stats"
        );
    }

    #[test]
    fn unknown_path_has_no_target() {
        let uri: Uri = "/nowhere".parse().unwrap();
        assert!(matches!(table().target_uri(&uri), Err(ProxyError::NoRoute)));
    }
}
