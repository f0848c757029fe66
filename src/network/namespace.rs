//! Owner/app namespaces and REST path construction

/// Owner/app scope of REST endpoints
///
/// With neither component set, endpoints resolve under `/services`;
/// otherwise under `/servicesNS/{owner}/{app}` with `-` as the wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    pub owner: Option<String>,
    pub app: Option<String>,
}

impl Namespace {
    pub fn new(owner: Option<String>, app: Option<String>) -> Self {
        Self { owner, app }
    }

    pub fn is_global(&self) -> bool {
        self.owner.is_none() && self.app.is_none()
    }

    /// Path prefix, without trailing slash
    pub fn prefix(&self) -> String {
        if self.is_global() {
            return "/services".to_string();
        }
        format!(
            "/servicesNS/{}/{}",
            encode_segment(self.owner.as_deref().unwrap_or("-")),
            encode_segment(self.app.as_deref().unwrap_or("-")),
        )
    }

    /// Absolute path for an endpoint relative to this namespace
    pub fn path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.prefix(), endpoint.trim_start_matches('/'))
    }
}

/// Percent-encode one path segment (entity names may contain spaces, `/`, ...)
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_namespace() {
        let ns = Namespace::default();
        assert_eq!(ns.path("saved/searches"), "/services/saved/searches");
    }

    #[test]
    fn test_scoped_namespace() {
        let ns = Namespace::new(Some("admin".into()), None);
        assert_eq!(ns.prefix(), "/servicesNS/admin/-");

        let ns = Namespace::new(Some("nobody".into()), Some("search".into()));
        assert_eq!(
            ns.path("/saved/searches"),
            "/servicesNS/nobody/search/saved/searches"
        );
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(
            encode_segment("Errors in the last 24 hours"),
            "Errors%20in%20the%20last%2024%20hours"
        );
        assert_eq!(encode_segment("a/b"), "a%2Fb");
    }
}
