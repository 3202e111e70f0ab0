/// Connection settings for the agents service.
///
/// `endpoint` is the project endpoint, e.g.
/// `https://<account>.services.ai.azure.com/api/projects/<project>`.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Project endpoint URL.
    pub endpoint: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Bearer token sent with every request, if any.
    pub access_token: Option<String>,
}

impl ServiceConfig {
    /// The API version used when none is configured.
    pub const DEFAULT_API_VERSION: &str = "2025-05-01";

    /// Build a config for `endpoint` with the default API version and no token.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: Self::DEFAULT_API_VERSION.to_owned(),
            access_token: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// The endpoint with any trailing slashes removed.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Host part of the endpoint, used in log lines.
    ///
    /// Returns `None` if the endpoint has no `scheme://host` shape.
    pub fn host(&self) -> Option<&str> {
        let rest = self.endpoint.split_once("://")?.1;
        rest.split(['/', '?']).next().filter(|s| !s.is_empty())
    }
}

// The token must never end up in logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_version() {
        let cfg = ServiceConfig::new("https://example.services.ai.azure.com/api/projects/p");
        assert_eq!(cfg.api_version, "2025-05-01");
        assert!(cfg.access_token.is_none());
    }

    #[test]
    fn base_url_trims_trailing_slashes() {
        let cfg = ServiceConfig::new("https://example.test/api/projects/p//");
        assert_eq!(cfg.base_url(), "https://example.test/api/projects/p");
    }

    #[test]
    fn host_extraction() {
        let cfg = ServiceConfig::new("https://acct.services.ai.azure.com/api/projects/p");
        assert_eq!(cfg.host(), Some("acct.services.ai.azure.com"));
        assert_eq!(ServiceConfig::new("not a url").host(), None);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ServiceConfig::new("https://example.test").with_access_token("secret-token");
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
