use url::Url;

/// Hosts the gateway is willing to fetch from.
///
/// A URL is allowed when its lowercased host contains one of the configured
/// domains as a substring, so `imgur.com` admits `i.imgur.com`. URLs that do
/// not parse, or have no host, are never allowed.
#[derive(Debug, Clone, Default)]
pub struct DomainAllowList {
    domains: Vec<String>,
}

impl DomainAllowList {
    /// Build an allow-list. Entries are trimmed and lowercased; blank entries are dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|domain| domain.as_ref().trim().to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        Self { domains }
    }

    /// Parse a comma-separated list such as `imgur.com,unsplash.com`.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Check whether `source_url` points at an allowed host.
    pub fn is_allowed(&self, source_url: &str) -> bool {
        let Ok(parsed) = Url::parse(source_url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        let host = host.to_ascii_lowercase();
        self.domains.iter().any(|domain| host.contains(domain.as_str()))
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
