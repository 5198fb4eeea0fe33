//! Vulnerability lookup client
//!
//! Thin one-shot proxy over the WPVulnerability API: one GET per lookup, the
//! JSON body is reshaped into rows and nothing is cached.

use crate::error::{Error, Result};
use crate::table::{Row, Value};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// User agent for API requests
const USER_AGENT: &str = concat!("wp-inspect/", env!("CARGO_PKG_VERSION"));

/// Request timeout in seconds
const TIMEOUT_SECS: u64 = 30;

/// Default vulnerability API base URL
pub const DEFAULT_API_BASE: &str = "https://www.wpvulnerability.net";

/// Core version file, relative to the content root
pub const VERSION_FILE: &str = "wp-includes/version.php";

/// Allowed URL schemes
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Columns of a vulnerability listing
pub const VULNERABILITY_COLUMNS: [&str; 4] = ["name", "source", "severity", "link"];

/// API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    error: i64,
    message: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    vulnerability: Option<Vec<Vulnerability>>,
}

/// A single published vulnerability
#[derive(Debug, Clone, Deserialize)]
pub struct Vulnerability {
    /// Title, e.g. "WordPress < 6.4.3 - PHP Object Injection"
    pub name: String,
    #[serde(default)]
    source: Vec<VulnerabilitySource>,
    impact: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct VulnerabilitySource {
    id: Option<String>,
    link: Option<String>,
}

impl Vulnerability {
    /// Advisory identifier of the first source, usually a CVE
    pub fn source_id(&self) -> Option<&str> {
        self.source.iter().find_map(|s| s.id.as_deref())
    }

    /// Advisory link of the first source that has one
    pub fn link(&self) -> Option<&str> {
        self.source.iter().find_map(|s| s.link.as_deref())
    }

    /// CVSS severity label, when the API reports one
    pub fn severity(&self) -> Option<&str> {
        self.impact.as_ref()?.pointer("/cvss/severity")?.as_str()
    }

    /// Row with only the fields the API supplied
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("name".to_string(), Value::from(self.name.as_str()));
        let optional = [
            ("source", self.source_id()),
            ("severity", self.severity()),
            ("link", self.link()),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                row.insert(column.to_string(), Value::from(value));
            }
        }
        row
    }
}

/// Vulnerability API client
#[derive(Debug, Clone)]
pub struct VulnerabilityClient {
    client: Client,
    base_url: Url,
}

/// Builder for configuring a VulnerabilityClient
#[derive(Debug)]
pub struct VulnerabilityClientBuilder {
    base_url: String,
    timeout: Duration,
}

impl VulnerabilityClientBuilder {
    /// Create a new builder using the default API base
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(TIMEOUT_SECS),
        }
    }

    /// Use a different API base URL
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Override the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<VulnerabilityClient> {
        let mut base_url =
            Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        if !ALLOWED_SCHEMES.contains(&base_url.scheme()) {
            return Err(Error::InvalidUrl(format!(
                "scheme '{}' not allowed (use http or https)",
                base_url.scheme()
            )));
        }

        // Directory-style base so the configured path reads unambiguously
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(VulnerabilityClient { client, base_url })
    }
}

impl Default for VulnerabilityClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VulnerabilityClient {
    /// Client against the default API
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring client options
    pub fn builder() -> VulnerabilityClientBuilder {
        VulnerabilityClientBuilder::new()
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Known vulnerabilities for a WordPress core version
    pub async fn core(&self, version: &str) -> Result<Vec<Vulnerability>> {
        let response: ApiResponse = self.get_json(self.core_url(version)?).await?;

        if response.error != 0 {
            return Err(Error::Api(
                response
                    .message
                    .unwrap_or_else(|| format!("error code {}", response.error)),
            ));
        }

        Ok(response
            .data
            .and_then(|d| d.vulnerability)
            .unwrap_or_default())
    }

    /// `<base>/core/<version>/`, with the version percent-encoded as one segment
    fn core_url(&self, version: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("core")
            .push(version)
            .push("");
        Ok(url)
    }

    /// GET `url` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!(url = %url, "Fetching");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Read the installed core version from `wp-includes/version.php`
pub fn installed_core_version(root: &Path) -> Result<String> {
    let path = root.join(VERSION_FILE);
    let contents = fs::read_to_string(&path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;
    parse_core_version(&contents).ok_or_else(|| {
        Error::SiteConfig(format!("no $wp_version found in {}", path.display()))
    })
}

/// Extract `$wp_version` from PHP source
fn parse_core_version(contents: &str) -> Option<String> {
    let re = Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]"#).ok()?;
    re.captures(contents)?.get(1).map(|m| m.as_str().to_string())
}
