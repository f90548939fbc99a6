//! Process-wide configuration read from environment variables.
//!
//! [`ServiceConfig`] is built once at process start and passed by reference
//! to every client factory. Nothing in this workspace reads the environment
//! after that point.
//!
//! ```rust,no_run
//! use azure_chat_core::config::ServiceConfig;
//!
//! let config = ServiceConfig::from_env();
//! if config.identity.use_managed_identities {
//!     println!("authority: {}", config.identity.authority_host);
//! }
//! ```

use secrecy::SecretString;

/// Authority host used when `AZURE_AUTHORITY_HOST` is not set.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Search endpoint suffix used when `AZURE_SEARCH_ENDPOINT_SUFFIX` is not set.
pub const DEFAULT_SEARCH_ENDPOINT_SUFFIX: &str = "search.windows.net";

/// Environment variable names.
pub mod vars {
    pub const USE_MANAGED_IDENTITIES: &str = "USE_MANAGED_IDENTITIES";
    pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
    pub const AZURE_SEARCH_ENDPOINT_SUFFIX: &str = "AZURE_SEARCH_ENDPOINT_SUFFIX";
    pub const AZURE_SEARCH_API_KEY: &str = "AZURE_SEARCH_API_KEY";
    pub const AZURE_SEARCH_NAME: &str = "AZURE_SEARCH_NAME";
    pub const AZURE_SEARCH_INDEX_NAME: &str = "AZURE_SEARCH_INDEX_NAME";
    pub const AZURE_SEARCH_USE_DIRECT_API: &str = "AZURE_SEARCH_USE_DIRECT_API";
    pub const DEBUG: &str = "DEBUG";
    pub const AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT: &str = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT";
    pub const AZURE_DOCUMENT_INTELLIGENCE_KEY: &str = "AZURE_DOCUMENT_INTELLIGENCE_KEY";
}

/// Identity settings shared by every service.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Use the platform managed identity instead of static keys.
    pub use_managed_identities: bool,
    /// Microsoft Entra authority host.
    pub authority_host: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            use_managed_identities: false,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }
}

/// Azure AI Search settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search resource name, the first label of the endpoint host.
    pub name: Option<String>,
    /// Endpoint host suffix, e.g. `search.windows.net` or `search.azure.us`.
    pub endpoint_suffix: String,
    pub api_key: Option<SecretString>,
    pub index_name: Option<String>,
    /// Route queries through the direct REST strategy.
    pub use_direct_api: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            name: None,
            endpoint_suffix: DEFAULT_SEARCH_ENDPOINT_SUFFIX.to_string(),
            api_key: None,
            index_name: None,
            use_direct_api: false,
        }
    }
}

impl SearchConfig {
    /// The service endpoint, `https://{name}.{endpoint_suffix}`.
    ///
    /// Returns `None` when the resource name is not configured.
    pub fn endpoint(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(|name| format!("https://{name}.{}", self.endpoint_suffix))
    }
}

/// Azure AI Document Intelligence settings.
#[derive(Debug, Clone, Default)]
pub struct DocumentIntelligenceConfig {
    pub endpoint: Option<String>,
    pub key: Option<SecretString>,
}

/// All configuration consumed by the service adapters.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub identity: IdentityConfig,
    pub search: SearchConfig,
    pub document_intelligence: DocumentIntelligenceConfig,
    /// Emit verbose diagnostics (request bodies, constructed clients).
    pub debug: bool,
}

impl ServiceConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Empty and whitespace-only values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let flag = |name: &str| get(name).is_some_and(|value| value == "true");

        let config = Self {
            identity: IdentityConfig {
                use_managed_identities: flag(vars::USE_MANAGED_IDENTITIES),
                authority_host: get(vars::AZURE_AUTHORITY_HOST)
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            },
            search: SearchConfig {
                name: get(vars::AZURE_SEARCH_NAME),
                endpoint_suffix: get(vars::AZURE_SEARCH_ENDPOINT_SUFFIX)
                    .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT_SUFFIX.to_string()),
                api_key: get(vars::AZURE_SEARCH_API_KEY).map(SecretString::from),
                index_name: get(vars::AZURE_SEARCH_INDEX_NAME),
                use_direct_api: flag(vars::AZURE_SEARCH_USE_DIRECT_API),
            },
            document_intelligence: DocumentIntelligenceConfig {
                endpoint: get(vars::AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT),
                key: get(vars::AZURE_DOCUMENT_INTELLIGENCE_KEY).map(SecretString::from),
            },
            debug: flag(vars::DEBUG),
        };

        tracing::info!(
            use_managed_identities = config.identity.use_managed_identities,
            authority_host = %config.identity.authority_host,
            endpoint_suffix = %config.search.endpoint_suffix,
            search_name = ?config.search.name,
            index_name = ?config.search.index_name,
            endpoint = ?config.search.endpoint(),
            use_direct_api = config.search.use_direct_api,
            "loaded service configuration"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServiceConfig::from_lookup(|_| None);

        assert!(!config.identity.use_managed_identities);
        assert_eq!(config.identity.authority_host, DEFAULT_AUTHORITY_HOST);
        assert_eq!(config.search.endpoint_suffix, "search.windows.net");
        assert!(config.search.name.is_none());
        assert!(config.search.api_key.is_none());
        assert!(!config.search.use_direct_api);
        assert!(config.document_intelligence.endpoint.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn reads_all_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("USE_MANAGED_IDENTITIES", "true"),
            ("AZURE_AUTHORITY_HOST", "https://login.microsoftonline.us"),
            ("AZURE_SEARCH_ENDPOINT_SUFFIX", "search.azure.us"),
            ("AZURE_SEARCH_API_KEY", "search-key"),
            ("AZURE_SEARCH_NAME", "contoso"),
            ("AZURE_SEARCH_INDEX_NAME", "chat-index"),
            ("AZURE_SEARCH_USE_DIRECT_API", "true"),
            ("DEBUG", "true"),
            ("AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT", "https://di.cognitiveservices.azure.us"),
            ("AZURE_DOCUMENT_INTELLIGENCE_KEY", "di-key"),
        ]));

        assert!(config.identity.use_managed_identities);
        assert_eq!(config.identity.authority_host, "https://login.microsoftonline.us");
        assert_eq!(config.search.name.as_deref(), Some("contoso"));
        assert_eq!(config.search.index_name.as_deref(), Some("chat-index"));
        assert_eq!(
            config.search.api_key.as_ref().map(|k| k.expose_secret()),
            Some("search-key")
        );
        assert!(config.search.use_direct_api);
        assert!(config.debug);
        assert_eq!(
            config.document_intelligence.key.as_ref().map(|k| k.expose_secret()),
            Some("di-key")
        );
    }

    #[test]
    fn flags_other_than_true_are_false() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("USE_MANAGED_IDENTITIES", "yes"),
            ("DEBUG", "1"),
        ]));
        assert!(!config.identity.use_managed_identities);
        assert!(!config.debug);
    }

    #[test]
    fn flags_match_lowercase_true_exactly() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("USE_MANAGED_IDENTITIES", "True"),
            ("AZURE_SEARCH_USE_DIRECT_API", "TRUE"),
            ("DEBUG", " true "),
        ]));
        assert!(!config.identity.use_managed_identities);
        assert!(!config.search.use_direct_api);
        assert!(!config.debug);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("AZURE_AUTHORITY_HOST", ""),
            ("AZURE_SEARCH_NAME", "   "),
            ("AZURE_SEARCH_API_KEY", ""),
        ]));
        assert_eq!(config.identity.authority_host, DEFAULT_AUTHORITY_HOST);
        assert!(config.search.name.is_none());
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn search_endpoint_combines_name_and_suffix() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("AZURE_SEARCH_NAME", "contoso"),
            ("AZURE_SEARCH_ENDPOINT_SUFFIX", "search.azure.us"),
        ]));
        assert_eq!(
            config.search.endpoint().as_deref(),
            Some("https://contoso.search.azure.us")
        );
        assert!(SearchConfig::default().endpoint().is_none());
    }

    #[test]
    #[serial]
    fn from_env_reads_process_environment() {
        let original = std::env::var(vars::AZURE_SEARCH_NAME).ok();
        std::env::set_var(vars::AZURE_SEARCH_NAME, "from-env");

        let config = ServiceConfig::from_env();
        assert_eq!(config.search.name.as_deref(), Some("from-env"));

        match original {
            Some(val) => std::env::set_var(vars::AZURE_SEARCH_NAME, val),
            None => std::env::remove_var(vars::AZURE_SEARCH_NAME),
        }
    }
}
