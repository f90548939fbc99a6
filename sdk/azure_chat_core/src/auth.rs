//! Credential selection.
//!
//! Every adapter authenticates either with a static service key or with the
//! platform managed identity. [`CredentialResolver`] picks one from the
//! [`IdentityConfig`](crate::config::IdentityConfig); the resulting
//! [`AzureCredential`] is turned into a request header by
//! [`ServiceClient`](crate::client::ServiceClient).

use crate::config::IdentityConfig;
use secrecy::{ExposeSecret, SecretString};

/// Host fragment identifying the US Government authority.
const US_GOVERNMENT_AUTHORITY: &str = "login.microsoftonline.us";

/// Credential used to authenticate against an Azure service.
#[derive(Clone)]
pub enum AzureCredential {
    /// Static service key, sent in a service-specific header.
    ApiKey(SecretString),

    /// Managed identity token bound to an authority host.
    ManagedIdentity { authority_host: String },
}

/// Which credential variant is in use, without the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    ApiKey,
    ManagedIdentity,
}

impl std::fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => f.write_str("API Key"),
            Self::ManagedIdentity => f.write_str("Managed Identities"),
        }
    }
}

impl AzureCredential {
    /// Create an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(SecretString::from(key.into()))
    }

    /// Create a managed identity credential.
    pub fn managed_identity(authority_host: impl Into<String>) -> Self {
        Self::ManagedIdentity {
            authority_host: authority_host.into(),
        }
    }

    pub fn mode(&self) -> CredentialMode {
        match self {
            Self::ApiKey(_) => CredentialMode::ApiKey,
            Self::ManagedIdentity { .. } => CredentialMode::ManagedIdentity,
        }
    }

    /// The cloud this credential authenticates against.
    ///
    /// Static keys carry no authority and always report the public cloud.
    pub fn cloud(&self) -> AzureCloud {
        match self {
            Self::ApiKey(_) => AzureCloud::Public,
            Self::ManagedIdentity { authority_host } => {
                AzureCloud::from_authority_host(authority_host)
            }
        }
    }

    /// Returns `true` when this is an API key credential with an empty key.
    pub fn is_empty_key(&self) -> bool {
        match self {
            Self::ApiKey(key) => key.expose_secret().is_empty(),
            Self::ManagedIdentity { .. } => false,
        }
    }
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "AzureCredential::ApiKey(****)"),
            Self::ManagedIdentity { authority_host } => write!(
                f,
                "AzureCredential::ManagedIdentity {{ authority_host: {authority_host} }}"
            ),
        }
    }
}

impl PartialEq for AzureCredential {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ApiKey(a), Self::ApiKey(b)) => a.expose_secret() == b.expose_secret(),
            (
                Self::ManagedIdentity { authority_host: a },
                Self::ManagedIdentity { authority_host: b },
            ) => a == b,
            _ => false,
        }
    }
}

impl Eq for AzureCredential {}

/// Azure cloud, used to pick token scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureCloud {
    Public,
    UsGovernment,
}

impl AzureCloud {
    pub fn from_authority_host(authority_host: &str) -> Self {
        if authority_host
            .to_ascii_lowercase()
            .contains(US_GOVERNMENT_AUTHORITY)
        {
            Self::UsGovernment
        } else {
            Self::Public
        }
    }

    /// Token scope for Azure AI Search.
    pub fn search_scope(self) -> &'static str {
        match self {
            Self::Public => "https://search.azure.com/.default",
            Self::UsGovernment => "https://search.azure.us/.default",
        }
    }

    /// Token scope for Cognitive Services (Document Intelligence).
    pub fn cognitive_services_scope(self) -> &'static str {
        match self {
            Self::Public => "https://cognitiveservices.azure.com/.default",
            Self::UsGovernment => "https://cognitiveservices.azure.us/.default",
        }
    }
}

/// Chooses between a static key and the managed identity.
#[derive(Debug, Clone, Copy)]
pub struct CredentialResolver<'a> {
    identity: &'a IdentityConfig,
    debug: bool,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(identity: &'a IdentityConfig) -> Self {
        Self {
            identity,
            debug: false,
        }
    }

    /// Also log the resolved (redacted) credential.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Resolve the credential for a service whose static key is `api_key`.
    ///
    /// With managed identities enabled the key is ignored. Otherwise the key
    /// is used as-is, and an unset key becomes an empty one.
    pub fn resolve(&self, api_key: Option<&SecretString>) -> AzureCredential {
        let credential = if self.identity.use_managed_identities {
            AzureCredential::ManagedIdentity {
                authority_host: self.identity.authority_host.clone(),
            }
        } else {
            AzureCredential::ApiKey(
                api_key
                    .cloned()
                    .unwrap_or_else(|| SecretString::from(String::new())),
            )
        };

        tracing::info!(mode = %credential.mode(), "resolving credential");
        if self.debug {
            tracing::info!(credential = ?credential, "credential obtained");
        }

        credential
    }
}
