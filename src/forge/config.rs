//! Configuration for hosting platform connections.
use secrecy::SecretString;

/// Default REST endpoint of the hosting API.
pub const DEFAULT_API_BASE_URI: &str = "https://api.github.com";
/// Username paired with an installation token for git over HTTPS.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Hosting API connection configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URI of the REST API (e.g., "https://api.github.com").
    pub api_base_uri: String,
    /// Installation access token used for API calls.
    pub token: SecretString,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_uri: DEFAULT_API_BASE_URI.to_string(),
            token: SecretString::from("".to_string()),
        }
    }
}
