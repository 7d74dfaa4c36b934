use secrecy::{ExposeSecret, SecretString};

/// Marker a provider URL must contain before the live backend is used.
pub const PROVIDER_MARKER: &str = "supabase";

/// Identity provider settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub provider_url: String,
    pub provider_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(provider_url: String, provider_key: SecretString) -> Self {
        Self {
            provider_url,
            provider_key,
        }
    }

    /// Both settings are present and the URL points at the hosted provider.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.provider_url.trim().is_empty()
            && !self.provider_key.expose_secret().trim().is_empty()
            && self.provider_url.contains(PROVIDER_MARKER)
    }
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self::new(String::new(), SecretString::default())
    }
}
