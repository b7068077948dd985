
use std::fmt;

use super::ConfigError;

pub const ASTRA_DB_APPLICATION_TOKEN: &str = "ASTRA_DB_APPLICATION_TOKEN";
pub const ASTRA_DB_URL: &str = "ASTRA_DB_URL";
pub const ASTRA_DB_NAMESPACE: &str = "ASTRA_DB_NAMESPACE";
pub const ASTRA_DB_COLLECTION: &str = "ASTRA_DB_COLLECTION";
pub const OPEN_AI_KEY: &str = "OPEN_AI_KEY";

/// Credentials and identifiers that must come from the environment.
///
/// All of them are required and none has a default. Validation happens once,
/// at startup, and reports every missing variable at the same time.
#[derive(Clone, PartialEq, Eq)]
pub struct Secrets {
    pub astra_token: String,
    pub astra_url: String,
    pub astra_keyspace: String,
    pub collection: String,
    pub openai_api_key: String,
}

impl Secrets {
    /// Read the required variables from the process environment
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Validate the required variables through an arbitrary lookup.
    ///
    /// A variable only counts as set when it is present and not blank.
    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |name: &str| {
            match lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
            {
                Some(value) => value,
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let secrets = Self {
            astra_token: require(ASTRA_DB_APPLICATION_TOKEN),
            astra_url: require(ASTRA_DB_URL),
            astra_keyspace: require(ASTRA_DB_NAMESPACE),
            collection: require(ASTRA_DB_COLLECTION),
            openai_api_key: require(OPEN_AI_KEY),
        };

        if missing.is_empty() {
            Ok(secrets)
        } else {
            Err(ConfigError::MissingVariables(missing))
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("astra_token", &mask_secret(&self.astra_token))
            .field("astra_url", &self.astra_url)
            .field("astra_keyspace", &self.astra_keyspace)
            .field("collection", &self.collection)
            .field("openai_api_key", &mask_secret(&self.openai_api_key))
            .finish()
    }
}

/// Hide all but the last four characters of a secret
#[inline]
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
