use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the invoice intake server.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores document embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for invoice documents.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Endpoint of the remote OCR service used to extract invoice text.
    pub ocr_endpoint: String,
    /// Base URL of the OpenAI-compatible embeddings API.
    pub embedding_endpoint: String,
    /// Optional bearer token for the embeddings API.
    pub embedding_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the audit database REST interface.
    pub audit_db_url: String,
    /// Service key for the audit database.
    pub audit_db_key: String,
    /// Shared secret used to verify inbound CCC webhook signatures.
    pub ccc_webhook_secret: String,
    /// Which CCC environment outbound posts are sent to.
    pub ccc_env: CccEnv,
    /// Production CCC API base URL.
    pub ccc_prod_base: String,
    /// Production CCC API bearer token.
    pub ccc_prod_token: String,
    /// Sandbox CCC API base URL.
    pub ccc_sandbox_base: String,
    /// Sandbox CCC API bearer token.
    pub ccc_sandbox_token: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Request timeout applied to every outbound HTTP call, in seconds.
    pub request_timeout_secs: u64,
    /// Default number of documents returned by a semantic query.
    pub query_default_top_k: usize,
    /// Upper bound applied to caller-supplied `topK` values.
    pub query_max_top_k: usize,
}

/// CCC claims API environments selectable at deploy time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CccEnv {
    /// Live claims API.
    Production,
    /// Partner sandbox.
    Sandbox,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            ocr_endpoint: load_env("OCR_ENDPOINT")?,
            embedding_endpoint: load_env("EMBEDDING_ENDPOINT")?,
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            audit_db_url: load_env("AUDIT_DB_URL")?,
            audit_db_key: load_env("AUDIT_DB_KEY")?,
            ccc_webhook_secret: load_env("CCC_WEBHOOK_SECRET")?,
            ccc_env: load_env("CCC_ENV")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("CCC_ENV".to_string()))?,
            ccc_prod_base: load_env("CCC_PROD_BASE")?,
            ccc_prod_token: load_env("CCC_PROD_TOKEN")?,
            ccc_sandbox_base: load_env("CCC_SANDBOX_BASE")?,
            ccc_sandbox_token: load_env("CCC_SANDBOX_TOKEN")?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            request_timeout_secs: load_env_optional("REQUEST_TIMEOUT_SECS")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".into()))
                })
                .transpose()?
                .unwrap_or(30),
            query_default_top_k: load_env_optional("QUERY_DEFAULT_TOP_K")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("QUERY_DEFAULT_TOP_K".into()))
                })
                .transpose()?
                .unwrap_or(5),
            query_max_top_k: load_env_optional("QUERY_MAX_TOP_K")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("QUERY_MAX_TOP_K".into()))
                })
                .transpose()?
                .unwrap_or(50),
        })
    }

    /// Base URL and bearer token for the selected CCC environment.
    pub fn ccc_credentials(&self) -> (&str, &str) {
        match self.ccc_env {
            CccEnv::Production => (&self.ccc_prod_base, &self.ccc_prod_token),
            CccEnv::Sandbox => (&self.ccc_sandbox_base, &self.ccc_sandbox_token),
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl std::str::FromStr for CccEnv {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        ccc_env = ?config.ccc_env,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::CccEnv;

    #[test]
    fn ccc_env_parses_known_variants() {
        assert_eq!("production".parse::<CccEnv>(), Ok(CccEnv::Production));
        assert_eq!("Sandbox".parse::<CccEnv>(), Ok(CccEnv::Sandbox));
        assert!("staging".parse::<CccEnv>().is_err());
    }
}
