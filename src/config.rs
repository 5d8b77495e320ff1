use anyhow::Context;

/// Runtime settings for the warranty service, read from the environment
/// once at startup. Only DATABASE_URL is mandatory; the bind address and
/// pool size have defaults suitable for local runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3000";
const DEFAULT_MAX_CONNECTIONS: &str = "10";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| DEFAULT_MAX_CONNECTIONS.to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: var("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .context("PORT must be a valid number")?,
        })
    }
}
