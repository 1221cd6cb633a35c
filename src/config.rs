use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL; the in-memory store is used when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Upper bound of the PostgreSQL pool
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Redis connection URL; caching is disabled when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// OMDb API key; metadata enrichment is disabled when unset
    #[serde(default)]
    pub omdb_api_key: Option<String>,

    /// OMDb API base URL
    #[serde(default = "default_omdb_api_url")]
    pub omdb_api_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Page size of the genre browser
    #[serde(default = "default_genre_page_limit")]
    pub genre_page_limit: u32,

    /// Fraction of a title's length after which it counts as watched
    #[serde(default = "default_completion_ratio")]
    pub completion_ratio: f64,

    /// Progress at or beyond this many seconds drops out of "continue watching"
    #[serde(default = "default_continue_watching_cap")]
    pub continue_watching_cap_seconds: u32,
}

fn default_max_connections() -> u32 {
    5
}

fn default_omdb_api_url() -> String {
    "https://www.omdbapi.com".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_genre_page_limit() -> u32 {
    10
}

fn default_completion_ratio() -> f64 {
    0.9
}

fn default_continue_watching_cap() -> u32 {
    // 90% of one hour
    3240
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.genre_page_limit == 0 {
            anyhow::bail!("GENRE_PAGE_LIMIT must be positive");
        }
        if !(self.completion_ratio > 0.0 && self.completion_ratio <= 1.0) {
            anyhow::bail!("COMPLETION_RATIO must be in (0, 1]");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: default_max_connections(),
            redis_url: None,
            omdb_api_key: None,
            omdb_api_url: default_omdb_api_url(),
            host: default_host(),
            port: default_port(),
            genre_page_limit: default_genre_page_limit(),
            completion_ratio: default_completion_ratio(),
            continue_watching_cap_seconds: default_continue_watching_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.port, 3000);
        assert_eq!(config.genre_page_limit, 10);
        assert_eq!(config.continue_watching_cap_seconds, 3240);
        assert!((config.completion_ratio - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/flix".to_string()),
            ("GENRE_PAGE_LIMIT".to_string(), "25".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/flix"));
        assert_eq!(config.genre_page_limit, 25);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let config = Config {
            completion_ratio: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
