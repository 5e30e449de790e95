use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use dotenvy::dotenv;
use url::Url;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Process-wide settings, read once before the listener starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub fetch_timeout: Duration,
    pub llm_timeout: Duration,
    pub max_upload_bytes: usize,
    pub insecure_tls: bool,
    pub youtube_base_url: Url,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .context("OPENAI_API_KEY must be set")?;

        Ok(Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
                .parse()
                .context("BIND_ADDR must be a socket address")?,
            openai_api_key,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            fetch_timeout: secs_var("FETCH_TIMEOUT_SECS", 20)?,
            llm_timeout: secs_var("LLM_TIMEOUT_SECS", 60)?,
            max_upload_bytes: match env::var("MAX_UPLOAD_BYTES") {
                Ok(raw) => raw
                    .parse()
                    .context("MAX_UPLOAD_BYTES must be a valid number")?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },
            insecure_tls: env::var("FETCH_INSECURE_TLS").as_deref() == Ok("1"),
            youtube_base_url: Url::parse(
                &env::var("YOUTUBE_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_YOUTUBE_BASE_URL.to_string()),
            )
            .context("YOUTUBE_BASE_URL must be a valid URL")?,
        })
    }

    /// Settings suitable for tests; the provider and YouTube point at `base`.
    #[cfg(test)]
    pub fn for_tests(base: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            openai_api_key: "test-key".to_string(),
            openai_base_url: base.trim_end_matches('/').to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(5),
            llm_timeout: Duration::from_secs(5),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            insecure_tls: false,
            youtube_base_url: Url::parse(base).unwrap(),
        }
    }
}

fn secs_var(name: &str, default: u64) -> Result<Duration> {
    let secs = match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a whole number of seconds", name))?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn missing_api_key_fails_fast() {
        let saved = env::var("OPENAI_API_KEY").ok();

        env::remove_var("OPENAI_API_KEY");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY must be set"));

        env::set_var("OPENAI_API_KEY", "   ");
        assert!(Config::from_env().is_err());

        match saved {
            Some(key) => env::set_var("OPENAI_API_KEY", key),
            None => env::remove_var("OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_the_key_is_set() {
        let saved = env::var("OPENAI_API_KEY").ok();
        env::set_var("OPENAI_API_KEY", "sk-test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        if env::var("OPENAI_MODEL").is_err() {
            assert_eq!(config.openai_model, DEFAULT_OPENAI_MODEL);
        }
        if env::var("LLM_TIMEOUT_SECS").is_err() {
            assert_eq!(config.llm_timeout, Duration::from_secs(60));
        }
        assert!(!config.openai_base_url.ends_with('/'));

        match saved {
            Some(key) => env::set_var("OPENAI_API_KEY", key),
            None => env::remove_var("OPENAI_API_KEY"),
        }
    }
}
