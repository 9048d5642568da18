//! Configuration management for microservices

use crate::error::{ConsultlineError, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_bind: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let http_bind = env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        http_bind
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ConsultlineError::Config(format!("Invalid HTTP_BIND: {}", e)))?;

        Ok(Self { http_bind })
    }
}

/// Read an environment variable and parse it, falling back to `default` when unset
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConsultlineError::Config(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default_and_parse() {
        assert_eq!(env_or("CONSULTLINE_TEST_UNSET_VAR", 42u32).unwrap(), 42);

        env::set_var("CONSULTLINE_TEST_NUMERIC_VAR", " 7 ");
        assert_eq!(env_or("CONSULTLINE_TEST_NUMERIC_VAR", 0u32).unwrap(), 7);

        env::set_var("CONSULTLINE_TEST_BAD_VAR", "seven");
        let err = env_or("CONSULTLINE_TEST_BAD_VAR", 0u32).unwrap_err();
        assert!(matches!(err, ConsultlineError::Config(_)));
    }

    #[test]
    fn test_service_config_rejects_bad_bind() {
        env::set_var("HTTP_BIND", "not-an-address");
        assert!(matches!(ServiceConfig::from_env(), Err(ConsultlineError::Config(_))));
        env::set_var("HTTP_BIND", "127.0.0.1:9000");
        assert_eq!(ServiceConfig::from_env().unwrap().http_bind, "127.0.0.1:9000");
        env::remove_var("HTTP_BIND");
    }
}
