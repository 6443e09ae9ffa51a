//! Process configuration read from the environment once at start-up.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Which service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Product,
    User,
    Cart,
    Order,
}

impl Service {
    /// Short name, as accepted in `EMPORIUM_SERVICE`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::User => "user",
            Self::Cart => "cart",
            Self::Order => "order",
        }
    }

    /// Path prefix of the service's routes.
    #[must_use]
    pub fn mount_path(self) -> &'static str {
        match self {
            Self::Product => "/product-service",
            Self::User => "/user-service",
            Self::Cart => "/cart-service",
            Self::Order => "/order-service",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "user" => Ok(Self::User),
            "cart" => Ok(Self::Cart),
            "order" => Ok(Self::Order),
            other => Err(AppError::Config(format!(
                "EMPORIUM_SERVICE must be one of product, user, cart, order (got {other:?})"
            ))),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service: Service,
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory document store.
    pub database_url: Option<String>,
    /// Comma-separated bootstrap servers. `None` selects the in-memory log.
    pub broker_url: Option<String>,
    pub client_id: String,
    pub publish_timeout: Duration,
    pub handler_timeout: Duration,
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service: Service = non_empty("EMPORIUM_SERVICE")
            .ok_or_else(|| {
                AppError::Config("EMPORIUM_SERVICE environment variable must be set".into())
            })?
            .parse()?;
        let host = non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let client_id =
            non_empty("BROKER_CLIENT_ID").unwrap_or_else(|| format!("{}-service", service.name()));

        Ok(Self {
            service,
            host,
            port,
            database_url: non_empty("DATABASE_URL"),
            broker_url: non_empty("BROKER_URL"),
            client_id,
            publish_timeout: millis(&non_empty, "BROKER_PUBLISH_TIMEOUT_MS", 5_000)?,
            handler_timeout: millis(&non_empty, "BROKER_HANDLER_TIMEOUT_MS", 30_000)?,
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_millis(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(AppError::Config(format!(
            "{key} must be a positive number of milliseconds"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_for_order_service() {
        let config = config_from(&[("EMPORIUM_SERVICE", "order")]).unwrap();

        assert_eq!(config.service, Service::Order);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.client_id, "order-service");
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.handler_timeout, Duration::from_secs(30));
        assert!(config.database_url.is_none());
        assert!(config.broker_url.is_none());
    }

    #[test]
    fn test_overrides_are_read() {
        let config = config_from(&[
            ("EMPORIUM_SERVICE", "Cart"),
            ("PORT", "8081"),
            ("BROKER_URL", "kafka-1:9092,kafka-2:9092"),
            ("BROKER_CLIENT_ID", "cart-eu"),
            ("BROKER_PUBLISH_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.service, Service::Cart);
        assert_eq!(config.port, 8081);
        assert_eq!(config.broker_url.as_deref(), Some("kafka-1:9092,kafka-2:9092"));
        assert_eq!(config.client_id, "cart-eu");
        assert_eq!(config.publish_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_service_is_config_error() {
        let result = config_from(&[]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_unknown_service_is_config_error() {
        let result = config_from(&[("EMPORIUM_SERVICE", "billing")]);

        match result.unwrap_err() {
            AppError::Config(message) => assert!(message.contains("billing")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = config_from(&[
            ("EMPORIUM_SERVICE", "user"),
            ("BROKER_HANDLER_TIMEOUT_MS", "0"),
        ]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
