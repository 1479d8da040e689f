use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Payment processor settings. Loaded once at startup and treated as
/// read-only for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Merchant code assigned by the processor
    pub merchant_code: String,
    /// Shared secret for HMAC-SHA512 request signing
    pub hash_secret: String,
    /// Hosted payment page the buyer is redirected to
    pub pay_url: String,
    /// API endpoint for out-of-band status query and refund calls
    pub api_url: String,
    /// URL the processor redirects back to after payment
    pub return_url: String,
    /// Locale code sent with payment requests (e.g. "en")
    pub locale: String,
    /// Currency code for all payments
    pub currency: String,
    /// Timeout for outbound processor calls, in seconds
    pub timeout_secs: u64,
    /// Kill switch: when false every purchase attempt is rejected
    pub purchasing_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let gateway = GatewayConfig {
            merchant_code: env::var("GATEWAY_MERCHANT_CODE")
                .context("GATEWAY_MERCHANT_CODE not set")?,
            hash_secret: env::var("GATEWAY_HASH_SECRET").context("GATEWAY_HASH_SECRET not set")?,
            pay_url: env::var("GATEWAY_PAY_URL").context("GATEWAY_PAY_URL not set")?,
            api_url: env::var("GATEWAY_API_URL").context("GATEWAY_API_URL not set")?,
            return_url: env::var("GATEWAY_RETURN_URL").context("GATEWAY_RETURN_URL not set")?,
            locale: env::var("GATEWAY_LOCALE").unwrap_or_else(|_| "en".to_string()),
            currency: env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "VND".to_string()),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("GATEWAY_TIMEOUT_SECS must be a valid number")?,
            purchasing_enabled: env::var("PURCHASING_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("PURCHASING_ENABLED must be true or false")?,
        };

        let config = Config {
            server,
            database,
            gateway,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.gateway.merchant_code.trim().is_empty() {
            return Err(anyhow!("GATEWAY_MERCHANT_CODE cannot be empty"));
        }

        if self.gateway.hash_secret.trim().is_empty() {
            return Err(anyhow!("GATEWAY_HASH_SECRET cannot be empty"));
        }

        for (name, value) in [
            ("GATEWAY_PAY_URL", &self.gateway.pay_url),
            ("GATEWAY_API_URL", &self.gateway.api_url),
            ("GATEWAY_RETURN_URL", &self.gateway.return_url),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{} cannot be empty", name));
            }
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(anyhow!("{} must be an http(s) URL, got {}", name, value));
            }
        }

        if self.gateway.timeout_secs == 0 {
            return Err(anyhow!("GATEWAY_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/edupay".to_string(),
                max_connections: 20,
            },
            gateway: GatewayConfig {
                merchant_code: "MERCH001".to_string(),
                hash_secret: "secret".to_string(),
                pay_url: "https://pay.example.com/paymentv2/vpcpay.html".to_string(),
                api_url: "https://pay.example.com/merchant_webapi/api/transaction".to_string(),
                return_url: "https://edupay.example.com/api/payments/return".to_string(),
                locale: "en".to_string(),
                currency: "VND".to_string(),
                timeout_secs: 30,
                purchasing_enabled: true,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_low_port() {
        let mut config = test_config();
        config.server.port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_secret() {
        let mut config = test_config();
        config.gateway.hash_secret = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let mut config = test_config();
        config.gateway.pay_url = "ftp://pay.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_environment() {
        let mut config = test_config();
        config.server.environment = "qa".to_string();
        assert!(config.validate().is_err());
    }
}
