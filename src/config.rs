//! Runtime configuration.
//!
//! Every setting is a CLI flag with an environment-variable fallback. Nothing
//! secret has a default: selecting the HTTP gateway without an API key is a
//! startup error.

use crate::domain::money::Money;
use crate::error::{RegistryError, Result};
use crate::logging::LoggingArgs;
use chrono::Duration;
use clap::{Args, Parser, ValueEnum};
use rust_decimal::Decimal;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_GRACE_DAYS: u32 = 180;
pub const DEFAULT_INSTALLMENT_DAYS: u32 = 30;
pub const DEFAULT_SCHOLARSHIP_DISCOUNT: u8 = 50;
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Business rules applied by the registrar.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationPolicy {
    /// Subscription length granted at registration.
    pub grace_window: Duration,
    /// Extension granted by each installment.
    pub installment_window: Duration,
    /// Code that grants the scholarship flag; `None` disables scholarships.
    pub scholarship_code: Option<String>,
    pub scholarship_discount_percent: u8,
    pub registration_fee: Money,
    /// Undergraduates pay nothing for their first enrollment.
    pub free_first_course: bool,
    pub gateway_timeout: std::time::Duration,
    pub bcrypt_cost: u32,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            grace_window: Duration::days(i64::from(DEFAULT_GRACE_DAYS)),
            installment_window: Duration::days(i64::from(DEFAULT_INSTALLMENT_DAYS)),
            scholarship_code: None,
            scholarship_discount_percent: DEFAULT_SCHOLARSHIP_DISCOUNT,
            registration_fee: Money::ZERO,
            free_first_course: false,
            gateway_timeout: std::time::Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl RegistrationPolicy {
    /// Whether `code` unlocks the scholarship. Codes compare exactly after trimming.
    pub fn scholarship_matches(&self, code: Option<&str>) -> bool {
        match (&self.scholarship_code, code) {
            (Some(expected), Some(given)) => expected == given.trim(),
            _ => false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Days of access granted at registration
    #[arg(long, env = "GRACE_DAYS", default_value_t = DEFAULT_GRACE_DAYS)]
    pub grace_days: u32,

    /// Days each installment extends the subscription by
    #[arg(long, env = "INSTALLMENT_DAYS", default_value_t = DEFAULT_INSTALLMENT_DAYS)]
    pub installment_days: u32,

    /// Scholarship code; scholarships are disabled when unset
    #[arg(long, env = "SCHOLARSHIP_CODE", hide_env_values = true)]
    pub scholarship_code: Option<String>,

    /// Discount (percent) scholarship students get on course prices
    #[arg(long, env = "SCHOLARSHIP_DISCOUNT_PERCENT", default_value_t = DEFAULT_SCHOLARSHIP_DISCOUNT)]
    pub scholarship_discount_percent: u8,

    /// One-time registration fee, waived for scholarship students
    #[arg(long, env = "REGISTRATION_FEE", default_value = "0")]
    pub registration_fee: Decimal,

    /// Make the first enrollment of undergraduates free
    #[arg(long, env = "FREE_FIRST_COURSE")]
    pub free_first_course: bool,

    /// Seconds to wait for the payment gateway before failing the payment
    #[arg(long, env = "GATEWAY_TIMEOUT_SECS", default_value_t = DEFAULT_GATEWAY_TIMEOUT_SECS)]
    pub gateway_timeout_secs: u64,

    /// bcrypt cost used for password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl PolicyArgs {
    pub fn into_policy(self) -> Result<RegistrationPolicy> {
        if self.grace_days == 0 || self.installment_days == 0 {
            return Err(RegistryError::ConfigError(
                "Grace and installment windows must be at least one day".to_string(),
            ));
        }
        if self.scholarship_discount_percent > 100 {
            return Err(RegistryError::ConfigError(format!(
                "Scholarship discount must be at most 100%, got {}",
                self.scholarship_discount_percent
            )));
        }
        if self.gateway_timeout_secs == 0 {
            return Err(RegistryError::ConfigError(
                "Gateway timeout must be at least one second".to_string(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(RegistryError::ConfigError(format!(
                "bcrypt cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        let scholarship_code = match self.scholarship_code {
            Some(code) if code.trim().is_empty() => {
                return Err(RegistryError::ConfigError(
                    "Scholarship code must not be blank".to_string(),
                ));
            }
            other => other.map(|code| code.trim().to_string()),
        };
        let registration_fee = Money::new(self.registration_fee)
            .map_err(|e| RegistryError::ConfigError(format!("Registration fee: {}", e)))?;

        Ok(RegistrationPolicy {
            grace_window: Duration::days(i64::from(self.grace_days)),
            installment_window: Duration::days(i64::from(self.installment_days)),
            scholarship_code,
            scholarship_discount_percent: self.scholarship_discount_percent,
            registration_fee,
            free_first_course: self.free_first_course,
            gateway_timeout: std::time::Duration::from_secs(self.gateway_timeout_secs),
            bcrypt_cost: self.bcrypt_cost,
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// Charge through the mobile-money provider's HTTP API
    Http,
    /// Approve every charge in-process (development only)
    Mock,
}

#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Payment gateway implementation
    #[arg(long = "gateway", env = "PAYMENT_GATEWAY", value_enum, default_value_t = GatewayKind::Http)]
    pub kind: GatewayKind,

    /// Charge endpoint of the mobile-money provider
    #[arg(long = "gateway-url", env = "PAYMENT_GATEWAY_URL")]
    pub url: Option<String>,

    /// API key of the mobile-money provider
    #[arg(long = "gateway-api-key", env = "PAYMENT_GATEWAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Currency charges are requested in
    #[arg(long = "gateway-currency", env = "PAYMENT_GATEWAY_CURRENCY", default_value = "USD")]
    pub currency: String,
}

/// Validated gateway selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewaySettings {
    Http {
        url: String,
        api_key: String,
        currency: String,
    },
    Mock,
}

impl GatewayArgs {
    pub fn into_settings(self) -> Result<GatewaySettings> {
        match self.kind {
            GatewayKind::Mock => Ok(GatewaySettings::Mock),
            GatewayKind::Http => {
                let api_key = self
                    .api_key
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        RegistryError::ConfigError(
                            "PAYMENT_GATEWAY_API_KEY is required when the HTTP gateway is selected"
                                .to_string(),
                        )
                    })?;
                let url = self
                    .url
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| {
                        RegistryError::ConfigError(
                            "PAYMENT_GATEWAY_URL is required when the HTTP gateway is selected"
                                .to_string(),
                        )
                    })?;
                Ok(GatewaySettings::Http {
                    url,
                    api_key,
                    currency: self.currency,
                })
            }
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 10000)]
    pub port: u16,

    /// Seconds before an HTTP request is aborted
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Bearer token for admin routes; admin routes are disabled when unset
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,
}

impl ServerArgs {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// SQLite database URL (e.g. sqlite://university.db). In-memory storage when unset.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// CSV file of courses to import at startup
    #[arg(long, env = "COURSES_CSV")]
    pub courses: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Akin Online University registration service", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub server: ServerArgs,
    #[command(flatten)]
    pub storage: StorageArgs,
    #[command(flatten)]
    pub gateway: GatewayArgs,
    #[command(flatten)]
    pub policy: PolicyArgs,
    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Everything the service needs, validated once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerArgs,
    pub storage: StorageArgs,
    pub gateway: GatewaySettings,
    pub policy: RegistrationPolicy,
    pub logging: LoggingArgs,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings> {
        Ok(Settings {
            server: self.server,
            storage: self.storage,
            gateway: self.gateway.into_settings()?,
            policy: self.policy.into_policy()?,
            logging: self.logging,
        })
    }
}
