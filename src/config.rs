use std::env;

/// Minimum length for the issuance and admin credentials.
///
/// Both are long-lived shared secrets; anything shorter than 32 characters
/// is refused at startup rather than silently accepted.
const MIN_CREDENTIAL_LEN: usize = 32;

/// Placeholder credentials used when running in dev mode without explicit
/// configuration. Never accepted outside dev mode.
const DEV_ISSUANCE_KEY: &str = "dev-issuance-key-do-not-use-in-production";
const DEV_ADMIN_KEY: &str = "dev-admin-key-do-not-use-in-production";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute for validation/transfer endpoints
    pub standard_rpm: u32,
    /// Requests per minute for lightweight endpoints (health)
    pub relaxed_rpm: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Shared secret gating key issuance
    pub issuance_key: String,
    /// Shared secret gating reissue/revoke, listing and transfer requests
    pub admin_key: String,
    /// Webhook URL that receives issued-key and transfer-code events
    pub notify_webhook_url: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYGATE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let issuance_key = load_credential("KEYGATE_ISSUANCE_KEY", dev_mode, DEV_ISSUANCE_KEY);
        let admin_key = load_credential("KEYGATE_ADMIN_KEY", dev_mode, DEV_ADMIN_KEY);

        let rate_limit = RateLimitConfig {
            standard_rpm: env_u32("RATE_LIMIT_STANDARD_RPM", 30),
            relaxed_rpm: env_u32("RATE_LIMIT_RELAXED_RPM", 60),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "keygate.db".to_string()),
            issuance_key,
            admin_key,
            notify_webhook_url: env::var("KEYGATE_NOTIFY_WEBHOOK_URL").ok(),
            rate_limit,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load a shared-secret credential from the environment.
///
/// Outside dev mode the variable must be set and at least
/// `MIN_CREDENTIAL_LEN` characters; in dev mode a well-known placeholder is
/// substituted when the variable is absent.
fn load_credential(var: &str, dev_mode: bool, dev_fallback: &str) -> String {
    match env::var(var) {
        Ok(value) => {
            let value = value.trim().to_string();
            if value.len() < MIN_CREDENTIAL_LEN {
                panic!("{} must be at least {} characters", var, MIN_CREDENTIAL_LEN);
            }
            value
        }
        Err(_) if dev_mode => dev_fallback.to_string(),
        Err(_) => panic!("{} is required (set KEYGATE_ENV=dev to use dev defaults)", var),
    }
}

fn env_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
