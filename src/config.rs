use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expires_days: i64,
    pub db_min_connections: u32,
    pub db_max_connections: u32,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5000);
        let jwt_expires_days = env::var("JWT_EXPIRES_DAYS")
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(7);
        let db_min_connections = env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(2);
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(10);

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_expires_days,
            db_min_connections,
            db_max_connections,
            mail: MailConfig::from_env(),
        })
    }
}

impl MailConfig {
    // Missing credentials are not an error: the mailer degrades to a logging no-op.
    fn from_env() -> Option<Self> {
        let username = env::var("MAIL_USER").ok()?;
        let password = env::var("MAIL_PASS").ok()?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        let host = env::var("MAIL_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let port = env::var("MAIL_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        let from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "\"ZeroShift\" <noreply@zeroshift.com>".to_string());
        Some(Self {
            host,
            port,
            username,
            password,
            from,
        })
    }
}
