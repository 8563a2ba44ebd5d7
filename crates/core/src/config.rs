use std::fmt;

/// Default table the collector writes to.
pub const DEFAULT_TABLE_NAME: &str = "spot_market_data";

/// Default REST base of the MEXC spot API.
pub const DEFAULT_API_BASE: &str = "https://api.mexc.com/api/v3";

/// Errors raised while assembling configuration. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Parse a boolean setting. Accepts `true/1/yes/y/on` and `false/0/no/n/off`,
/// case-insensitively; anything else is an error.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("invalid boolean value: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// A plain SQL identifier used as the ticker table name.
///
/// Always splice it into SQL through [`TableName::quoted`], so reserved words
/// such as `order` or `user` stay usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if !valid || name.len() > 63 {
            return Err(ConfigError::Invalid {
                name: "TABLE_NAME",
                reason: format!("{name:?} is not a plain SQL identifier"),
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL statements.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE_NAME.to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postgres connection settings.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub table: TableName,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}

impl DatabaseConfig {
    /// Assemble settings from optional raw values, naming the first missing one.
    pub fn from_parts(
        host: Option<String>,
        port: u16,
        name: Option<String>,
        user: Option<String>,
        password: Option<String>,
        table: Option<String>,
    ) -> Result<Self, ConfigError> {
        let table = match table {
            Some(t) => TableName::new(&t)?,
            None => TableName::default(),
        };
        Ok(Self {
            host: host.ok_or(ConfigError::Missing("POSTGRES_HOST"))?,
            port,
            name: name.ok_or(ConfigError::Missing("POSTGRES_NAME"))?,
            user: user.ok_or(ConfigError::Missing("POSTGRES_USER"))?,
            password: password.ok_or(ConfigError::Missing("POSTGRES_PASSWORD"))?,
            table,
        })
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// API key pair for signed endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Exchange connection settings.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// When false, orders go to the validation-only endpoint.
    pub live_trading: bool,
}

impl ExchangeConfig {
    pub fn new(base_url: Option<String>, api_key: Option<String>, api_secret: Option<String>, live_trading: bool) -> Self {
        let credentials = match (api_key, api_secret) {
            (Some(key), Some(secret)) => Some(Credentials::new(key, secret)),
            _ => None,
        };
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            credentials,
            live_trading,
        }
    }

    /// Credentials for signed endpoints, or the name of the first missing variable.
    pub fn require_credentials(&self) -> Result<&Credentials, ConfigError> {
        self.credentials.as_ref().ok_or(ConfigError::Missing("API_KEY/API_SECRET"))
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new(None, None, None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for v in ["true", "TRUE", "1", "yes", "Y", "on", " On "] {
            assert_eq!(parse_bool(v), Ok(true), "{v}");
        }
        for v in ["false", "False", "0", "no", "n", "OFF"] {
            assert_eq!(parse_bool(v), Ok(false), "{v}");
        }
        assert!(parse_bool("maybe").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_table_name_validation() {
        assert_eq!(TableName::new("spot_market_data").unwrap().as_str(), "spot_market_data");
        assert!(TableName::new("_t1").is_ok());
        assert!(TableName::new("").is_err());
        assert!(TableName::new("1table").is_err());
        assert!(TableName::new("t; DROP TABLE x").is_err());
        assert!(TableName::new("public.t").is_err());
        assert!(TableName::new(&"a".repeat(64)).is_err());
        assert_eq!(TableName::default().as_str(), DEFAULT_TABLE_NAME);
    }

    #[test]
    fn test_table_name_quoted() {
        assert_eq!(TableName::default().quoted(), "\"spot_market_data\"");
        assert_eq!(TableName::new("order").unwrap().quoted(), "\"order\"");
        assert_eq!(TableName::new("user").unwrap().to_string(), "user");
    }

    #[test]
    fn test_database_config_reports_missing() {
        let err = DatabaseConfig::from_parts(
            Some("localhost".into()),
            5432,
            Some("market".into()),
            None,
            Some("pw".into()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POSTGRES_USER")));

        let cfg = DatabaseConfig::from_parts(
            Some("localhost".into()),
            5433,
            Some("market".into()),
            Some("bot".into()),
            Some("hunter2".into()),
            Some("tickers".into()),
        )
        .unwrap();
        assert_eq!(cfg.port, 5433);
        assert_eq!(cfg.table.as_str(), "tickers");
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn test_exchange_config_credentials() {
        let cfg = ExchangeConfig::new(None, Some("key".into()), None, false);
        assert_eq!(cfg.base_url, DEFAULT_API_BASE);
        assert!(cfg.require_credentials().is_err());

        let cfg = ExchangeConfig::new(Some("http://127.0.0.1:1".into()), Some("key".into()), Some("s3cr3t-value".into()), true);
        let creds = cfg.require_credentials().unwrap();
        assert_eq!(creds.api_key, "key");
        assert!(!format!("{creds:?}").contains("s3cr3t-value"));
    }
}
