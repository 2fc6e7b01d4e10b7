use std::env;

/// AppConfig
///
/// Holds the service's entire configuration state. Loaded once at startup and
/// treated as immutable afterwards; handlers and guards pull it out of the
/// shared state via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Decides how a missing API key is handled.
    pub env: Env,
    // Port the HTTP listener binds on 0.0.0.0.
    pub port: u16,
    // MongoDB connection string.
    pub mongo_uri: String,
    // Database holding the member collection.
    pub db_name: String,
    // Collection holding member documents.
    pub members_collection: String,
    // Primary shared secret expected in the `x-api-key` header.
    pub api_key: Option<String>,
    // Optional stricter secret for list-all and delete-all.
    pub admin_api_key: Option<String>,
}

/// Env
///
/// Runtime context. Production fails closed when no API key is configured,
/// Local lets requests through for development convenience.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DB_NAME: &str = "discord_bot";
pub const DEFAULT_MEMBERS_COLLECTION: &str = "members";

impl Default for AppConfig {
    /// Safe, non-panicking instance for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: DEFAULT_PORT,
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
            members_collection: DEFAULT_MEMBERS_COLLECTION.to_string(),
            api_key: None,
            admin_api_key: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment.
    ///
    /// # Panics
    /// Panics in production when `MONGODB_URI` is not set, or when `PORT` is not
    /// a valid port number. A missing `API_KEY` is deliberately not fatal here:
    /// the authentication guard rejects every request with a 500 instead.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let mongo_uri = match env {
            Env::Production => {
                env::var("MONGODB_URI").expect("FATAL: MONGODB_URI required in prod")
            }
            Env::Local => {
                env::var("MONGODB_URI").unwrap_or_else(|_| DEFAULT_MONGO_URI.to_string())
            }
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .expect("FATAL: PORT must be a valid port number"),
            Err(_) => DEFAULT_PORT,
        };

        Self {
            env,
            port,
            mongo_uri,
            db_name: env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
            members_collection: env::var("MEMBERS_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_MEMBERS_COLLECTION.to_string()),
            api_key: non_empty_var("API_KEY"),
            admin_api_key: non_empty_var("ADMIN_API_KEY"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

// An empty secret counts as "not configured".
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
