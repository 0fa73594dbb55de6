use lettre::message::Mailbox;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroize;

pub static CONF: Lazy<Config> = Lazy::new(|| {
    Config::from_env().unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    })
});

const DB_USERNAME_VAR: &str = "TASKNEST_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "TASKNEST_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "TASKNEST_DB_HOSTNAME";
const DB_PORT_VAR: &str = "TASKNEST_DB_PORT";
const DB_NAME_VAR: &str = "TASKNEST_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "TASKNEST_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "TASKNEST_DB_IDLE_TIMEOUT_SECS";

const EMAIL_ENABLED_VAR: &str = "TASKNEST_EMAIL_ENABLED";
const EMAIL_FROM_ADDR_VAR: &str = "TASKNEST_EMAIL_FROM_ADDR";
const EMAIL_REPLY_TO_ADDR_VAR: &str = "TASKNEST_EMAIL_REPLY_TO_ADDR";
const SMTP_ADDRESS_VAR: &str = "TASKNEST_SMTP_ADDRESS";
const SMTP_USERNAME_VAR: &str = "TASKNEST_SMTP_USERNAME";
const SMTP_KEY_VAR: &str = "TASKNEST_SMTP_KEY";
const MAX_SMTP_CONNECTIONS_VAR: &str = "TASKNEST_MAX_SMTP_CONNECTIONS";
const SMTP_IDLE_TIMEOUT_SECS_VAR: &str = "TASKNEST_SMTP_IDLE_TIMEOUT_SECS";

const DIRECTORY_URL_VAR: &str = "TASKNEST_DIRECTORY_URL";
const DIRECTORY_SERVICE_KEY_VAR: &str = "TASKNEST_DIRECTORY_SERVICE_KEY";
const DIRECTORY_PAGE_SIZE_VAR: &str = "TASKNEST_DIRECTORY_PAGE_SIZE";
const DIRECTORY_MAX_PAGES_VAR: &str = "TASKNEST_DIRECTORY_MAX_PAGES";
const DIRECTORY_REQUEST_TIMEOUT_SECS_VAR: &str = "TASKNEST_DIRECTORY_REQUEST_TIMEOUT_SECS";

const RESET_CODE_LIFETIME_MINS_VAR: &str = "TASKNEST_RESET_CODE_LIFETIME_MINS";

const ACTIX_WORKER_COUNT_VAR: &str = "TASKNEST_ACTIX_WORKER_COUNT";
const LOG_LEVEL_VAR: &str = "TASKNEST_LOG_LEVEL";

#[derive(Zeroize)]
pub struct ConfigInner {
    pub db_username: String,
    pub db_password: String,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_name: String,
    #[zeroize(skip)]
    pub db_max_connections: u32,
    #[zeroize(skip)]
    pub db_idle_timeout: Duration,

    pub email_enabled: bool,
    #[zeroize(skip)]
    pub email_from_address: Mailbox,
    #[zeroize(skip)]
    pub email_reply_to_address: Mailbox,
    #[zeroize(skip)]
    pub smtp_address: String,
    pub smtp_username: String,
    pub smtp_key: String,
    #[zeroize(skip)]
    pub max_smtp_connections: u32,
    #[zeroize(skip)]
    pub smtp_idle_timeout: Duration,

    #[zeroize(skip)]
    pub directory_url: String,
    pub directory_service_key: String,
    #[zeroize(skip)]
    pub directory_page_size: u32,
    #[zeroize(skip)]
    pub directory_max_pages: u32,
    #[zeroize(skip)]
    pub directory_request_timeout: Duration,

    #[zeroize(skip)]
    pub reset_code_lifetime: Duration,

    #[zeroize(skip)]
    pub actix_worker_count: usize,
    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let email_from_address: Mailbox = env_var::<String>(EMAIL_FROM_ADDR_VAR)?
            .parse()
            .map_err(|_| ConfigError::InvalidVar(EMAIL_FROM_ADDR_VAR))?;
        let email_reply_to_address: Mailbox = env_var::<String>(EMAIL_REPLY_TO_ADDR_VAR)?
            .parse()
            .map_err(|_| ConfigError::InvalidVar(EMAIL_REPLY_TO_ADDR_VAR))?;

        let inner = ConfigInner {
            db_username: env_var(DB_USERNAME_VAR)?,
            db_password: env_var(DB_PASSWORD_VAR)?,
            db_hostname: env_var(DB_HOSTNAME_VAR)?,
            db_port: env_var(DB_PORT_VAR)?,
            db_name: env_var(DB_NAME_VAR)?,
            db_max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            db_idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)),

            email_enabled: env_var(EMAIL_ENABLED_VAR)?,
            email_from_address,
            email_reply_to_address,
            smtp_address: env_var(SMTP_ADDRESS_VAR)?,
            smtp_username: env_var(SMTP_USERNAME_VAR)?,
            smtp_key: env_var(SMTP_KEY_VAR)?,
            max_smtp_connections: env_var_or(MAX_SMTP_CONNECTIONS_VAR, 24),
            smtp_idle_timeout: Duration::from_secs(env_var_or(SMTP_IDLE_TIMEOUT_SECS_VAR, 60)),

            directory_url: env_var(DIRECTORY_URL_VAR)?,
            directory_service_key: env_var(DIRECTORY_SERVICE_KEY_VAR)?,
            directory_page_size: env_var_or(DIRECTORY_PAGE_SIZE_VAR, 1000),
            directory_max_pages: env_var_or(DIRECTORY_MAX_PAGES_VAR, 10),
            directory_request_timeout: Duration::from_secs(env_var_or(
                DIRECTORY_REQUEST_TIMEOUT_SECS_VAR,
                30,
            )),

            reset_code_lifetime: Duration::from_secs(
                env_var_or(RESET_CODE_LIFETIME_MINS_VAR, 10) * 60,
            ),

            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),
            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// all threads have been joined.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::InvalidVar(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}
