//! Process configuration read from the environment.
//!
//! Parsing is pure over a lookup function so it can be tested without
//! touching the real process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;
use watch_engine::{service_host, SmtpSettings, DEFAULT_BASE_URL};
use watch_logging::{parse_level, LogSettings};

const DEFAULT_INTERVAL_MINUTES: u64 = 30;
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
const MAX_WAIT_TIMEOUT_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Settings {
    pub check_interval: Duration,
    pub target_url: String,
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Base for relative links found in the portal tables.
    pub base_url: Url,
    pub browser_headless: bool,
    pub browser_executable: Option<PathBuf>,
    pub wait_timeout: Duration,
    /// Unset when there is nobody to mail.
    pub smtp: Option<SmtpSettings>,
    pub recipients: Vec<String>,
    pub data_dir: PathBuf,
    pub log: LogSettings,
    /// Problems that fell back to a default; logged once logging is up.
    pub warnings: Vec<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("check_interval", &self.check_interval)
            .field("target_url", &self.target_url)
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("browser_headless", &self.browser_headless)
            .field("browser_executable", &self.browser_executable)
            .field("wait_timeout", &self.wait_timeout)
            .field("smtp", &self.smtp)
            .field("recipients", &self.recipients)
            .field("data_dir", &self.data_dir)
            .field("log", &self.log)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let mut warnings = Vec::new();

        let check_interval = match env.first(&["CHECK_INTERVAL_MINUTES"]) {
            None => Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            Some((_, raw)) => match raw.parse::<u64>() {
                Ok(minutes) if (1..=MAX_INTERVAL_MINUTES).contains(&minutes) => {
                    Duration::from_secs(minutes * 60)
                }
                _ => {
                    warnings.push(format!(
                        "CHECK_INTERVAL_MINUTES={raw:?} is not between 1 and \
                         {MAX_INTERVAL_MINUTES} minutes; using {DEFAULT_INTERVAL_MINUTES}"
                    ));
                    Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60)
                }
            },
        };

        let target_url = env.url("TARGET_PAGE_URL")?;
        let login_url = env.url("LOGIN_PAGE_URL")?;
        let username = env.required(&["PORTAL_USERNAME", "USERNAME"])?;
        let password = env.required(&["PORTAL_PASSWORD", "PASSWORD"])?;

        let base_url = match env.first(&["PORTAL_BASE_URL"]) {
            Some((key, raw)) => parse_url(key, &raw)?,
            None => parse_url("PORTAL_BASE_URL", DEFAULT_BASE_URL)?,
        };

        let browser_headless = match env.first(&["BROWSER_HEADLESS", "PUPPETEER_HEADLESS"]) {
            Some((key, raw)) => parse_flag(key, &raw)?,
            None => true,
        };
        let browser_executable = env
            .first(&["BROWSER_EXECUTABLE_PATH", "PUPPETEER_EXECUTABLE_PATH"])
            .map(|(_, raw)| PathBuf::from(raw));

        let wait_timeout = match env.first(&["WAIT_TIMEOUT_MS", "PUPPETEER_TIMEOUT"]) {
            Some((key, raw)) => match raw.parse::<u64>() {
                Ok(ms) if (1..=MAX_WAIT_TIMEOUT_MS).contains(&ms) => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::Invalid {
                        key,
                        value: raw,
                        reason: format!(
                            "expected between 1 and {MAX_WAIT_TIMEOUT_MS} milliseconds"
                        ),
                    })
                }
            },
            None => Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
        };

        let recipients = env
            .first(&["RECIPIENT_EMAILS"])
            .map(|(_, raw)| split_list(&raw))
            .unwrap_or_default();
        let smtp = if recipients.is_empty() {
            warnings.push("RECIPIENT_EMAILS is empty; reports will not be mailed".to_string());
            None
        } else {
            Some(smtp_settings(&env)?)
        };

        let data_dir = env
            .first(&["DATA_DIR"])
            .map(|(_, raw)| PathBuf::from(raw))
            .unwrap_or_else(|| PathBuf::from("data"));

        let mut log = LogSettings::default();
        if let Some((_, raw)) = env.first(&["LOG_FILE"]) {
            log.file = PathBuf::from(raw);
        }
        if let Some((key, raw)) = env.first(&["LOG_LEVEL"]) {
            log.level = parse_level(&raw).ok_or_else(|| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: "expected error, warn, info, debug or trace".to_string(),
            })?;
        }

        Ok(Self {
            check_interval,
            target_url,
            login_url,
            username,
            password,
            base_url,
            browser_headless,
            browser_executable,
            wait_timeout,
            smtp,
            recipients,
            data_dir,
            log,
            warnings,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// First key (in order) holding a non-blank value.
    fn first(&self, keys: &[&'static str]) -> Option<(&'static str, String)> {
        keys.iter().find_map(|&key| {
            (self.lookup)(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        })
    }

    fn required(&self, keys: &[&'static str]) -> Result<String, ConfigError> {
        self.first(keys)
            .map(|(_, value)| value)
            .ok_or(ConfigError::Missing(keys[0]))
    }

    fn url(&self, key: &'static str) -> Result<String, ConfigError> {
        let raw = self.required(&[key])?;
        parse_url(key, &raw).map(String::from)
    }
}

fn smtp_settings<F>(env: &Env<F>) -> Result<SmtpSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match env.first(&["SMTP_PORT"]) {
        Some((key, raw)) => Some(raw.parse::<u16>().map_err(|err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: err.to_string(),
        })?),
        None => None,
    };
    Ok(SmtpSettings {
        host: smtp_host(env)?,
        port,
        username: env.required(&["EMAIL_USER"])?,
        password: env.required(&["EMAIL_PASS"])?,
        from: env.first(&["EMAIL_FROM"]).map(|(_, raw)| raw),
    })
}

fn smtp_host<F>(env: &Env<F>) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((_, host)) = env.first(&["SMTP_HOST"]) {
        return Ok(host);
    }
    match env.first(&["EMAIL_SERVICE"]) {
        Some((key, service)) => service_host(&service)
            .map(str::to_string)
            .ok_or(ConfigError::Invalid {
                key,
                value: service,
                reason: "unknown mail service; set SMTP_HOST instead".to_string(),
            }),
        None => Err(ConfigError::Missing("SMTP_HOST")),
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "new" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
