use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::{
    error::{invalid_input_error, Error},
    validation::CodePolicy,
};

/// Exponential backoff used for saves and for re-subscribing to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);

        delay.min(self.max_delay)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub code_policy: CodePolicy,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            code_policy: CodePolicy::Optional,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        if let Err(err) = dotenv::dotenv() {
            tracing::debug!("no .env file loaded: {}", err);
        }

        let defaults = Self::default();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => Some(url),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err.into()),
        };

        let require_code: bool = parse_var("REQUIRE_CODE", false)?;

        Ok(Self {
            database_url,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            bind_addr: parse_var("BIND_ADDR", defaults.bind_addr)?,
            code_policy: if require_code {
                CodePolicy::Required
            } else {
                CodePolicy::Optional
            },
            retry: RetryPolicy {
                max_attempts: parse_var("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                base_delay: Duration::from_millis(parse_var(
                    "RETRY_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )?),
                max_delay: Duration::from_millis(parse_var(
                    "RETRY_MAX_DELAY_MS",
                    defaults.retry.max_delay.as_millis() as u64,
                )?),
            },
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| {
            tracing::error!("could not parse {}={:?}", key, value);
            invalid_input_error()
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
    };

    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(1000));
}

#[test]
fn unset_variables_fall_back_to_defaults() {
    let value: u32 = parse_var("RESTROOM_RUNNER_TEST_UNSET_VARIABLE", 7).unwrap();

    assert_eq!(value, 7);
}
