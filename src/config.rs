use crate::error::{Result, StrainerError};
use std::env;

/// Default loopback port for the local proxy server.
const DEFAULT_PORT: u16 = 9710;

/// Default sensitivity of the ad-filter duration heuristic.
const DEFAULT_THRESHOLD_FACTOR: f64 = 1.5;

/// Default bound on the upstream manifest fetch, in seconds.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 6;

/// Default bound on the segment repair probe, in seconds.
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;

/// Application configuration loaded from environment variables.
///
/// The proxy only ever binds loopback, so every variable has a usable
/// default; invalid values are rejected synchronously at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Loopback port the proxy server binds.
    pub port: u16,
    /// Whether the ad-filter stage runs at all.
    pub ad_filter: bool,
    /// Sensitivity multiplier for duration-outlier classification.
    /// Higher values remove more aggressively.
    pub dynamic_threshold_factor: f64,
    /// Bound on the upstream manifest fetch.
    pub fetch_timeout_secs: u64,
    /// Bound on the segment repair probe.
    pub probe_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, validating eagerly.
    ///
    /// # Errors
    /// Returns [`StrainerError::Configuration`] for an unparseable or zero
    /// port, or a non-positive/non-finite threshold factor.
    pub fn from_env() -> Result<Self> {
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| StrainerError::Configuration("PORT must be a valid port".to_string()))?;
        if port == 0 {
            return Err(StrainerError::Configuration(
                "PORT must be nonzero".to_string(),
            ));
        }

        let ad_filter = env::var("AD_FILTER")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let dynamic_threshold_factor: f64 = env::var("AD_FILTER_THRESHOLD_FACTOR")
            .unwrap_or_else(|_| DEFAULT_THRESHOLD_FACTOR.to_string())
            .parse()
            .map_err(|_| {
                StrainerError::Configuration(
                    "AD_FILTER_THRESHOLD_FACTOR must be a number".to_string(),
                )
            })?;
        if !dynamic_threshold_factor.is_finite() || dynamic_threshold_factor <= 0.0 {
            return Err(StrainerError::Configuration(
                "AD_FILTER_THRESHOLD_FACTOR must be positive".to_string(),
            ));
        }

        let fetch_timeout_secs = env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_FETCH_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let probe_timeout_secs = env::var("PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_PROBE_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);

        Ok(Config {
            port,
            ad_filter,
            dynamic_threshold_factor,
            fetch_timeout_secs,
            probe_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialize all env-var tests to prevent races between parallel test threads.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Set env vars, run `f`, then restore original state.
    ///
    /// `set` — vars to set; `unset` — vars to remove before running `f`.
    fn with_env(set: &[(&str, &str)], unset: &[&str], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());

        let saved: Vec<(&str, Option<String>)> = set
            .iter()
            .map(|(k, _)| *k)
            .chain(unset.iter().copied())
            .map(|k| (k, std::env::var(k).ok()))
            .collect();

        for (k, v) in set {
            // SAFETY: serialized by ENV_LOCK — no other thread modifies env vars concurrently.
            unsafe { std::env::set_var(k, v) };
        }
        for k in unset {
            unsafe { std::env::remove_var(k) };
        }

        f();

        for (k, old) in saved {
            match old {
                Some(v) => unsafe { std::env::set_var(k, v) },
                None => unsafe { std::env::remove_var(k) },
            }
        }
    }

    const ALL_VARS: [&str; 5] = [
        "PORT",
        "AD_FILTER",
        "AD_FILTER_THRESHOLD_FACTOR",
        "FETCH_TIMEOUT_SECS",
        "PROBE_TIMEOUT_SECS",
    ];

    #[test]
    fn defaults_when_nothing_is_set() {
        with_env(&[], &ALL_VARS, || {
            let config = Config::from_env().expect("defaults should parse");
            assert_eq!(config.port, 9710);
            assert!(config.ad_filter);
            assert_eq!(config.dynamic_threshold_factor, 1.5);
            assert_eq!(config.fetch_timeout_secs, 6);
            assert_eq!(config.probe_timeout_secs, 3);
        });
    }

    #[test]
    fn port_is_parsed() {
        with_env(&[("PORT", "18080")], &[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.port, 18080);
        });
    }

    #[test]
    fn zero_port_is_rejected() {
        with_env(&[("PORT", "0")], &[], || {
            assert!(Config::from_env().is_err(), "port 0 is a misconfiguration");
        });
    }

    #[test]
    fn garbage_port_is_rejected() {
        with_env(&[("PORT", "not-a-port")], &[], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn threshold_factor_is_parsed() {
        with_env(&[("AD_FILTER_THRESHOLD_FACTOR", "2.25")], &["PORT"], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.dynamic_threshold_factor, 2.25);
        });
    }

    #[test]
    fn non_positive_threshold_factor_is_rejected() {
        with_env(&[("AD_FILTER_THRESHOLD_FACTOR", "0")], &["PORT"], || {
            assert!(Config::from_env().is_err());
        });
        with_env(&[("AD_FILTER_THRESHOLD_FACTOR", "-1.5")], &["PORT"], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn ad_filter_can_be_disabled() {
        with_env(&[("AD_FILTER", "false")], &["PORT"], || {
            let config = Config::from_env().unwrap();
            assert!(!config.ad_filter);
        });
    }

    #[test]
    fn timeouts_fall_back_to_defaults_on_garbage() {
        with_env(
            &[("FETCH_TIMEOUT_SECS", "soon"), ("PROBE_TIMEOUT_SECS", "")],
            &["PORT"],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.fetch_timeout_secs, 6);
                assert_eq!(config.probe_timeout_secs, 3);
            },
        );
    }
}
