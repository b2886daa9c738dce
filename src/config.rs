use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{DisplayFromStr, DurationMilliSeconds, serde_as};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REACTIVATION_ROUTE: &str = "/firebase-reactivate";

#[serde_as]
#[derive(Deserialize, Debug, Clone, derive_builder::Builder)]
#[builder(default)]
pub struct Config {
    /// Hosted identity provider, JSON-RPC endpoint
    #[builder(setter(into))]
    pub identity_service: Url,

    /// Document store REST base
    #[builder(setter(into))]
    pub store_service: Url,

    /// Document store live channel (`ws://` or `wss://`)
    #[builder(setter(into))]
    pub store_listen: Url,

    #[builder(setter(into))]
    pub blob_service: Url,

    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub api_key: Option<SecretString>,

    /// Shared code a new owner must present to sign up
    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub signup_code: Option<SecretString>,

    #[serde_as(as = "DisplayFromStr")]
    pub log: tracing::Level,

    #[serde(rename = "alert_ttl_ms", default = "default_alert_ttl")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub alert_ttl: Duration,

    #[serde(default = "default_reactivation_route")]
    #[builder(setter(into))]
    pub reactivation_route: String,

    #[serde(default = "default_rate_limit")]
    pub store_rate_limit: NonZeroU32,
}

fn default_alert_ttl() -> Duration {
    Duration::from_millis(4000)
}

fn default_reactivation_route() -> String {
    String::from(DEFAULT_REACTIVATION_ROUTE)
}

fn default_rate_limit() -> NonZeroU32 {
    NonZeroU32::new(25).unwrap()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity_service: Url::from_str("http://localhost:9099/identity").unwrap(),
            store_service: Url::from_str("http://localhost:8080/store/").unwrap(),
            store_listen: Url::from_str("ws://localhost:8080/store/listen").unwrap(),
            blob_service: Url::from_str("http://localhost:9199/blobs/").unwrap(),
            api_key: None,
            signup_code: None,
            log: tracing::Level::INFO,
            alert_ttl: default_alert_ttl(),
            reactivation_route: default_reactivation_route(),
            store_rate_limit: default_rate_limit(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("PORTFOLIO"))
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let config = ConfigBuilder::default()
            .reactivation_route("/reactivate")
            .build()
            .unwrap();

        assert_eq!(config.reactivation_route, "/reactivate");
        assert_eq!(config.alert_ttl, Duration::from_millis(4000));
        assert!(config.signup_code.is_none());
    }
}
