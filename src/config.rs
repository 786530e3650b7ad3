use serde::Deserialize;
use std::{io, net::Ipv4Addr, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub fn from_toml_file<P: AsRef<Path>, T: serde::de::DeserializeOwned>(path: P) -> Result<T, Error> {
    let config_data = std::fs::read_to_string(path.as_ref())?;

    toml::from_str(&config_data).map_err(From::from)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
    pub beacon_node_url: String,
    /// Workers draining the registration queue; `0` means one per CPU.
    pub register_validator_workers: usize,
    pub genesis_fork_version: String,
    /// Hex-encoded BLS secret key used to sign builder bids. An ephemeral
    /// key is generated when left empty.
    pub secret_key: String,
    pub proposer_api: bool,
    pub builder_api: bool,
    pub metrics_api: bool,
    /// Delay applied before serving `getHeader`, to give builders time to
    /// submit late bids.
    pub get_header_wait_time_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 28545,
            beacon_node_url: "http://127.0.0.1:5052".into(),
            register_validator_workers: 0,
            genesis_fork_version: "0x00000000".into(),
            secret_key: String::new(),
            proposer_api: true,
            builder_api: true,
            metrics_api: false,
            get_header_wait_time_ms: 0,
        }
    }
}

impl Config {
    pub fn get_header_wait_time(&self) -> Duration {
        Duration::from_millis(self.get_header_wait_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            port = 18550
            beacon_node_url = "http://beacon:5052"
            genesis_fork_version = "0x00001020"
            builder_api = false
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 18550);
        assert_eq!(config.beacon_node_url, "http://beacon:5052");
        assert!(!config.builder_api);
        // untouched fields fall back to defaults
        assert!(config.proposer_api);
        assert_eq!(config.register_validator_workers, 0);
    }
}
