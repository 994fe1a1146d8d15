use std::{collections::BTreeMap, net::SocketAddr, path::PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,

    /// Path prefix under which compiled command routes are mounted.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_base_path() -> String {
    String::from("/api")
}

impl Server {
    /// Create new server configuration with the default base path.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            base_path: default_base_path(),
        }
    }
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Connection details of a single chain.
#[derive(Deserialize)]
pub struct Platform {
    /// JSON-RPC endpoint URL.
    pub url: String,
}

/// Known chains and the one commands are bound to by default.
#[derive(Deserialize)]
pub struct Chains {
    /// Platform name used when a command doesn't request a specific chain.
    #[serde(default = "default_platform")]
    pub default: String,

    /// Chain endpoints, keyed by platform name.
    #[serde(default)]
    pub platforms: BTreeMap<String, Platform>,
}

fn default_platform() -> String {
    String::from("eth")
}

impl Default for Chains {
    fn default() -> Self {
        Self {
            default: default_platform(),
            platforms: BTreeMap::new(),
        }
    }
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Chain endpoint configuration.
    #[serde(default)]
    pub chains: Chains,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("_"))
            .extract()
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        let mut platforms = BTreeMap::new();

        platforms.insert(
            String::from("eth"),
            Platform {
                url: String::from("http://127.0.0.1:8545"),
            },
        );
        platforms.insert(
            String::from("polygon"),
            Platform {
                url: String::from("http://127.0.0.1:8546"),
            },
        );

        Self {
            server: Some(Server::new(([127, 0, 0, 1], 3000).into())),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            chains: Chains {
                default: String::from("eth"),
                platforms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use figment::Jail;

    use super::Config;

    #[test]
    fn reads_chain_table() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Chains.toml",
                r#"
                [server]
                address = "0.0.0.0:8080"

                [chains]
                default = "polygon"

                [chains.platforms.polygon]
                url = "https://polygon-rpc.com"
                "#,
            )?;

            let config = Config::new(Some(PathBuf::from("Chains.toml")))?;
            let server = config.server.expect("server section is present");

            assert_eq!(server.base_path, "/api");
            assert_eq!(config.chains.default, "polygon");
            assert_eq!(
                config.chains.platforms["polygon"].url,
                "https://polygon-rpc.com"
            );

            Ok(())
        });
    }

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|_| {
            let config = Config::new(None)?;

            assert!(config.server.is_none());
            assert_eq!(config.chains.default, "eth");
            assert!(config.chains.platforms.is_empty());

            Ok(())
        });
    }
}
