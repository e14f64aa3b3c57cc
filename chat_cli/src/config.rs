use crate::error::ConfigError;
use clap::Parser;
use libchat::Protocol;
use log::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8088";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Peer-to-peer chat.
///
/// Registers with the registry, listens for messages on the chosen protocol and opens an interactive chat session.
/// Options missing from the command line are read from the configuration file.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Config {
    /// Path to the configuration file. The default is `$HOME/.chat/config.yml`.
    #[arg(long = "config-file", short = 'c', env = "CHAT_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
    /// The name other users see and address you by.
    #[arg(long = "name", short = 'n', env = "CHAT_NAME")]
    pub name: Option<String>,
    /// Base URL of the registry. The default is `http://localhost:8088`.
    #[arg(long = "registry", short = 'r', env = "CHAT_REGISTRY")]
    pub registry_url: Option<String>,
    /// Host to listen on. This is also the host published to the registry. The default is `127.0.0.1`.
    #[arg(long = "host", env = "CHAT_HOST")]
    pub host: Option<String>,
    /// Port to listen on. Use 0 to let the OS pick one. The default is 8080.
    #[arg(long = "port", short = 'p', env = "CHAT_PORT")]
    pub port: Option<u16>,
    /// Protocol other users should reach you on: http, udp or websocket. The default is http.
    #[arg(long = "protocol", env = "CHAT_PROTOCOL")]
    pub protocol: Option<Protocol>,
    /// Abandon an outgoing message if the transport has not finished after this many seconds. Off by default.
    #[arg(long = "send-timeout", env = "CHAT_SEND_TIMEOUT")]
    pub send_timeout_secs: Option<u64>,
}

/// The on-disk form of the configuration. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub registry_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<Protocol>,
    pub send_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config = serde_yml::from_reader(reader)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_yml::to_writer(writer, self)?;
        Ok(())
    }
}

/// Fully resolved settings for one chat run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOptions {
    pub name: String,
    pub registry_url: String,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub send_timeout: Option<Duration>,
}

pub fn default_config_path() -> PathBuf {
    let mut home = std::env::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.push(".chat");
    home.push("config.yml");
    home
}

impl Config {
    /// Merges the command line with the configuration file.
    ///
    /// An explicitly named configuration file must exist. The default file is optional.
    pub fn resolve(self) -> Result<ChatOptions, ConfigError> {
        let file = match self.config_file.as_ref() {
            Some(path) => ConfigFile::load(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    debug!("Loading configuration from {}", path.display());
                    ConfigFile::load(&path)?
                } else {
                    ConfigFile::default()
                }
            }
        };
        self.merge(file)
    }

    fn merge(self, file: ConfigFile) -> Result<ChatOptions, ConfigError> {
        let name = self.name.or(file.name).ok_or(ConfigError::MissingName)?;
        if name.trim().is_empty() {
            return Err(ConfigError::BlankName);
        }
        Ok(ChatOptions {
            name,
            registry_url: self.registry_url.or(file.registry_url).unwrap_or_else(|| DEFAULT_REGISTRY_URL.into()),
            host: self.host.or(file.host).unwrap_or_else(|| DEFAULT_HOST.into()),
            port: self.port.or(file.port).unwrap_or(DEFAULT_PORT),
            protocol: self.protocol.or(file.protocol).unwrap_or(Protocol::Http),
            send_timeout: self.send_timeout_secs.or(file.send_timeout_secs).map(Duration::from_secs),
        })
    }
}
