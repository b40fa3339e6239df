//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::presence::DEFAULT_CHANNEL_CAPACITY;
use crate::domain::frontmatter::{DEFAULT_CATEGORY, ParseOptions};
use crate::domain::posts::DEFAULT_WORDS_PER_MINUTE;

mod cli;
#[cfg(test)]
mod tests;

pub use cli::{CheckArgs, CliArgs, Command, ContentOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CONTENT_ROOT: &str = "content";
const DEFAULT_HEARTBEAT_SECS: u64 = 15;
const DEFAULT_MEMBER_TTL_SECS: u64 = 45;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
const DEFAULT_SITE_TITLE: &str = "Quire";
const DEFAULT_SITE_BASE_URL: &str = "http://localhost:3000/";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub presence: PresenceSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub root: PathBuf,
    pub parse: ParseOptions,
    /// `None` disables periodic reloads.
    pub reload_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PresenceSettings {
    pub heartbeat: Duration,
    pub member_ttl: Duration,
    pub sweep_interval: Duration,
    pub channel_capacity: NonZeroUsize,
}

/// Site-wide values handed to the HTTP layer at construction.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSettings {
    pub title: String,
    pub base_url: Url,
    pub publications: Vec<Publication>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub name: String,
    pub url: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Check(args)) => raw.apply_content_overrides(&args.content),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    presence: RawPresenceSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.content_reload_interval_seconds {
            self.content.reload_interval_seconds = Some(seconds);
        }

        self.apply_content_overrides(&overrides.content);
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(root) = overrides.content_root.as_ref() {
            self.content.root = Some(root.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            presence,
            site,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content)?,
            presence: build_presence_settings(presence)?,
            site: build_site_settings(site)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "public and admin listeners must not share an address",
        ));
    }

    let graceful_shutdown = non_zero_secs(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let root = content
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("content.root", "path must not be empty"));
    }

    let words_per_minute = non_zero_u32(
        content
            .words_per_minute
            .map(u64::from)
            .unwrap_or(u64::from(DEFAULT_WORDS_PER_MINUTE)),
        "content.words_per_minute",
    )?;

    let default_category = match content.default_category {
        Some(category) if category.trim().is_empty() => {
            return Err(LoadError::invalid(
                "content.default_category",
                "must not be empty",
            ));
        }
        Some(category) => category.trim().to_string(),
        None => DEFAULT_CATEGORY.to_string(),
    };

    let reload_interval = content
        .reload_interval_seconds
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs);

    Ok(ContentSettings {
        root,
        parse: ParseOptions {
            words_per_minute: words_per_minute.get(),
            default_category,
        },
        reload_interval,
    })
}

fn build_presence_settings(presence: RawPresenceSettings) -> Result<PresenceSettings, LoadError> {
    let heartbeat = non_zero_secs(
        presence.heartbeat_seconds.unwrap_or(DEFAULT_HEARTBEAT_SECS),
        "presence.heartbeat_seconds",
    )?;
    let member_ttl = non_zero_secs(
        presence.member_ttl_seconds.unwrap_or(DEFAULT_MEMBER_TTL_SECS),
        "presence.member_ttl_seconds",
    )?;
    if member_ttl <= heartbeat {
        return Err(LoadError::invalid(
            "presence.member_ttl_seconds",
            "must be greater than presence.heartbeat_seconds",
        ));
    }
    let sweep_interval = non_zero_secs(
        presence
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        "presence.sweep_interval_seconds",
    )?;

    let channel_capacity = NonZeroUsize::new(
        presence
            .channel_capacity
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("presence.channel_capacity", "must be greater than zero"))?;

    Ok(PresenceSettings {
        heartbeat,
        member_ttl,
        sweep_interval,
        channel_capacity,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let title = site
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());

    let base_url = parse_url(
        site.base_url.as_deref().unwrap_or(DEFAULT_SITE_BASE_URL),
        "site.base_url",
    )?;

    let publications = site
        .publications
        .into_iter()
        .map(|publication| {
            let name = publication.name.trim().to_string();
            if name.is_empty() {
                return Err(LoadError::invalid(
                    "site.publications",
                    "publication name must not be empty",
                ));
            }
            Ok(Publication {
                name,
                url: parse_url(&publication.url, "site.publications")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SiteSettings {
        title,
        base_url,
        publications,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    root: Option<PathBuf>,
    words_per_minute: Option<u32>,
    default_category: Option<String>,
    reload_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPresenceSettings {
    heartbeat_seconds: Option<u64>,
    member_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    base_url: Option<String>,
    publications: Vec<RawPublication>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPublication {
    name: String,
    url: String,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value.trim()).map_err(|err| LoadError::invalid(key, format!("`{value}`: {err}")))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
