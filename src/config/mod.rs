//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "microblog";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_TITLE: &str = "Microblog";
const DEFAULT_POSTS_DIR: &str = "posts";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_SESSION_SWEEP_SECS: u64 = 60;

/// Command-line arguments for the microblog binary.
#[derive(Debug, Parser)]
#[command(name = "microblog", version, about = "Flat-file markdown blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MICROBLOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Management password for the authoring pages.
    #[arg(
        long = "password",
        env = "MICROBLOG_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the blog over HTTP.
    Serve(Box<ServeArgs>),
    /// Parse every post in the posts directory and report malformed files.
    Check(CheckArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub posts: PostsOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PostsOverride {
    /// Override the directory holding post files.
    #[arg(long = "posts-directory", value_name = "PATH")]
    pub posts_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub posts: PostsOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the blog title.
    #[arg(long = "title", value_name = "TITLE")]
    pub title: Option<String>,

    /// Serve read-only: no login, authoring or delete routes.
    #[arg(
        long = "view-only",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub view_only: Option<bool>,

    /// Override the post index refresh interval.
    #[arg(long = "refresh-interval-seconds", value_name = "SECONDS")]
    pub refresh_interval_seconds: Option<u64>,

    /// Override the session lifetime.
    #[arg(long = "session-ttl-seconds", value_name = "SECONDS")]
    pub session_ttl_seconds: Option<u64>,

    /// Override the session sweep interval.
    #[arg(long = "session-sweep-seconds", value_name = "SECONDS")]
    pub session_sweep_seconds: Option<u64>,

    /// Toggle the `Secure` attribute on the session cookie.
    #[arg(
        long = "secure-cookie",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub secure_cookie: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub blog: BlogSettings,
    pub refresh: RefreshSettings,
    pub sessions: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Clone)]
pub struct BlogSettings {
    pub title: String,
    /// Always `Some` unless `view_only` is set.
    pub password: Option<String>,
    pub posts_directory: PathBuf,
    pub view_only: bool,
}

impl fmt::Debug for BlogSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlogSettings")
            .field("title", &self.title)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("posts_directory", &self.posts_directory)
            .field("view_only", &self.view_only)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub posts_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub secure_cookie: bool,
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

    builder = builder.add_source(Environment::with_prefix("MICROBLOG").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    if let Some(password) = cli.password.as_ref() {
        raw.blog.password = Some(password.clone());
    }

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Check(args)) => {
            raw.apply_posts_override(&args.posts);
            // Checking never serves the authoring pages.
            raw.blog.view_only = Some(true);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    blog: RawBlogSettings,
    refresh: RawRefreshSettings,
    sessions: RawSessionSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
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
        if let Some(title) = overrides.title.as_ref() {
            self.blog.title = Some(title.clone());
        }
        if let Some(view_only) = overrides.view_only {
            self.blog.view_only = Some(view_only);
        }
        if let Some(seconds) = overrides.refresh_interval_seconds {
            self.refresh.posts_interval_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.session_ttl_seconds {
            self.sessions.ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.session_sweep_seconds {
            self.sessions.sweep_interval_seconds = Some(seconds);
        }
        if let Some(secure) = overrides.secure_cookie {
            self.sessions.secure_cookie = Some(secure);
        }

        self.apply_posts_override(&overrides.posts);
    }

    fn apply_posts_override(&mut self, overrides: &PostsOverride) {
        if let Some(directory) = overrides.posts_directory.as_ref() {
            self.blog.posts_directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            blog,
            refresh,
            sessions,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let blog = build_blog_settings(blog)?;
        let refresh = build_refresh_settings(refresh)?;
        let sessions = build_session_settings(sessions)?;

        Ok(Self {
            server,
            logging,
            blog,
            refresh,
            sessions,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = non_zero_secs(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
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

fn build_blog_settings(blog: RawBlogSettings) -> Result<BlogSettings, LoadError> {
    let title = blog
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    if title.contains(['\r', '\n']) {
        return Err(LoadError::invalid("blog.title", "must be a single line"));
    }

    let view_only = blog.view_only.unwrap_or(false);
    let password = blog.password.filter(|value| !value.is_empty());
    if password.is_none() && !view_only {
        return Err(LoadError::invalid(
            "blog.password",
            "a management password is required unless view_only is set",
        ));
    }

    let posts_directory = blog
        .posts_directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_POSTS_DIR));
    if posts_directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "blog.posts_directory",
            "must not be empty",
        ));
    }

    Ok(BlogSettings {
        title,
        password,
        posts_directory,
        view_only,
    })
}

fn build_refresh_settings(refresh: RawRefreshSettings) -> Result<RefreshSettings, LoadError> {
    Ok(RefreshSettings {
        posts_interval: non_zero_secs(
            refresh.posts_interval_seconds,
            DEFAULT_REFRESH_INTERVAL_SECS,
            "refresh.posts_interval_seconds",
        )?,
    })
}

fn build_session_settings(sessions: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let ttl = non_zero_secs(
        sessions.ttl_seconds,
        DEFAULT_SESSION_TTL_SECS,
        "sessions.ttl_seconds",
    )?;
    let sweep_interval = non_zero_secs(
        sessions.sweep_interval_seconds,
        DEFAULT_SESSION_SWEEP_SECS,
        "sessions.sweep_interval_seconds",
    )?;

    Ok(SessionSettings {
        ttl,
        sweep_interval,
        secure_cookie: sessions.secure_cookie.unwrap_or(true),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
struct RawBlogSettings {
    title: Option<String>,
    password: Option<String>,
    posts_directory: Option<PathBuf>,
    view_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRefreshSettings {
    posts_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    secure_cookie: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_secs(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
