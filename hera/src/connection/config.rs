//! Hera connection configuration.
use std::{borrow::Cow, env::var, fmt, time::Duration};

use crate::{common::ByteStr, query::StillExecutingPolicy};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 10101;
const DEFAULT_APP_NAME: &str = "hera-rs";

/// Hera connection config.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) host: ByteStr,
    pub(crate) port: u16,
    pub(crate) socket: Option<ByteStr>,
    pub(crate) app_name: ByteStr,
    pub(crate) still_executing: StillExecutingPolicy,
}

impl Config {
    /// Create config for a tcp proxy address.
    pub fn new(host: impl Into<String>, port: u16) -> Config {
        Config {
            host: ByteStr::from(host.into()),
            port,
            socket: None,
            app_name: ByteStr::from_static(DEFAULT_APP_NAME),
            still_executing: StillExecutingPolicy::default(),
        }
    }

    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `HERA_HOST`
    /// - `HERA_PORT`
    /// - `HERA_APP_NAME`
    ///
    /// Additionally, it also read `HERA_URL` to provide missing value from
    /// previous variables before fallback to default value.
    pub fn from_env() -> Config {
        let url = var("HERA_URL").ok().and_then(|e| Config::parse_inner(e.into()).ok());

        macro_rules! env {
            ($name:literal,$or:ident,$def:expr) => {
                match (var($name),url.as_ref()) {
                    (Ok(ok),_) => ok.into(),
                    (Err(_),Some(e)) => e.$or.clone(),
                    (Err(_),None) => $def.into(),
                }
            };
        }

        let host = env!("HERA_HOST", host, DEFAULT_HOST);
        let app_name = env!("HERA_APP_NAME", app_name, DEFAULT_APP_NAME);
        let socket = url.as_ref().and_then(|e| e.socket.clone());

        let port = match (var("HERA_PORT"),url.as_ref()) {
            (Ok(ok),_) => ok.parse().unwrap_or(DEFAULT_PORT),
            (Err(_),Some(e)) => e.port,
            (Err(_),None) => DEFAULT_PORT,
        };

        Config { host, port, socket, app_name, still_executing: StillExecutingPolicy::default() }
    }

    /// Parse config from url.
    ///
    /// Accepted forms are `hera://host:port`, `host:port` and `unix:///path/to/socket`.
    pub fn parse(url: &str) -> Result<Config, ParseError> {
        Self::parse_inner(ByteStr::copy_from_str(url))
    }

    fn parse_inner(url: ByteStr) -> Result<Self, ParseError> {
        let mut config = Config {
            host: ByteStr::from_static(DEFAULT_HOST),
            port: DEFAULT_PORT,
            socket: None,
            app_name: ByteStr::from_static(DEFAULT_APP_NAME),
            still_executing: StillExecutingPolicy::default(),
        };

        if let Some(path) = url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ParseError { reason: "socket path missing".into() });
            }
            config.socket = Some(url.slice_ref(path));
            return Ok(config);
        }

        let read = match url.split_once("://") {
            Some(("hera", rest)) => rest,
            Some((scheme, _)) => {
                return Err(ParseError { reason: format!("unsupported scheme {scheme:?}").into() });
            }
            None => url.as_str(),
        };
        let read = read.trim_end_matches('/');

        let Some((host, port)) = read.rsplit_once(':') else {
            return Err(ParseError { reason: "port missing".into() });
        };

        if host.is_empty() {
            return Err(ParseError { reason: "host missing".into() });
        }

        let Ok(port) = port.parse() else {
            return Err(ParseError { reason: "invalid port".into() });
        };

        config.host = url.slice_ref(host);
        config.port = port;
        Ok(config)
    }

    /// Name announced to the proxy on connect, default to `hera-rs`.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = ByteStr::from(name.into());
        self
    }

    /// Wait between reads while the proxy reports the statement is still executing.
    pub fn still_executing_backoff(mut self, backoff: Duration) -> Self {
        self.still_executing.backoff = Some(backoff);
        self
    }

    /// Fail a query after the proxy reported still executing `max` times.
    pub fn max_still_executing(mut self, max: u32) -> Self {
        self.still_executing.max_polls = Some(max);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::str::FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing url.
pub struct ParseError {
    pub(crate) reason: Cow<'static,str>,
}

impl std::error::Error for ParseError { }

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason)
        }
        write!(f, "failed to parse url: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
