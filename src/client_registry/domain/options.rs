//! Coercion of free-form transport options into typed transport settings.
//!
//! Descriptors carry an unordered `String -> String` option bag. This module
//! turns that bag into [`ResolvedTransportConfig`] for a given
//! [`TransportKind`], applying defaults for absent keys. Unknown keys are
//! ignored so newer configuration files keep working with older binaries.

use super::{OptionFormatError, TransportKind};
use std::collections::BTreeMap;
use std::time::Duration;

/// Option key holding shell-style process arguments.
pub const ARGUMENTS_KEY: &str = "arguments";
/// Option key holding the process working directory.
pub const WORKING_DIRECTORY_KEY: &str = "workingDirectory";
/// Option key holding the process shutdown grace period, in seconds.
pub const SHUTDOWN_TIMEOUT_KEY: &str = "shutdownTimeout";
/// Option key holding the SSE connection timeout, in seconds.
pub const CONNECTION_TIMEOUT_KEY: &str = "connectionTimeout";
/// Option key holding the SSE reconnect attempt limit.
pub const MAX_RECONNECT_ATTEMPTS_KEY: &str = "maxReconnectAttempts";
/// Option key holding the SSE reconnect delay, in seconds.
pub const RECONNECT_DELAY_KEY: &str = "reconnectDelay";
/// Prefix of option keys that contribute SSE request headers.
pub const HEADER_PREFIX: &str = "header.";
/// Prefix of option keys that contribute process environment variables.
pub const ENV_PREFIX: &str = "env.";

/// Default SSE connection timeout.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
/// Default SSE reconnect attempt limit.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;
/// Default delay between SSE reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Default grace period before a spawned server process is killed.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Typed settings for a server hosted as a local process over STDIO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioTransportOptions {
    arguments: Vec<String>,
    working_directory: Option<String>,
    environment: BTreeMap<String, String>,
    shutdown_timeout: Duration,
}

impl Default for StdioTransportOptions {
    fn default() -> Self {
        Self {
            arguments: Vec::new(),
            working_directory: None,
            environment: BTreeMap::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl StdioTransportOptions {
    /// Returns process arguments.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Returns the working directory, or `None` for the caller's default.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    /// Returns additional environment variables for the process.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

/// Typed settings for a server reached over an HTTP event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseTransportOptions {
    connection_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    additional_headers: Option<BTreeMap<String, String>>,
}

impl Default for SseTransportOptions {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            additional_headers: None,
        }
    }
}

impl SseTransportOptions {
    /// Returns the connection timeout.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Returns the maximum number of reconnect attempts.
    #[must_use]
    pub const fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    /// Returns the delay between reconnect attempts.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Returns extra request headers.
    ///
    /// `None` means no header was configured, which lets the transport apply
    /// its own defaults. `Some` is never empty.
    #[must_use]
    pub const fn additional_headers(&self) -> Option<&BTreeMap<String, String>> {
        self.additional_headers.as_ref()
    }
}

/// Transport settings resolved from a descriptor's option bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTransportConfig {
    /// Local process settings.
    Stdio(StdioTransportOptions),
    /// Event-stream settings.
    Sse(SseTransportOptions),
}

impl ResolvedTransportConfig {
    /// Resolves the option bag for `kind`.
    ///
    /// The result depends only on `kind`, `options` and the built-in
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`OptionFormatError`] naming the first key whose value cannot
    /// be coerced into its expected type.
    pub fn resolve(
        kind: TransportKind,
        options: &BTreeMap<String, String>,
    ) -> Result<Self, OptionFormatError> {
        match kind {
            TransportKind::Stdio => resolve_stdio(options).map(Self::Stdio),
            TransportKind::Sse => resolve_sse(options).map(Self::Sse),
        }
    }

    /// Returns the transport kind these settings belong to.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio(_) => TransportKind::Stdio,
            Self::Sse(_) => TransportKind::Sse,
        }
    }

    /// Returns STDIO settings when this is a STDIO configuration.
    #[must_use]
    pub const fn as_stdio(&self) -> Option<&StdioTransportOptions> {
        match self {
            Self::Stdio(options) => Some(options),
            Self::Sse(_) => None,
        }
    }

    /// Returns SSE settings when this is an SSE configuration.
    #[must_use]
    pub const fn as_sse(&self) -> Option<&SseTransportOptions> {
        match self {
            Self::Sse(options) => Some(options),
            Self::Stdio(_) => None,
        }
    }
}

fn resolve_stdio(
    options: &BTreeMap<String, String>,
) -> Result<StdioTransportOptions, OptionFormatError> {
    let mut resolved = StdioTransportOptions::default();

    if let Some(raw) = options.get(ARGUMENTS_KEY) {
        resolved.arguments = shlex::split(raw).ok_or_else(|| {
            OptionFormatError::new(ARGUMENTS_KEY, raw, "unbalanced quotes or trailing escape")
        })?;
    }

    if let Some(raw) = options.get(WORKING_DIRECTORY_KEY) {
        if raw.trim().is_empty() {
            return Err(OptionFormatError::new(
                WORKING_DIRECTORY_KEY,
                raw,
                "working directory must not be blank",
            ));
        }
        resolved.working_directory = Some(raw.clone());
    }

    if let Some(raw) = options.get(SHUTDOWN_TIMEOUT_KEY) {
        resolved.shutdown_timeout = parse_seconds(SHUTDOWN_TIMEOUT_KEY, raw)?;
    }

    resolved.environment = collect_prefixed(options, ENV_PREFIX)?;
    Ok(resolved)
}

fn resolve_sse(
    options: &BTreeMap<String, String>,
) -> Result<SseTransportOptions, OptionFormatError> {
    let mut resolved = SseTransportOptions::default();

    if let Some(raw) = options.get(CONNECTION_TIMEOUT_KEY) {
        resolved.connection_timeout = parse_seconds(CONNECTION_TIMEOUT_KEY, raw)?;
    }

    if let Some(raw) = options.get(MAX_RECONNECT_ATTEMPTS_KEY) {
        resolved.max_reconnect_attempts = raw.trim().parse::<u32>().map_err(|err| {
            OptionFormatError::new(MAX_RECONNECT_ATTEMPTS_KEY, raw, err.to_string())
        })?;
    }

    if let Some(raw) = options.get(RECONNECT_DELAY_KEY) {
        resolved.reconnect_delay = parse_seconds(RECONNECT_DELAY_KEY, raw)?;
    }

    let headers = collect_prefixed(options, HEADER_PREFIX)?;
    if !headers.is_empty() {
        resolved.additional_headers = Some(headers);
    }

    Ok(resolved)
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, OptionFormatError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|err| OptionFormatError::new(key, raw, format!("expected whole seconds: {err}")))
}

fn collect_prefixed(
    options: &BTreeMap<String, String>,
    prefix: &str,
) -> Result<BTreeMap<String, String>, OptionFormatError> {
    let mut collected = BTreeMap::new();
    for (key, value) in options {
        let Some(name) = key.strip_prefix(prefix) else {
            continue;
        };
        if name.is_empty() {
            return Err(OptionFormatError::new(
                key.as_str(),
                value.as_str(),
                "name after prefix must not be empty",
            ));
        }
        collected.insert(name.to_owned(), value.clone());
    }
    Ok(collected)
}
