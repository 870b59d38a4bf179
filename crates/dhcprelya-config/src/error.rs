use thiserror::Error;

/// Startup-time configuration errors: bad syntax, unresolvable hosts,
/// bound violations, or an inventory that would leave nothing to relay.
/// Every variant is fatal -- the process exits after removing its PID file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{section}:{line}: {message}")]
    Syntax {
        section: &'static str,
        line: usize,
        message: String,
    },

    #[error("could not resolve server endpoint {0:?}: {1}")]
    UnresolvableHost(String, std::io::Error),

    #[error("server endpoint {0:?} has an invalid port")]
    BadPort(String),

    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfBounds {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("unknown [options] key {0:?}")]
    UnknownOption(String),

    #[error("unknown plugin kind {0:?} (no {0}_plugin built in)")]
    UnknownPluginKind(String),

    #[error("-f/--config cannot be combined with {0}")]
    MutuallyExclusive(&'static str),

    #[error("{0} is required")]
    MissingRequired(&'static str),

    #[error("at least one -i interface is required")]
    NoInterfaces,

    #[error("every declared interface resolved to zero servers")]
    NoUsableInterfaces,

    #[error("at least one server endpoint is required")]
    NoServers,

    #[error("config file include depth exceeded ({0})")]
    IncludeTooDeep(usize),
}
