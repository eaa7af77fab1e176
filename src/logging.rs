//! Logging setup for the `perdocman` binary.
//!
//! Events go to stderr so stdout stays parseable for scripts. `RUST_LOG`
//! takes precedence over the CLI-selected preset.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Warnings and errors only
    Quiet,
    #[default]
    Normal,
    /// Pipeline detail, including preview fallbacks
    Verbose,
}

impl LogPreset {
    /// `quiet` wins over `verbose`.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            LogPreset::Quiet
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Normal
        }
    }

    fn directives(self) -> &'static str {
        match self {
            LogPreset::Quiet => "perdocman=warn,tower_http=error",
            LogPreset::Normal => "perdocman=info,tower_http=warn",
            LogPreset::Verbose => "perdocman=debug,tower_http=debug",
        }
    }
}

pub fn build_filter(preset: LogPreset) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }
    EnvFilter::try_new(preset.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(preset: LogPreset, format: LogFormat) {
    let filter = build_filter(preset);

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(LogPreset::from_flags(true, true), LogPreset::Quiet);
        assert_eq!(LogPreset::from_flags(true, false), LogPreset::Verbose);
        assert_eq!(LogPreset::from_flags(false, false), LogPreset::Normal);
    }
}
