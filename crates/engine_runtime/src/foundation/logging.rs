//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace, Level};

/// Initialize the logging system with a filter string (`RUST_LOG` syntax)
///
/// Returns `false` when a global logger was already installed, which is
/// expected in tests and when several runtimes share a process.
pub fn try_init(filter: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filter)
        .try_init()
        .is_ok()
}

/// Logger bound to a category name
///
/// Records go through the `log` facade with the category as the target, so
/// backends can filter per category (`RUST_LOG=serialization=debug`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    category: String,
}

impl Logger {
    /// Create a logger for the given category
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }

    /// Category this logger reports under
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Emit a record at the given level
    pub fn log(&self, level: Level, args: std::fmt::Arguments<'_>) {
        log::log!(target: self.category.as_str(), level, "{}", args);
    }

    /// Emit an error record
    pub fn error(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Emit a warning record
    pub fn warn(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    /// Emit an info record
    pub fn info(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    /// Emit a debug record
    pub fn debug(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    /// Emit a trace record
    pub fn trace(&self, args: std::fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_keeps_category() {
        let logger = Logger::new("serialization");
        assert_eq!(logger.category(), "serialization");

        // Must not panic without a backend installed
        logger.warn(format_args!("unknown component {}", "audio.sound"));
    }

    #[test]
    fn test_repeated_init_is_tolerated() {
        try_init("warn");
        assert!(!try_init("warn"));
    }
}
