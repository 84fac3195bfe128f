//! Logging subsystem

use super::{LoggerFactory, Subsystem, SubsystemContext, SubsystemError};
use crate::config::LoggingConfig;
use crate::foundation::logging::{self, Logger};
use std::any::Any;

/// Installs the `env_logger` backend and hands out category loggers
#[derive(Debug, Clone, Default)]
pub struct LoggingSubsystem {
    config: LoggingConfig,
    installed: bool,
}

impl LoggingSubsystem {
    /// Create the subsystem
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            installed: false,
        }
    }

    /// Whether this subsystem installed the process logger
    pub fn installed_backend(&self) -> bool {
        self.installed
    }
}

impl Subsystem for LoggingSubsystem {
    fn name(&self) -> &str {
        "logging"
    }

    fn initialize(&mut self, _context: &SubsystemContext) -> Result<(), SubsystemError> {
        // Another runtime or the host may already own the global logger
        self.installed = logging::try_init(&self.config.filter);
        if self.installed {
            log::info!("Logging initialized with filter '{}'", self.config.filter);
        } else {
            log::debug!("Global logger already installed; keeping it");
        }
        Ok(())
    }

    fn as_logging(&self) -> Option<&dyn LoggerFactory> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl LoggerFactory for LoggingSubsystem {
    fn create_logger(&self, category: &str) -> Logger {
        Logger::new(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetServer;
    use crate::events::EventBus;
    use std::sync::Arc;

    #[test]
    fn test_initialize_tolerates_existing_logger() {
        let context = SubsystemContext {
            events: Arc::new(EventBus::new()),
            assets: Arc::new(AssetServer::new()),
            live_worlds: Vec::new(),
        };
        let mut first = LoggingSubsystem::new(LoggingConfig::default());
        let mut second = LoggingSubsystem::new(LoggingConfig::default());
        first.initialize(&context).unwrap();
        second.initialize(&context).unwrap();
        assert!(!second.installed_backend());

        let logger = second.as_logging().unwrap().create_logger("ui");
        assert_eq!(logger.category(), "ui");
    }
}
