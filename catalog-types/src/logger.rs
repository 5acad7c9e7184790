use derive_more::Display;
use std::sync::Arc;
use time::OffsetDateTime;

/// Syslog severities, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Level {
    #[display("emergency")]
    Emergency,
    #[display("alert")]
    Alert,
    #[display("critical")]
    Critical,
    #[display("error")]
    Error,
    #[display("warning")]
    Warning,
    #[display("notice")]
    Notice,
    #[display("info")]
    Info,
    #[display("debug")]
    Debug,
}

impl From<Level> for log::Level {
    fn from(l: Level) -> Self {
        match l {
            Level::Emergency | Level::Alert | Level::Critical | Level::Error => log::Level::Error,
            Level::Warning => log::Level::Warn,
            Level::Notice | Level::Info => log::Level::Info,
            Level::Debug => log::Level::Debug,
        }
    }
}

pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    /// Must not fail; a handler that cannot deliver drops the record.
    fn handle(&self, message: &str, level: Level, context: &str, created_at: OffsetDateTime);
}

/// Forwards records into the `log` facade.
pub struct LogHandler;

impl Handler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    fn handle(&self, message: &str, level: Level, context: &str, _created_at: OffsetDateTime) {
        log::log!(target: "catalog", log::Level::from(level), "[{context}] {level}: {message}");
    }
}

#[derive(Clone)]
pub struct Logger {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(vec![Arc::new(LogHandler)])
    }
}

impl Logger {
    pub fn new(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.name())
    }

    pub fn log(&self, level: Level, message: &str, context: &str) {
        let now = OffsetDateTime::now_utc();
        for h in &self.handlers {
            h.handle(message, level, context, now);
        }
    }

    pub fn alert(&self, message: &str, context: &str) {
        self.log(Level::Alert, message, context)
    }

    pub fn critical(&self, message: &str, context: &str) {
        self.log(Level::Critical, message, context)
    }

    pub fn error(&self, message: &str, context: &str) {
        self.log(Level::Error, message, context)
    }

    pub fn warning(&self, message: &str, context: &str) {
        self.log(Level::Warning, message, context)
    }

    pub fn notice(&self, message: &str, context: &str) {
        self.log(Level::Notice, message, context)
    }

    pub fn info(&self, message: &str, context: &str) {
        self.log(Level::Info, message, context)
    }

    pub fn debug(&self, message: &str, context: &str) {
        self.log(Level::Debug, message, context)
    }
}
