use crate::config::ConfigError;
use crate::lottery::{ErrorClass, LotteryError, SnapshotError};
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Snapshot(SnapshotError),
    Export(csv::Error),
    Lottery(LotteryError),
    Usage(String),
}

impl AppError {
    /// Client-correctable failures versus faults on our side.
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Lottery(err) => err.class(),
            AppError::Usage(_) => ErrorClass::ClientInput,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Snapshot(_)
            | AppError::Export(_) => ErrorClass::ServerFault,
        }
    }

    /// Process exit code: 2 for input the caller can fix, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self.class() {
            ErrorClass::ClientInput => 2,
            ErrorClass::ServerFault => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Snapshot(err) => write!(f, "data error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::Lottery(err) => write!(f, "lottery error: {}", err),
            AppError::Usage(message) => write!(f, "usage error: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Snapshot(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::Lottery(err) => Some(err),
            AppError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SnapshotError> for AppError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

impl From<LotteryError> for AppError {
    fn from(value: LotteryError) -> Self {
        Self::Lottery(value)
    }
}
