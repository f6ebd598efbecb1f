//! Domain error types.

use std::fmt;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MisalignedRange,
    CalendarExhausted,
    OrderRejected,
    InsufficientPosition,
    InsufficientCash,
    DuplicateBarClose,
    NotSupported,
    InvalidConfig,
    DataSource,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MisalignedRange => "misaligned range",
            ErrorKind::CalendarExhausted => "calendar exhausted",
            ErrorKind::OrderRejected => "order rejected",
            ErrorKind::InsufficientPosition => "insufficient position",
            ErrorKind::InsufficientCash => "insufficient cash",
            ErrorKind::DuplicateBarClose => "duplicate bar close",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::DataSource => "data source",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

/// Top-level error type for nestrade.
#[derive(Debug, thiserror::Error)]
pub enum NestradeError {
    #[error("range {start} .. {end} is not a whole number of {freq} bars")]
    MisalignedRange {
        start: String,
        end: String,
        freq: String,
    },

    #[error("calendar exhausted after {bar_count} bars of {freq}")]
    CalendarExhausted { freq: String, bar_count: usize },

    #[error("cannot sell {requested} of {instrument}: holding {held}")]
    InsufficientPosition {
        instrument: String,
        requested: f64,
        held: f64,
    },

    #[error("cannot buy {instrument} for {required}: cash {available}")]
    InsufficientCash {
        instrument: String,
        required: f64,
        available: f64,
    },

    #[error("bar starting {start} already closed (last close started {last})")]
    DuplicateBarClose { start: String, last: String },

    #[error("{operation} is not supported by this executor")]
    NotSupported { operation: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("level {level} ({freq}) bar {bar}: {source}")]
    AtBar {
        level: usize,
        freq: String,
        bar: usize,
        #[source]
        source: Box<NestradeError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NestradeError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        NestradeError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The kind of the root cause, looking through bar context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NestradeError::MisalignedRange { .. } => ErrorKind::MisalignedRange,
            NestradeError::CalendarExhausted { .. } => ErrorKind::CalendarExhausted,
            NestradeError::InsufficientPosition { .. } => ErrorKind::InsufficientPosition,
            NestradeError::InsufficientCash { .. } => ErrorKind::InsufficientCash,
            NestradeError::DuplicateBarClose { .. } => ErrorKind::DuplicateBarClose,
            NestradeError::NotSupported { .. } => ErrorKind::NotSupported,
            NestradeError::InvalidConfig { .. }
            | NestradeError::ConfigParse { .. }
            | NestradeError::ConfigMissing { .. }
            | NestradeError::ConfigInvalid { .. } => ErrorKind::InvalidConfig,
            NestradeError::DataSource { .. } => ErrorKind::DataSource,
            NestradeError::AtBar { source, .. } => source.kind(),
            NestradeError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<&NestradeError> for std::process::ExitCode {
    fn from(err: &NestradeError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::InvalidConfig | ErrorKind::MisalignedRange => 2,
            ErrorKind::DataSource => 3,
            ErrorKind::CalendarExhausted
            | ErrorKind::DuplicateBarClose
            | ErrorKind::NotSupported => 4,
            ErrorKind::InsufficientPosition
            | ErrorKind::InsufficientCash
            | ErrorKind::OrderRejected => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_looks_through_bar_context() {
        let inner = NestradeError::InsufficientPosition {
            instrument: "X".into(),
            requested: 200.0,
            held: 100.0,
        };
        let wrapped = NestradeError::AtBar {
            level: 1,
            freq: "30minute".into(),
            bar: 4,
            source: Box::new(NestradeError::AtBar {
                level: 2,
                freq: "1minute".into(),
                bar: 17,
                source: Box::new(inner),
            }),
        };
        assert_eq!(wrapped.kind(), ErrorKind::InsufficientPosition);
    }

    #[test]
    fn bar_context_names_level_and_bar() {
        let err = NestradeError::AtBar {
            level: 0,
            freq: "1day".into(),
            bar: 3,
            source: Box::new(NestradeError::CalendarExhausted {
                freq: "30minute".into(),
                bar_count: 8,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("level 0"));
        assert!(msg.contains("bar 3"));
        assert!(msg.contains("calendar exhausted"));
    }

    #[test]
    fn config_errors_are_invalid_config() {
        let err = NestradeError::ConfigMissing {
            section: "backtest".into(),
            key: "start_time".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn exit_codes_follow_kind() {
        let err = NestradeError::invalid_config("bad");
        assert_eq!(
            std::process::ExitCode::from(&err),
            std::process::ExitCode::from(2)
        );
    }
}
