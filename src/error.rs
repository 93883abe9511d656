//! Error taxonomy for the simulation core
//!
//! Only malformed static configuration is fatal, and it is reported when a
//! stage or config table is constructed. Everything that can go wrong
//! mid-tick is recoverable and handled at the loop boundary.

use thiserror::Error;

use crate::sim::stage::StageId;

/// Errors raised by the simulation core
#[derive(Debug, Error)]
pub enum SimError {
    /// A tile grid has no rows or no columns
    #[error("tile grid is empty ({rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },

    /// A tile grid row does not match the width of the first row
    #[error("tile grid row {row} has {found} columns, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A tile code outside {0, 1, 2}
    #[error("unknown tile code {code} at row {row}, col {col}")]
    UnknownTile { row: usize, col: usize, code: u8 },

    /// A stage layout is missing from the stage set
    #[error("no layout registered for stage {0:?}")]
    MissingStage(StageId),

    /// Tuning values that would break the simulation
    #[error("invalid tuning: {0}")]
    InvalidTuning(String),

    /// A JSON config blob could not be parsed
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A config file could not be read
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::RaggedGrid {
            row: 3,
            expected: 60,
            found: 59,
        };
        assert_eq!(err.to_string(), "tile grid row 3 has 59 columns, expected 60");

        let err = SimError::MissingStage(StageId::Core);
        assert!(err.to_string().contains("Core"));
    }

    #[test]
    fn test_parse_error_converts() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: SimError = parse.into();
        assert!(matches!(err, SimError::Parse(_)));
    }
}
