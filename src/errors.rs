//! Module for errors.
use std::{error::Error, fmt::Display};

/// Error from building or writing opacity tables.
#[derive(Debug)]
pub enum OpacityErr {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Database error
    Database(::rusqlite::Error),
    /// Error forwarded from ndarray when an array could not be shaped.
    Shape(::ndarray::ShapeError),
    /// Error forwarded from the strum crate
    StrumError(strum::ParseError),
    /// General error with any cause information erased and replaced by a string
    GeneralError(String),

    // My own errors from this crate
    /// A sample did not land on any value of an axis within tolerance.
    GridMismatch {
        /// Name of the axis that failed to match.
        axis: &'static str,
        /// The offending value.
        value: f64,
    },
    /// A flat array did not have the length its declared shape requires.
    LengthMismatch {
        /// Number of values the shape calls for.
        expected: usize,
        /// Number of values actually found.
        actual: usize,
    },
    /// A grid cell was never written by the source data.
    UnfilledCell {
        /// Index of the first unfilled cell found.
        index: Vec<usize>,
    },
    /// A fixed width text field was given too much text.
    OverCapacity {
        /// Name of the field.
        field: &'static str,
        /// Length of the text that was provided.
        len: usize,
        /// Capacity of the field.
        capacity: usize,
    },
    /// A text record could not be parsed.
    MalformedRecord {
        /// The text of the record, or a description of where it was.
        line: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The configuration handed to a builder is unusable.
    InvalidConfig(String),
    /// The database structure is wrong.
    InvalidSchema,
    /// The database has no header row yet.
    MissingHeader,
    /// No match in the database.
    NotInIndex,
}

impl Display for OpacityErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::OpacityErr::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            Database(err) => write!(f, "database error: {}", err),
            Shape(err) => write!(f, "array shape error: {}", err),
            StrumError(err) => write!(f, "error forwarded from strum crate: {}", err),
            GeneralError(msg) => write!(f, "general error forwarded: {}", msg),

            GridMismatch { axis, value } => {
                write!(f, "grid mismatch: {} value {:e} is not on the axis", axis, value)
            }
            LengthMismatch { expected, actual } => write!(
                f,
                "length mismatch: expected {} values, found {}",
                expected, actual
            ),
            UnfilledCell { index } => write!(f, "grid cell {:?} was never filled", index),
            OverCapacity {
                field,
                len,
                capacity,
            } => write!(
                f,
                "field '{}' holds {} characters, capacity is {}",
                field, len, capacity
            ),
            MalformedRecord { line, reason } => {
                write!(f, "malformed record ({}): '{}'", reason, line)
            }
            InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            InvalidSchema => write!(f, "invalid database format"),
            MissingHeader => write!(f, "database has no header row"),
            NotInIndex => write!(f, "no match in the database"),
        }
    }
}

impl Error for OpacityErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use crate::errors::OpacityErr::*;

        match self {
            IO(err) => Some(err),
            Database(err) => Some(err),
            Shape(err) => Some(err),
            StrumError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<::std::io::Error> for OpacityErr {
    fn from(err: ::std::io::Error) -> OpacityErr {
        OpacityErr::IO(err)
    }
}

impl From<::rusqlite::Error> for OpacityErr {
    fn from(err: ::rusqlite::Error) -> OpacityErr {
        OpacityErr::Database(err)
    }
}

impl From<::ndarray::ShapeError> for OpacityErr {
    fn from(err: ::ndarray::ShapeError) -> OpacityErr {
        OpacityErr::Shape(err)
    }
}

impl From<strum::ParseError> for OpacityErr {
    fn from(err: strum::ParseError) -> OpacityErr {
        OpacityErr::StrumError(err)
    }
}
