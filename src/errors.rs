use std::fmt;

use thiserror::Error;

/// Where a runtime failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub name: &'static str,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.line)
    }
}

/// Coarse classification of every [`YamlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StructuralViolation,
    BufferOverflow,
    ParseError,
    RuntimeError,
}

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("structural violation: {message}")]
    StructuralViolation { message: String },

    #[error("buffer overflow: required {required} bytes, available {available}")]
    BufferOverflow { required: usize, available: usize },

    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("runtime error at {location}: {message}")]
    Runtime {
        message: String,
        location: SourceLocation,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {message}")]
    Config { message: String },
}

impl YamlError {
    pub fn structural(message: impl Into<String>) -> Self {
        Self::StructuralViolation {
            message: message.into(),
        }
    }

    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Map this error onto the four public error kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            YamlError::StructuralViolation { .. } => ErrorKind::StructuralViolation,
            YamlError::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            YamlError::Parse { .. } => ErrorKind::ParseError,
            YamlError::Runtime { .. } | YamlError::Io(_) | YamlError::Config { .. } => {
                ErrorKind::RuntimeError
            }
        }
    }
}

pub type YamlResult<T> = Result<T, YamlError>;
