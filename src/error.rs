//! Error types for the marker-deconv library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DeconvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}: {reason}")]
    Parse {
        value: String,
        row: usize,
        col: usize,
        reason: String,
    },

    /// Invalid method name, empty group, inconsistent size bounds.
    #[error("Configuration error in {component}: {message}")]
    Configuration { component: String, message: String },

    /// Region or sample spaces that do not line up.
    #[error("Data mismatch in {component}: {message}")]
    DataMismatch { component: String, message: String },

    /// Rank-deficient matrices and non-finite statistics.
    #[error("Numerical error in {component}: {message}")]
    Numerical { component: String, message: String },

    /// First failure reported by a parallel worker.
    #[error("Worker for chunk {chunk} failed: {source}")]
    ParallelWorker {
        chunk: usize,
        #[source]
        source: Box<DeconvError>,
    },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeconvError {
    pub fn configuration(component: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.to_string(),
            message: message.into(),
        }
    }

    pub fn data_mismatch(component: &str, message: impl Into<String>) -> Self {
        Self::DataMismatch {
            component: component.to_string(),
            message: message.into(),
        }
    }

    pub fn numerical(component: &str, message: impl Into<String>) -> Self {
        Self::Numerical {
            component: component.to_string(),
            message: message.into(),
        }
    }

    /// Unwrap a worker failure to the error the worker raised.
    pub fn root(&self) -> &DeconvError {
        match self {
            Self::ParallelWorker { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DeconvError>;
