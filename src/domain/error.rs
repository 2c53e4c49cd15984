//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the code chunker
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Grammar is not installed and could not (or may not) be materialized
    #[error("grammar unavailable for '{language}': {message}")]
    GrammarUnavailable {
        /// Language whose grammar is missing
        language: String,
        /// Why the grammar could not be provided
        message: String,
    },

    /// Parser ran but produced no usable tree or zero chunks
    #[error("parse failure for {file_path}: {message}")]
    ParseFailure {
        /// File whose parse failed
        file_path: String,
        /// Description of the failure
        message: String,
    },

    /// Text could not be decoded with the requested encoding
    #[error("encoding error for {file_path}: {message}")]
    Encoding {
        /// File whose content could not be decoded
        file_path: String,
        /// Description of the decode failure
        message: String,
    },

    /// File appears to be binary and cannot be chunked as text
    #[error("binary file: {file_path}")]
    BinaryFile {
        /// Path of the binary file
        file_path: String,
    },

    /// Overlapping fallback chunking was requested for a grammar-supported language
    #[error(
        "overlapping chunks requested for '{language}' which has tree-sitter support; \
         overlapping is only for files without installed grammars"
    )]
    TreeSitterOverlap {
        /// The grammar-supported language that was rejected
        language: String,
    },

    /// Configuration file is malformed or contains invalid values
    #[error("configuration error: {message}")]
    InvalidConfig {
        /// Description of the configuration problem
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Export output could not be written
    #[error("export I/O error: {message}")]
    ExportIo {
        /// Description of the export failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No usable C/C++ compiler was found for a grammar build
    #[error("no C/C++ toolchain available: {message}")]
    ToolchainMissing {
        /// Description of the probe that failed
        message: String,
    },

    /// Grammar source download failed
    #[error("network error: {message}")]
    Network {
        /// Description of the network failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Grammar compilation or validation failed
    #[error("grammar build error for '{language}': {message}")]
    GrammarBuild {
        /// Language being built
        language: String,
        /// Compiler or validation output
        message: String,
    },

    /// Invalid argument provided to a function
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Internal invariant violation
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create a grammar-unavailable error
    pub fn grammar_unavailable(language: impl Into<String>, message: impl Into<String>) -> Self {
        Error::GrammarUnavailable {
            language: language.into(),
            message: message.into(),
        }
    }

    /// Create a parse-failure error
    pub fn parse_failure(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ParseFailure {
            file_path: file_path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
            source: None,
        }
    }

    /// Create an export I/O error
    pub fn export_io(message: impl Into<String>) -> Self {
        Error::ExportIo {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Whether the arbiter may recover from this error by downshifting
    /// to the next chunking tier
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ParseFailure { .. } | Error::Encoding { .. } | Error::GrammarUnavailable { .. }
        )
    }
}
