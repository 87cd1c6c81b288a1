//! Error kinds for the three components, consolidated into one
//! host-visible error type: callers match on nothing beyond `Display`, but
//! the internal variants stay distinguishable for logging.

use thiserror::Error;

/// Errors raised while parsing a single JUnit-family XML document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JunitParseError {
    #[error("malformed xml: {0}")]
    MalformedXml(String),
    #[error("no <testsuite> or <testsuites> root element found")]
    NoTestSuiteFound,
    #[error("<testcase> is missing a name")]
    MissingTestCaseName,
}

/// Errors raised while decoding one `test_results_files` entry of a raw
/// upload envelope.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid upload envelope: {0}")]
    InvalidEnvelope(String),

    #[error("failed to decode report `{file}`: {reason}")]
    DecodeFailure { file: String, reason: String },

    #[error("failed to parse report `{file}`: {source}")]
    Parser {
        file: String,
        #[source]
        source: JunitParseError,
    },

    #[error("corrupt aggregate store: {0}")]
    CorruptAggregate(String),
}

/// What every host-facing entry point returns.
pub type Result<T> = std::result::Result<T, Error>;
