use thiserror::Error;

/// Failure channel of the engine. The parser downgrades malformed
/// declarations to warnings and never produces one of these; everything
/// listed here aborts the current operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("illegal token at '{context}' on line {line}")]
    Lexical { line: u64, context: String },
    #[error("{0}")]
    Parse(String),
    #[error("illegal page id value ({0})")]
    Range(&'static str),
    #[error("internal: {0}")]
    Internal(&'static str),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
