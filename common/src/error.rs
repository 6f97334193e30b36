use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line carries no coercible key/value tokens")]
    Empty,
    #[error("line carries no recognized telemetry keys (saw: {0})")]
    Unrecognized(String),
}
