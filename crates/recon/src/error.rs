use std::fmt;

use registrar_core::EntityKind;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (threshold ordering, candidate cap, etc.).
    ConfigValidation(String),
    /// Missing required column in input data.
    MissingColumn { column: String },
    /// Attribute column mapped to a key the entity kind does not recognize.
    UnrecognizedAttribute { column: String, kind: EntityKind },
    /// Execution requested while the cardinality report awaits confirmation.
    UnconfirmedCardinality { many_to_one: usize, one_to_many: usize },
    /// Registry operation failure surfaced by the caller's backend.
    Registry(String),
    /// IO error (CSV read, report serialization, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::UnrecognizedAttribute { column, kind } => {
                write!(f, "column '{column}' is not a recognized {kind} attribute")
            }
            Self::UnconfirmedCardinality { many_to_one, one_to_many } => write!(
                f,
                "cardinality report not confirmed ({many_to_one} many-to-one, {one_to_many} one-to-many)"
            ),
            Self::Registry(msg) => write!(f, "registry error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
