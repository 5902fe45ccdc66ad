use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty dedup key, unsupported SRS, etc.).
    ConfigValidation(String),
    /// A lookup table is missing a column it must have.
    MissingColumn { table: String, column: String },
    /// A dedup key column does not exist in the merged table.
    UnknownKeyColumn(String),
    /// Malformed lookup table (CSV framing, bad encoding, etc.).
    Lookup { table: String, message: String },
    /// Nothing to reconcile: every input table was skipped.
    NoInput,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "{table}: missing column '{column}'")
            }
            Self::UnknownKeyColumn(column) => {
                write!(f, "duplicate key column '{column}' not present in any input table")
            }
            Self::Lookup { table, message } => write!(f, "{table}: {message}"),
            Self::NoInput => write!(f, "no input tables could be loaded"),
        }
    }
}

impl std::error::Error for ReconError {}
