use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// Threshold outside [0, 100], not finite, or low above high.
    InvalidThreshold(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty name, zero corpus limit, etc.).
    ConfigValidation(String),
    /// Missing required column in a CSV header.
    MissingColumn { source: String, column: String },
    /// Record without a name after trimming.
    MissingName { source: String, line: usize },
    /// Date parse error.
    DateParse { source: String, line: usize, value: String },
    /// Canonical record id parse error.
    IdParse { source: String, line: usize, value: String },
    /// Malformed CSV feed (ragged rows, bad quoting).
    Csv { source: String, message: String },
    /// Malformed XML feed.
    Xml(String),
    /// Input file extension is neither csv nor xml.
    UnsupportedFormat(String),
    /// Corpus snapshot exceeds the configured ceiling.
    CorpusTooLarge { size: usize, limit: usize },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreshold(msg) => write!(f, "invalid threshold: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "{source}: missing column '{column}'")
            }
            Self::MissingName { source, line } => {
                write!(f, "{source}, record {line}: name is required")
            }
            Self::DateParse { source, line, value } => {
                write!(f, "{source}, record {line}: cannot parse date '{value}'")
            }
            Self::IdParse { source, line, value } => {
                write!(f, "{source}, record {line}: cannot parse id '{value}'")
            }
            Self::Csv { source, message } => write!(f, "{source}: CSV error: {message}"),
            Self::Xml(msg) => write!(f, "XML error: {msg}"),
            Self::UnsupportedFormat(path) => {
                write!(f, "unsupported input format: {path} (expected .csv or .xml)")
            }
            Self::CorpusTooLarge { size, limit } => {
                write!(f, "corpus has {size} records, limit is {limit}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
