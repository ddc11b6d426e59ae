use crate::TransportMechanism;

/// Rejections of the grammar validator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("update information needs at least 2 fields, found {found}")]
    TooFewFields { found: usize },
    #[error("unknown transport mechanism '{0}' in update information")]
    UnknownMechanism(String),
    #[error("cannot parse {segment:?} as url: {source}")]
    UnparsableTrailingSegment {
        segment: String,
        #[source]
        source: SegmentError,
    },
    #[error("scheme is missing in '{0}', zsync needs e.g. http:// or https://")]
    MissingScheme(String),
    #[error("update information '{0}' does not end in .zsync")]
    WrongSuffix(String),
}

/// Why the last field could not be read as a url.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("control character {0:?}")]
    ControlCharacter(char),
    #[error("leading or trailing whitespace")]
    SurroundingWhitespace,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{mechanism} update information needs {expected} fields, found {found}")]
    InsufficientFields {
        mechanism: TransportMechanism,
        expected: usize,
        found: usize,
    },
    #[error("field {0:?} contains the '|' separator")]
    SeparatorInField(String),
}
