use std::fmt;
use thiserror::Error;


/// Error type returned by user supplied callbacks: callables, custom
/// lookups, partial providers and formatters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;


/// Classification of a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnmatchedOpenTag,
    EmptyTag,
    SectionNoClosingTag,
    InterleavedClosingTag,
    InvalidMetaTag,
    UnmatchedCloseTag,
    InvalidVariable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnmatchedOpenTag => "unmatched_open_tag",
            ErrorCode::EmptyTag => "empty_tag",
            ErrorCode::SectionNoClosingTag => "section_no_closing_tag",
            ErrorCode::InterleavedClosingTag => "interleaved_closing_tag",
            ErrorCode::InvalidMetaTag => "invalid_meta_tag",
            ErrorCode::UnmatchedCloseTag => "unmatched_close_tag",
            ErrorCode::InvalidVariable => "invalid_variable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// A fatal error raised while compiling template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {}", message(.code, .reason))]
pub struct ParseError {
    /// 1-based source line of the offending tag.
    pub line: usize,
    pub code: ErrorCode,
    /// Name of the element involved, when there is one.
    pub reason: Option<String>,
}

impl ParseError {
    pub(crate) fn new(line: usize, code: ErrorCode) -> Self {
        ParseError { line, code, reason: None }
    }

    pub(crate) fn with_reason(line: usize, code: ErrorCode, reason: &str) -> Self {
        ParseError { line, code, reason: Some(reason.to_owned()) }
    }
}

fn message(code: &ErrorCode, reason: &Option<String>) -> String {
    let reason = reason.as_deref().unwrap_or_default();
    match code {
        ErrorCode::UnmatchedOpenTag => "unmatched open tag".to_owned(),
        ErrorCode::EmptyTag => "empty tag".to_owned(),
        ErrorCode::SectionNoClosingTag => format!("section {} has no closing tag", reason),
        ErrorCode::InterleavedClosingTag => format!("interleaved closing tag: {}", reason),
        ErrorCode::InvalidMetaTag => "invalid meta tag".to_owned(),
        ErrorCode::UnmatchedCloseTag => "unmatched close tag".to_owned(),
        ErrorCode::InvalidVariable => format!("invalid variable: {}", reason),
    }
}


/// An error raised while rendering a compiled template.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("missing variable {0:?}")]
    MissingVariable(String),

    #[error("invalid variable {0:?}")]
    InvalidVariable(String),

    #[error("missing function {0:?}")]
    MissingFunction(String),

    #[error("lambda {0:?} doesn't match the required lambda signature")]
    LambdaSignature(String),

    #[error("lambda {name:?}: {source}")]
    Lambda { name: String, source: BoxError },

    #[error("partial {name:?}: {source}")]
    Partial { name: String, source: BoxError },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("format: {0}")]
    Format(BoxError),

    #[error("recursion limit of {limit} exceeded expanding {name:?}")]
    RecursionLimit { name: String, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Callable(BoxError),
}

impl RenderError {
    /// Turn an error coming back from user code into a render error,
    /// recovering it when it was a render error in the first place.
    pub(crate) fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<RenderError>() {
            Ok(err) => *err,
            Err(err) => RenderError::Callable(err),
        }
    }

    pub fn is_missing_variable(&self) -> bool {
        matches!(self, RenderError::MissingVariable(_))
    }

    pub fn is_invalid_variable(&self) -> bool {
        matches!(self, RenderError::InvalidVariable(_))
    }
}
