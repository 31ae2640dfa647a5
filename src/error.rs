use thiserror::Error;

/// Everything that can go fatally wrong while driving the segmenter.
///
/// Every variant here corresponds to one row of the Error Kinds table in
/// the specification's error-handling section. None of them recover on
/// their own; after one is returned from [`crate::Parser::write`] the
/// parser is left in a poisoned state until [`crate::Parser::flush`] is
/// called. The mid-stream "moof miss" recovery path (the hunt heuristic)
/// is deliberately *not* represented here, because it is not an error: it
/// never reaches the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("first chunk did not start with a valid ftyp box")]
    MissingFtyp,

    #[error("no valid moov box followed ftyp")]
    MissingMoov,

    #[error("box header declared a length that cannot be buffered in this state")]
    OversizedHeader,

    #[error("expected moof box not found on cold start")]
    MissingMoof,

    #[error("moov contained no avcC marker")]
    MissingCodec,

    #[error("expected mdat box not found after moof")]
    MissingMdat,

    /// A write arrived after a prior fatal error with no intervening
    /// [`crate::Parser::flush`]. The wrapped error is the original fault.
    #[error("parser is poisoned by a previous error: {0}")]
    Poisoned(Box<ParseError>),
}
