//! Error types for the assume-guarantee negotiation pipeline.
//!
//! Every fallible constructor in this crate returns [`Result<T>`]. Two of the
//! five kinds named by the design (`SaturatedNoSolution`, `DepthExceeded`)
//! are never returned by the constructors in this crate — they surface
//! through [`crate::negotiate::Outcome`] instead — but are kept as variants
//! here so a caller driving the lower-level [`crate::negotiate::Negotiate`]
//! entry points directly still gets a typed signal for them.

use thiserror::Error;

/// Errors produced while building or operating on automata, monitors, and
/// the negotiation loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// A required block was missing, a numeric field was out of range, a row
    /// count disagreed with its declared size, or a successor index exceeded
    /// the state count.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Two automata (or an automaton and a component) were combined despite
    /// disagreeing alphabet sizes.
    #[error("alphabet mismatch: {0}")]
    AlphabetMismatch(String),

    /// A solver was asked for a semantics other than sure or maybe.
    #[error("invalid solver mode: {0}")]
    InvalidMode(String),

    /// Iterative deepening saturated the bisimulation depth on both sides
    /// without finding a solution.
    #[error("bisimulation depth saturated without a solution")]
    SaturatedNoSolution,

    /// `max_depth` was reached before a solution was found.
    #[error("maximum negotiation depth exceeded")]
    DepthExceeded,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NegotiationError>;
