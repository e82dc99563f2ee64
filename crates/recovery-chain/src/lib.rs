//! Ordered recovery tactics
//!
//! Invoked only after every ranked candidate has failed. Each tactic is
//! a tagged variant with an explicit priority, an applicability
//! predicate over the failed-resolution context, and a proposal action
//! that produces a new locator to re-validate. Per-tactic retry caps
//! and timeouts plus a chain-wide deadline make termination a
//! structural property rather than a hope.

pub mod chain;
pub mod tactics;
pub mod types;

pub use chain::*;
pub use tactics::*;
pub use types::*;
