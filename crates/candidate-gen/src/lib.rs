//! Locator candidate generation
//!
//! Turns an abstract element descriptor into an ordered list of locator
//! candidates by walking a fixed priority table of locator families.
//! Pure: no page contact, no side effects.

pub mod generator;

pub use generator::*;
