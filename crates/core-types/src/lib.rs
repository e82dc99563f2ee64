//! Shared primitives for the Wayfinder element-resolution engine
//!
//! This crate holds the vocabulary every other crate speaks:
//! - Element descriptors (what the caller wants to find)
//! - Locators and locator families (how the page is asked)
//! - DOM locations (where a match was found)
//! - The resolve-error taxonomy

pub mod descriptor;
pub mod errors;
pub mod location;
pub mod locator;

pub use descriptor::*;
pub use errors::*;
pub use location::*;
pub use locator::*;
