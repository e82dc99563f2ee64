//! Bounded DOM traversal
//!
//! Extends a locate attempt beyond the main document into shadow trees
//! and (nested) iframes. Traversal is breadth-first, bounded by a
//! configurable depth, and discounts match confidence per nesting level.
//! Cross-origin frames are skipped as "not searchable", never reported
//! as failures.

pub mod walker;

pub use walker::*;
