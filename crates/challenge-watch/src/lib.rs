//! Page-level obstruction detection
//!
//! Inspects page-level signals independently of any single locate
//! attempt: overlays, consent gates, captchas, disabled/hidden targets,
//! invalid form fields, slow navigation and unexpected redirects.
//! Detection is best-effort; a probe that throws is logged and skipped,
//! never propagated.

pub mod detector;
pub mod types;

pub use detector::*;
pub use types::*;
