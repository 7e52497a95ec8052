//! Active-language registry and display-string lookup
//!
//! The registry is the single source of truth for which language the
//! client is using. Command grammars and displayed text both read it.

mod registry;
mod translations;

pub use registry::{LanguageCode, LanguageRegistry};
pub use translations::translate;
