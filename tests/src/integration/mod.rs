//! Cross-crate integration flows.

pub mod fixtures;
pub mod flows;
pub mod restart;
