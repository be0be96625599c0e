//! # Domain Module
//!
//! Core types for the lookup table index. No I/O: everything external is
//! reached through the ports in [`crate::ports`].

pub mod entities;
pub mod errors;
pub mod instruction;
pub mod membership;
pub mod table_account;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use instruction::*;
pub use membership::*;
pub use table_account::*;
pub use value_objects::*;
