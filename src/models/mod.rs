//! # Domain Models
//!
//! Core data structures: targets, OS verdicts, and secure credential handling.
//!
//! ## Security Design
//!
//! The [`SecureString`] type provides memory-safe credential handling:
//! - Password data is zeroed on drop to prevent leakage via swap/core dumps
//! - Never exposed in `Debug` or `Display` implementations
//!
//! Credentials live only in process memory for the duration of a call; this
//! crate is not a credential vault and never persists them.

pub mod credentials;
pub mod target;

pub use credentials::{Credentials, SecureString, Username};
pub use target::{OsClass, Target};
