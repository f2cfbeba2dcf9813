//! # amichroot Config
//!
//! Validation and normalization of chroot image build options.
//!
//! This crate turns an untyped option bag into a fully-defaulted
//! [`BuildConfig`], or reports every problem with it in one pass, before any
//! mount, attach, or registration step runs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod defaults;
pub mod diagnostics;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validator;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use defaults::*;
pub use diagnostics::*;
pub use loader::*;
pub use schema::*;
pub use template::{Template, TemplateError};
pub use validator::*;
pub use value::*;
