//! # amichroot
//!
//! Command line front end for chroot image build option validation.
//!
//! Loads an options file, runs it through
//! [`amichroot_config::ConfigValidator`], and prints either the normalized
//! configuration or every error that blocks the build.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod cli;
pub mod error;
pub mod report;

pub use app::*;
pub use cli::*;
pub use error::*;
pub use report::*;
