//! # trainapp_core
//!
//! Core types for trainapp applications.
//!
//! This crate provides:
//! - [`Param`] descriptors that declare a hook's parameters
//! - [`HookArgs`] holding the typed values a hook is called with
//! - [`Hook`] identities and the [`Goal`] of a monitored value
//! - [`Seed`] for deterministic shuffling
//!
//! ## Example
//!
//! ```rust
//! use trainapp_core::{HookArgs, Param};
//!
//! let params = vec![
//!     Param::int("hidden_size").default(8).help("Width of the hidden layer"),
//!     Param::choice("activation", ["relu", "gelu"]).default("relu"),
//! ];
//! let args = HookArgs::from_params(&params);
//! assert_eq!(args.get::<usize>("hidden_size").unwrap(), 8);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hook;
mod param;
mod seed;

pub use error::{CoreError, Result};
pub use hook::{Goal, Hook};
pub use param::{FromParamValue, HookArgs, Param, ParamKind, ParamValue};
pub use seed::Seed;
