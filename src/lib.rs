//! # Typed Command-Line Option Sets
//!
//! This crate provides reusable sets of command-line options, which parse
//! arguments into a typed arguments record. Options are declared once with
//! callbacks that receive the record of the current parse operation, and the
//! set can then be used to parse any number of argument lists, from any
//! number of threads.
//!
//! Parsing itself is implemented by the option engine in
//! [`lib::args`], which this crate re-exports.
//!
//! ```rust
//! use osi_options::OptionSet;
//!
//! #[derive(Default)]
//! struct Args {
//!     name: String,
//!     age: u32,
//! }
//!
//! let mut options = OptionSet::<Args>::new();
//! options
//!     .add_described("n|name=", "Name of the person", |args, v| {
//!         args.name = v;
//!         Ok(())
//!     })
//!     .add_typed_described("age=", "Age in years", |args, v: u32| {
//!         args.age = v;
//!         Ok(())
//!     });
//!
//! let (args, extras) = options.parse_with_extras(["-n", "Jim", "--age=34", "rest"]).unwrap();
//! assert_eq!(args.name, "Jim");
//! assert_eq!(args.age, 34);
//! assert_eq!(extras, ["rest"]);
//! ```

#![no_std]

extern crate alloc;
extern crate core;

#[cfg(test)]
extern crate std;

pub mod action;
mod builder;
mod set;

pub use osi_lib as lib;
pub use osi_lib::args::{convert::FromArg, Error};
pub use set::OptionSet;
