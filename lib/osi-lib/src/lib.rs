//! # Untyped Command-Line Option Engine
//!
//! This crate hosts the untyped command-line option parser that typed
//! option sets are built on. Options are registered with string prototypes
//! and callbacks, and values reach the callbacks either as raw strings or
//! converted through the `FromArg` trait.

#![no_std]

extern crate alloc;
extern crate core;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod args;
