//! # Option Actions
//!
//! Callback types of typed option sets. Callbacks receive the arguments
//! record of the current parse operation, followed by the option values.
//! They are shared across parse operations and thus must be `Send + Sync`.

pub use osi_lib::args::Failure;

/// Callback of an option taking a single value.
pub type Action<A, V> = alloc::sync::Arc<
    dyn Fn(&mut A, V) -> Result<(), Failure> + Send + Sync,
>;

/// Callback of a key/value option.
pub type KeyedAction<A, K, V> = alloc::sync::Arc<
    dyn Fn(&mut A, K, V) -> Result<(), Failure> + Send + Sync,
>;

/// Translation hook applied to option descriptions.
pub type Localizer = alloc::sync::Arc<
    dyn Fn(&str) -> alloc::string::String + Send + Sync,
>;
