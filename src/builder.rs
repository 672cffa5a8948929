//! # Option Builders
//!
//! Deferred option registrations. A builder carries everything needed to
//! register one option with a parser, but is not tied to any parser or
//! arguments record. It is materialized into a fresh parser for every
//! operation of an option set, binding its callback to the arguments record
//! of that operation.

use crate::action::{Action, KeyedAction};
use osi_lib::args::{self, convert::FromArg};

// Registration of a typed option with its value types erased, so typed and
// untyped builders can share a single list.
type Bind<A> = alloc::boxed::Box<
    dyn for<'cb> Fn(
        &mut args::Parser<'cb>,
        &'cb core::cell::RefCell<A>,
        &str,
        Option<&str>,
    ) -> Result<(), args::Error> + Send + Sync,
>;

/// Deferred registration of a single option.
pub(crate) enum Builder<A> {
    /// Option passing a single raw value.
    Single {
        prototype: alloc::string::String,
        description: Option<alloc::string::String>,
        action: Action<A, alloc::string::String>,
    },
    /// Option passing a single converted value.
    SingleTyped {
        prototype: alloc::string::String,
        description: Option<alloc::string::String>,
        bind: Bind<A>,
    },
    /// Key/value option passing both parts as raw values.
    Keyed {
        prototype: alloc::string::String,
        description: Option<alloc::string::String>,
        action: KeyedAction<A, alloc::string::String, alloc::string::String>,
    },
    /// Key/value option passing both parts converted.
    KeyedTyped {
        prototype: alloc::string::String,
        description: Option<alloc::string::String>,
        bind: Bind<A>,
    },
}

fn erase<A, F>(f: F) -> Bind<A>
where
    F: for<'cb> Fn(
        &mut args::Parser<'cb>,
        &'cb core::cell::RefCell<A>,
        &str,
        Option<&str>,
    ) -> Result<(), args::Error> + Send + Sync + 'static,
{
    alloc::boxed::Box::new(f)
}

impl<A> Builder<A>
where
    A: 'static,
{
    pub(crate) fn single(
        prototype: &str,
        description: Option<&str>,
        action: Action<A, alloc::string::String>,
    ) -> Self {
        Self::Single {
            prototype: prototype.into(),
            description: description.map(Into::into),
            action: action,
        }
    }

    pub(crate) fn single_typed<V>(
        prototype: &str,
        description: Option<&str>,
        action: Action<A, V>,
    ) -> Self
    where
        V: FromArg + 'static,
    {
        Self::SingleTyped {
            prototype: prototype.into(),
            description: description.map(Into::into),
            bind: erase(move |parser, arguments, prototype, description| {
                let action = action.clone();
                parser.add_typed(prototype, description, move |v: V| {
                    action(&mut *arguments.borrow_mut(), v)
                })?;
                Ok(())
            }),
        }
    }

    pub(crate) fn keyed(
        prototype: &str,
        description: Option<&str>,
        action: KeyedAction<A, alloc::string::String, alloc::string::String>,
    ) -> Self {
        Self::Keyed {
            prototype: prototype.into(),
            description: description.map(Into::into),
            action: action,
        }
    }

    pub(crate) fn keyed_typed<K, V>(
        prototype: &str,
        description: Option<&str>,
        action: KeyedAction<A, K, V>,
    ) -> Self
    where
        K: FromArg + 'static,
        V: FromArg + 'static,
    {
        Self::KeyedTyped {
            prototype: prototype.into(),
            description: description.map(Into::into),
            bind: erase(move |parser, arguments, prototype, description| {
                let action = action.clone();
                parser.add_keyed_typed(prototype, description, move |k: K, v: V| {
                    action(&mut *arguments.borrow_mut(), k, v)
                })?;
                Ok(())
            }),
        }
    }
}

impl<A> Builder<A> {
    /// Return the prototype this builder registers.
    pub(crate) fn prototype(&self) -> &str {
        match self {
            Self::Single { prototype, .. }
            | Self::SingleTyped { prototype, .. }
            | Self::Keyed { prototype, .. }
            | Self::KeyedTyped { prototype, .. } => prototype,
        }
    }

    /// Register this option with `parser`, binding its callback to
    /// `arguments`. Prototype errors are reported here, before the parser
    /// sees any argument.
    pub(crate) fn materialize<'cb>(
        &'cb self,
        parser: &mut args::Parser<'cb>,
        arguments: &'cb core::cell::RefCell<A>,
    ) -> Result<(), args::Error> {
        match self {
            Self::Single { prototype, description, action } => {
                parser.add(prototype, description.as_deref(), move |v| {
                    action(&mut *arguments.borrow_mut(), v)
                })?;
            },
            Self::Keyed { prototype, description, action } => {
                parser.add_keyed(prototype, description.as_deref(), move |k, v| {
                    action(&mut *arguments.borrow_mut(), k, v)
                })?;
            },
            Self::SingleTyped { prototype, description, bind }
            | Self::KeyedTyped { prototype, description, bind } => {
                bind(parser, arguments, prototype.as_str(), description.as_deref())?;
            },
        }

        Ok(())
    }
}

impl<A> core::fmt::Debug for Builder<A> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        let kind = match self {
            Self::Single { .. } => "Single",
            Self::SingleTyped { .. } => "SingleTyped",
            Self::Keyed { .. } => "Keyed",
            Self::KeyedTyped { .. } => "KeyedTyped",
        };

        fmt.debug_tuple(kind)
            .field(&self.prototype())
            .finish()
    }
}
