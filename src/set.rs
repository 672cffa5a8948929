//! # Typed Option Sets
//!
//! An option set is a reusable list of option registrations bound to an
//! arguments record type `A`. Every operation on the set materializes all
//! registrations into a fresh parser, bound to a fresh arguments record, so
//! the set itself is never modified by parsing and can be shared freely.

use crate::action::{Failure, Localizer};
use crate::builder::Builder;
use osi_lib::args::{self, convert::FromArg};

/// Reusable set of command-line options, which parses arguments into a
/// freshly created arguments record of type `A`.
///
/// Options are registered with one of the `add*()` methods. Registration
/// only records the option. Prototypes are validated when the set is used,
/// and any invalid prototype makes every operation on the set fail before
/// any argument is looked at.
pub struct OptionSet<A> {
    builders: alloc::vec::Vec<Builder<A>>,
    localizer: Option<Localizer>,
}

impl<A> OptionSet<A>
where
    A: Default + 'static,
{
    /// Create a new option set without any options.
    pub fn new() -> Self {
        Self {
            builders: alloc::vec::Vec::new(),
            localizer: None,
        }
    }

    /// Create a new option set without any options, which passes all
    /// description texts through `localizer` when writing descriptions.
    pub fn with_localizer<L>(localizer: L) -> Self
    where
        L: Fn(&str) -> alloc::string::String + Send + Sync + 'static,
    {
        Self {
            builders: alloc::vec::Vec::new(),
            localizer: Some(alloc::sync::Arc::new(localizer)),
        }
    }

    fn push(&mut self, builder: Builder<A>) -> &mut Self {
        log::trace!("recorded option `{}`", builder.prototype());
        self.builders.push(builder);
        self
    }

    /// Register an option taking a single value, passed as raw string.
    pub fn add<F>(&mut self, prototype: &str, action: F) -> &mut Self
    where
        F: Fn(&mut A, alloc::string::String) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::single(prototype, None, alloc::sync::Arc::new(action)))
    }

    /// Register an option taking a single value, passed as raw string, with
    /// a description.
    pub fn add_described<F>(
        &mut self,
        prototype: &str,
        description: &str,
        action: F,
    ) -> &mut Self
    where
        F: Fn(&mut A, alloc::string::String) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::single(prototype, Some(description), alloc::sync::Arc::new(action)))
    }

    /// Register an option taking a single value, converted to `V`.
    pub fn add_typed<V, F>(&mut self, prototype: &str, action: F) -> &mut Self
    where
        V: FromArg + 'static,
        F: Fn(&mut A, V) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::single_typed::<V>(prototype, None, alloc::sync::Arc::new(action)))
    }

    /// Register an option taking a single value, converted to `V`, with a
    /// description.
    pub fn add_typed_described<V, F>(
        &mut self,
        prototype: &str,
        description: &str,
        action: F,
    ) -> &mut Self
    where
        V: FromArg + 'static,
        F: Fn(&mut A, V) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::single_typed::<V>(prototype, Some(description), alloc::sync::Arc::new(action)))
    }

    /// Register a key/value option, passing both parts as raw strings.
    pub fn add_keyed<F>(&mut self, prototype: &str, action: F) -> &mut Self
    where
        F: Fn(&mut A, alloc::string::String, alloc::string::String) -> Result<(), Failure>
            + Send + Sync + 'static,
    {
        self.push(Builder::keyed(prototype, None, alloc::sync::Arc::new(action)))
    }

    /// Register a key/value option, passing both parts as raw strings, with
    /// a description.
    pub fn add_keyed_described<F>(
        &mut self,
        prototype: &str,
        description: &str,
        action: F,
    ) -> &mut Self
    where
        F: Fn(&mut A, alloc::string::String, alloc::string::String) -> Result<(), Failure>
            + Send + Sync + 'static,
    {
        self.push(Builder::keyed(prototype, Some(description), alloc::sync::Arc::new(action)))
    }

    /// Register a key/value option, converting the key to `K` and the value
    /// to `V`.
    pub fn add_keyed_typed<K, V, F>(&mut self, prototype: &str, action: F) -> &mut Self
    where
        K: FromArg + 'static,
        V: FromArg + 'static,
        F: Fn(&mut A, K, V) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::keyed_typed::<K, V>(prototype, None, alloc::sync::Arc::new(action)))
    }

    /// Register a key/value option, converting the key to `K` and the value
    /// to `V`, with a description.
    pub fn add_keyed_typed_described<K, V, F>(
        &mut self,
        prototype: &str,
        description: &str,
        action: F,
    ) -> &mut Self
    where
        K: FromArg + 'static,
        V: FromArg + 'static,
        F: Fn(&mut A, K, V) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.push(Builder::keyed_typed::<K, V>(prototype, Some(description), alloc::sync::Arc::new(action)))
    }

    fn parser(&self) -> args::Parser<'_> {
        match self.localizer {
            Some(ref v) => args::Parser::with_localizer(&**v),
            None => args::Parser::new(),
        }
    }

    // Register all recorded options with `parser` in their recording order,
    // bound to `arguments`.
    fn materialize<'cb>(
        &'cb self,
        parser: &mut args::Parser<'cb>,
        arguments: &'cb core::cell::RefCell<A>,
    ) -> Result<(), args::Error> {
        for builder in self.builders.iter() {
            builder.materialize(parser, arguments)?;
        }

        Ok(())
    }

    /// Parse `arguments` into a new arguments record. Arguments that match
    /// no option are dropped. See [`Self::parse_with_extras()`].
    pub fn parse<Source, SourceItem>(&self, arguments: Source) -> Result<A, args::Error>
    where
        Source: IntoIterator<Item = SourceItem>,
        SourceItem: AsRef<str>,
    {
        self.parse_with_extras(arguments).map(|(v, _)| v)
    }

    /// Parse `arguments` into a new arguments record, starting out as
    /// `A::default()`. Callbacks of matched options are invoked in argument
    /// order. Returns the record together with all arguments that matched
    /// no option, in their original order.
    ///
    /// ## Errors
    ///
    /// Fails if any recorded option has an invalid prototype, in which case
    /// no callback is invoked. Otherwise fails on the first argument that
    /// cannot be handled, like a missing or malformed value, or a failing
    /// callback. The partially filled record is dropped.
    pub fn parse_with_extras<Source, SourceItem>(
        &self,
        arguments: Source,
    ) -> Result<(A, alloc::vec::Vec<alloc::string::String>), args::Error>
    where
        Source: IntoIterator<Item = SourceItem>,
        SourceItem: AsRef<str>,
    {
        let values = core::cell::RefCell::new(A::default());

        let extras = {
            let mut parser = self.parser();
            self.materialize(&mut parser, &values)?;
            parser.parse(arguments)?
        };

        log::debug!(
            "parsed {} option(s) with {} extra argument(s)",
            self.builders.len(),
            extras.len()
        );

        Ok((values.into_inner(), extras))
    }

    /// Write the descriptions of all options to `dst`, in registration
    /// order. Each option is written as one or more lines, with its names
    /// and value placeholders padded to a fixed column, followed by its
    /// description.
    ///
    /// ## Errors
    ///
    /// Fails if any recorded option has an invalid prototype or an invalid
    /// description, or if `dst` fails.
    pub fn write_option_descriptions(
        &self,
        dst: &mut dyn core::fmt::Write,
    ) -> Result<(), args::Error> {
        let values = core::cell::RefCell::new(A::default());
        let mut parser = self.parser();

        self.materialize(&mut parser, &values)?;
        parser.write_option_descriptions(dst)
    }
}

impl<A> Default for OptionSet<A>
where
    A: Default + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> core::fmt::Debug for OptionSet<A> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        fmt.debug_struct("OptionSet")
            .field("builders", &self.builders)
            .field("localized", &self.localizer.is_some())
            .finish()
    }
}
