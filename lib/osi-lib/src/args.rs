//! # Program Arguments
//!
//! This module implements a command-line option parser for runtime arguments
//! passed to a program. Options are registered with a prototype string that
//! describes their names and how they take values, together with a callback
//! that is invoked whenever the option is found on the command-line.
//!
//! ## Prototypes
//!
//! A prototype lists all names of an option separated by `|`, for instance
//! `v|verbose`. Single-character names are matched as short options (`-v`),
//! longer names as long options (`--verbose`), but either spelling is
//! accepted for any name. A trailing `=` makes the value required, a
//! trailing `:` makes it optional. Options taking two values (key/value
//! options) can list their separators after the type character, either as
//! single characters (`D=:`) or enclosed in braces (`D={=>}`). The special
//! name `<>` registers a handler for all arguments that match no option.

use crate::args::convert::FromArg;

// Width of the prototype column when writing option descriptions.
const OPTION_WIDTH: usize = 29;

// Total line width when writing option descriptions.
const LINE_WIDTH: usize = 80;

// Option name of the handler for unmatched arguments.
const DEFAULT_NAME: &str = "<>";

/// Error type returned by option callbacks. Any error type can be folded
/// into it, so callbacks can use `?` on their own fallible operations.
pub type Failure = alloc::boxed::Box<dyn core::error::Error + Send + Sync>;

/// Error definitions for all possible errors of the argument parser.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Specified prototype is empty.
    PrototypeEmpty,
    /// Specified prototype contains an empty option name.
    NameEmpty(alloc::string::String),
    /// Option names of a prototype use different value types.
    TypeConflict(alloc::string::String, char, char),
    /// Key/value separators of a prototype have unbalanced braces.
    SeparatorIllFormed(alloc::string::String),
    /// Key/value separators were given for an option taking a single value.
    SeparatorUnexpected(alloc::string::String, usize),
    /// Value count cannot be used with the value type of the prototype.
    ValueCount(alloc::string::String, usize),
    /// Handler for unmatched arguments was declared to take values.
    DefaultTakesValues(alloc::string::String),
    /// Option name is already registered.
    NameDuplicate(alloc::string::String),
    /// Option requires a value, but none was given.
    ValueMissing(alloc::string::String),
    /// Option was given more values than it takes.
    ValueExcess(alloc::string::String, usize, usize),
    /// Value of an option cannot be converted to the requested type.
    ValueParse {
        option: alloc::string::String,
        value: alloc::string::String,
        target: &'static str,
        error: convert::Error,
    },
    /// Bundled short option is not known.
    BundleUnknown(alloc::string::String),
    /// Callback of an option failed.
    Action(alloc::string::String, Failure),
    /// Option description contains an unmatched closing brace.
    DescriptionInvalid(alloc::string::String),
    /// Destination of option descriptions failed.
    Write(core::fmt::Error),
}

/// Value requirements of an option.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueType {
    /// Option takes no value.
    None,
    /// Option takes a value, but can be used without.
    Optional,
    /// Option requires a value.
    Required,
}

/// Parsed option prototype. This carries the names of an option, as well as
/// all information on how the option takes values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prototype {
    names: alloc::vec::Vec<alloc::string::String>,
    value_type: ValueType,
    count: usize,
    separators: Option<alloc::vec::Vec<alloc::string::String>>,
}

// Values collected for an option, which are handed to its action once
// complete.
struct Context<'a> {
    option: &'a str,
    value_type: ValueType,
    values: &'a [Option<alloc::string::String>],
}

// Type-erased option callback. It converts the collected values as required
// and forwards them to the registered callback.
type Action<'cb> = alloc::boxed::Box<dyn FnMut(&Context<'_>) -> Result<(), Error> + 'cb>;

struct Entry<'cb> {
    prototype: Prototype,
    description: Option<alloc::string::String>,
    action: Action<'cb>,
}

// Option that was matched on the command-line but still waits for values.
struct Pending {
    entry: usize,
    option: alloc::string::String,
    values: alloc::vec::Vec<Option<alloc::string::String>>,
}

/// Command-line parser setup, which holds all registered options and their
/// callbacks. Callbacks can borrow from their environment for `'cb`.
pub struct Parser<'cb> {
    entries: alloc::vec::Vec<Entry<'cb>>,
    names: alloc::collections::BTreeMap<alloc::string::String, usize>,
    localizer: Option<&'cb dyn Fn(&str) -> alloc::string::String>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::PrototypeEmpty => fmt.write_str("Option prototype is empty"),
            Self::NameEmpty(p) => fmt.write_fmt(core::format_args!("Empty option names are not supported: {}", p)),
            Self::TypeConflict(p, a, b) => fmt.write_fmt(core::format_args!("Conflicting option types `{}` vs. `{}`: {}", a, b, p)),
            Self::SeparatorIllFormed(p) => fmt.write_fmt(core::format_args!("Ill-formed key/value separator: {}", p)),
            Self::SeparatorUnexpected(p, n) => fmt.write_fmt(core::format_args!("Cannot provide key/value separators for options taking {} value(s): {}", n, p)),
            Self::ValueCount(p, n) => fmt.write_fmt(core::format_args!("Cannot provide a value count of {} for option: {}", n, p)),
            Self::DefaultTakesValues(p) => fmt.write_fmt(core::format_args!("Default option handler cannot take values: {}", p)),
            Self::NameDuplicate(n) => fmt.write_fmt(core::format_args!("Option name is already registered: {}", n)),
            Self::ValueMissing(o) => fmt.write_fmt(core::format_args!("Missing required value for option `{}`", o)),
            Self::ValueExcess(o, n, m) => fmt.write_fmt(core::format_args!("Found {} values for option `{}` when expecting {}", n, o, m)),
            Self::ValueParse { option, value, target, error } => fmt.write_fmt(core::format_args!("Cannot convert `{}` to type {} for option `{}`: {}", value, target, option, error)),
            Self::BundleUnknown(o) => fmt.write_fmt(core::format_args!("Cannot bundle unregistered option `{}`", o)),
            Self::Action(o, e) => fmt.write_fmt(core::format_args!("Callback for option `{}` failed: {}", o, e)),
            Self::DescriptionInvalid(d) => fmt.write_fmt(core::format_args!("Invalid option description: {}", d)),
            Self::Write(_) => fmt.write_str("Cannot write option descriptions"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::ValueParse { error, .. } => Some(error),
            Self::Action(_, e) => Some(&**e),
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl From<core::fmt::Error> for Error {
    fn from(v: core::fmt::Error) -> Self {
        Self::Write(v)
    }
}

impl Prototype {
    // Parse the key/value separators following the type character of an
    // option name.
    fn parse_separators(
        prototype: &str,
        tail: &str,
        separators: &mut alloc::vec::Vec<alloc::string::String>,
    ) -> Result<(), Error> {
        let mut start: Option<usize> = None;

        for (i, c) in tail.char_indices() {
            match c {
                '{' => {
                    if start.is_some() {
                        return Err(Error::SeparatorIllFormed(prototype.into()));
                    }
                    start = Some(i + 1);
                },
                '}' => match start.take() {
                    None => return Err(Error::SeparatorIllFormed(prototype.into())),
                    Some(s) => separators.push(tail[s..i].into()),
                },
                _ => {
                    if start.is_none() {
                        separators.push(alloc::string::ToString::to_string(&c));
                    }
                },
            }
        }

        match start {
            None => Ok(()),
            Some(_) => Err(Error::SeparatorIllFormed(prototype.into())),
        }
    }

    /// Parse an option prototype for an option taking `count` values. This
    /// verifies that the prototype is well-formed and suitable for the value
    /// count.
    pub fn parse(
        prototype: &str,
        count: usize,
    ) -> Result<Self, Error> {
        if prototype.is_empty() {
            return Err(Error::PrototypeEmpty);
        }

        let mut names = alloc::vec::Vec::new();
        let mut type_char: Option<char> = None;
        let mut separators = alloc::vec::Vec::new();

        for alias in prototype.split('|') {
            let (name, tail) = match alias.find(|v: char| v == '=' || v == ':') {
                None => (alias, None),
                Some(end) => (&alias[..end], Some(&alias[end..])),
            };

            if name.is_empty() {
                return Err(Error::NameEmpty(prototype.into()));
            }
            names.push(name.into());

            if let Some(tail) = tail {
                // Both type characters are ASCII, so the remainder starts
                // right after the first byte.
                let c = if tail.starts_with('=') { '=' } else { ':' };
                match type_char {
                    None => type_char = Some(c),
                    Some(t) if t == c => {},
                    Some(t) => return Err(Error::TypeConflict(prototype.into(), t, c)),
                }
                Self::parse_separators(prototype, &tail[1..], &mut separators)?;
            }
        }

        let value_type = match type_char {
            None => ValueType::None,
            Some('=') => ValueType::Required,
            Some(_) => ValueType::Optional,
        };

        if (count == 0 && value_type != ValueType::None)
            || (count > 1 && value_type == ValueType::None)
        {
            return Err(Error::ValueCount(prototype.into(), count));
        }
        if count <= 1 && !separators.is_empty() {
            return Err(Error::SeparatorUnexpected(prototype.into(), count));
        }
        if names.iter().any(|v| v == DEFAULT_NAME)
            && ((names.len() == 1 && value_type != ValueType::None)
                || (names.len() > 1 && count > 1))
        {
            return Err(Error::DefaultTakesValues(prototype.into()));
        }

        // Key/value options split on `:` and `=` unless told otherwise. A
        // single empty separator (`{}`) disables splitting.
        let separators = if count <= 1 {
            None
        } else if separators.is_empty() {
            Some(alloc::vec![":".into(), "=".into()])
        } else if separators.len() == 1 && separators[0].is_empty() {
            None
        } else {
            Some(separators)
        };

        Ok(Self {
            names: names,
            value_type: value_type,
            count: count,
            separators: separators,
        })
    }

    /// Return all names of this option, in prototype order.
    pub fn names(&self) -> &[alloc::string::String] {
        &self.names
    }

    /// Return the value requirements of this option.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Return the number of values this option takes.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Return the key/value separators of this option, if its values are
    /// split.
    pub fn separators(&self) -> Option<&[alloc::string::String]> {
        self.separators.as_deref()
    }
}

impl<'a> Context<'a> {
    fn value(&self, index: usize) -> Result<Option<&'a str>, Error> {
        if self.value_type == ValueType::Required && index >= self.values.len() {
            return Err(Error::ValueMissing(self.option.into()));
        }

        Ok(self.values.get(index).and_then(|v| v.as_deref()))
    }

    fn raw(&self, index: usize) -> Result<alloc::string::String, Error> {
        Ok(self.value(index)?.unwrap_or_default().into())
    }

    fn convert<V: FromArg>(&self, index: usize) -> Result<V, Error> {
        let value = self.value(index)?;
        let r = match value {
            Some(v) => V::from_arg(v),
            None => V::from_none(),
        };

        r.map_err(|e| match (value, e) {
            (None, convert::Error::ValueMissing) => Error::ValueMissing(self.option.into()),
            (v, e) => Error::ValueParse {
                option: self.option.into(),
                value: v.unwrap_or_default().into(),
                target: core::any::type_name::<V>(),
                error: e,
            },
        })
    }

    fn fail(&self, e: Failure) -> Error {
        Error::Action(self.option.into(), e)
    }
}

impl<'cb> core::fmt::Debug for Entry<'cb> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        fmt.debug_struct("Entry")
            .field("prototype", &self.prototype)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<'cb> core::fmt::Debug for Parser<'cb> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        fmt.debug_struct("Parser")
            .field("entries", &self.entries)
            .field("localizer", &self.localizer.is_some())
            .finish()
    }
}

// Split a value on the first matching separator at each position. Empty
// separators never match.
fn split_separators<'a>(
    value: &'a str,
    separators: &[alloc::string::String],
) -> alloc::vec::Vec<&'a str> {
    let mut parts = alloc::vec::Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < value.len() {
        let hit = separators.iter()
            .find(|v| !v.is_empty() && value[i..].starts_with(v.as_str()));

        match hit {
            Some(v) => {
                parts.push(&value[start..i]);
                i += v.len();
                start = i;
            },
            None => {
                i += value[i..].chars().next().map_or(1, char::len_utf8);
            },
        }
    }

    parts.push(&value[start..]);
    parts
}

// Split an argument into its flag prefix, its body (everything after the
// prefix), the option name, and an inline value. Yields `None` if the
// argument does not look like an option.
fn split_option(
    argument: &str,
) -> Option<(&str, &str, &str, Option<&str>)> {
    let flag = if argument.starts_with("--") {
        "--"
    } else if argument.starts_with('-') {
        "-"
    } else if argument.starts_with('/') {
        "/"
    } else {
        return None;
    };

    let body = &argument[flag.len()..];
    let (name, value) = match body.find(|v: char| v == '=' || v == ':') {
        None => (body, None),
        Some(i) => (&body[..i], Some(&body[i + 1..])),
    };

    if name.is_empty() {
        None
    } else {
        Some((flag, body, name, value))
    }
}

fn is_eol(c: char) -> bool {
    !c.is_alphanumeric()
}

// Find the end of the next description line starting at `start`, preferring
// to break after a non-alphanumeric character.
fn line_end(
    chars: &[char],
    start: usize,
    length: usize,
) -> usize {
    let end = core::cmp::min(start + length, chars.len());
    let mut sep = None;

    for i in (start + 1)..end {
        if chars[i] == '\n' {
            return i + 1;
        }
        if is_eol(chars[i]) {
            sep = Some(i + 1);
        }
    }

    match sep {
        Some(v) if end != chars.len() => v,
        _ => end,
    }
}

// Wrap a description into lines that fit next to the prototype column.
// Words broken across lines are hyphenated.
fn description_lines(description: &str) -> alloc::vec::Vec<alloc::string::String> {
    if description.is_empty() {
        return alloc::vec![alloc::string::String::new()];
    }

    let chars: alloc::vec::Vec<char> = description.chars().collect();
    let mut lines = alloc::vec::Vec::new();
    let mut length = LINE_WIDTH - OPTION_WIDTH - 1;
    let mut start = 0;

    while start < chars.len() {
        let mut end = line_end(&chars, start, length);
        let c = chars[end - 1];
        if c.is_whitespace() {
            end -= 1;
        }

        let mut line: alloc::string::String = chars[start..end].iter().collect();
        if end != chars.len() && !is_eol(c) {
            line.push('-');
        }
        lines.push(line);

        start = if c.is_whitespace() { end + 1 } else { end };
        length = LINE_WIDTH - OPTION_WIDTH - 3;
    }

    lines
}

// Strip value-name annotations from a description. `{NAME}` and `{0:NAME}`
// are replaced by `NAME`, `{{` and `}}` are escapes for literal braces.
fn description_text(
    description: Option<&str>,
) -> Result<alloc::string::String, Error> {
    let Some(description) = description else {
        return Ok(alloc::string::String::new());
    };

    let chars: alloc::vec::Vec<char> = description.chars().collect();
    let mut text = alloc::string::String::with_capacity(description.len());
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' => {
                if start == Some(i) {
                    text.push('{');
                    start = None;
                } else if start.is_none() {
                    start = Some(i + 1);
                }
            },
            '}' => match start.take() {
                None => {
                    if chars.get(i + 1) != Some(&'}') {
                        return Err(Error::DescriptionInvalid(description.into()));
                    }
                    i += 1;
                    text.push('}');
                },
                Some(s) => text.extend(&chars[s..i]),
            },
            ':' if start.is_some() => {
                start = Some(i + 1);
            },
            c => {
                if start.is_none() {
                    text.push(c);
                }
            },
        }
        i += 1;
    }

    Ok(text)
}

// Find the placeholder name of value `index` in a description. Yields the
// default name if the description does not name the value.
fn argument_name(
    index: usize,
    count: usize,
    description: Option<&str>,
) -> alloc::string::String {
    let fallback = || if count == 1 {
        alloc::string::String::from("VALUE")
    } else {
        alloc::format!("VALUE{}", index + 1)
    };

    let Some(description) = description else {
        return fallback();
    };

    let starts = if count == 1 {
        alloc::vec![alloc::string::String::from("{0:"), alloc::string::String::from("{")]
    } else {
        alloc::vec![alloc::format!("{{{}:", index)]
    };

    for start in starts.iter() {
        let bytes = description.as_bytes();
        let found = description.match_indices(start.as_str())
            .map(|(at, _)| at)
            .find(|&at| {
                // Skip escaped braces (`{{`).
                let escaped_before = at > 0 && bytes[at - 1] == b'{';
                let escaped_after = start.as_str() == "{"
                    && bytes.get(at + 1) == Some(&b'{');
                !escaped_before && !escaped_after
            });

        if let Some(at) = found {
            let from = at + start.len();
            if let Some(len) = description[from..].find('}') {
                return description[from..from + len].into();
            }
        }
    }

    fallback()
}

impl<'cb> Parser<'cb> {
    /// Create a new command-line parser without any options. Descriptions
    /// are written as registered.
    pub fn new() -> Self {
        Self {
            entries: alloc::vec::Vec::new(),
            names: alloc::collections::BTreeMap::new(),
            localizer: None,
        }
    }

    /// Create a new command-line parser without any options, which passes
    /// all description texts through the specified localizer before
    /// writing them.
    pub fn with_localizer(
        localizer: &'cb dyn Fn(&str) -> alloc::string::String,
    ) -> Self {
        Self {
            localizer: Some(localizer),
            ..Self::new()
        }
    }

    fn localize(&self, v: &str) -> alloc::string::String {
        match self.localizer {
            Some(l) => l(v),
            None => v.into(),
        }
    }

    fn register(
        &mut self,
        prototype: &str,
        description: Option<&str>,
        count: usize,
        action: Action<'cb>,
    ) -> Result<&mut Self, Error> {
        let parsed = Prototype::parse(prototype, count)?;

        for (i, name) in parsed.names.iter().enumerate() {
            if self.names.contains_key(name) || parsed.names[..i].contains(name) {
                return Err(Error::NameDuplicate(name.clone()));
            }
        }

        let index = self.entries.len();
        for name in parsed.names.iter() {
            self.names.insert(name.clone(), index);
        }

        log::debug!(
            "registered option `{}` ({:?}, {} value(s))",
            prototype, parsed.value_type, parsed.count
        );

        self.entries.push(Entry {
            prototype: parsed,
            description: description.map(Into::into),
            action: action,
        });

        Ok(self)
    }

    /// Register an option taking a single value, which is passed as raw
    /// string to the callback. Options without value pass their name, and
    /// omitted optional values are passed as empty string.
    pub fn add<F>(
        &mut self,
        prototype: &str,
        description: Option<&str>,
        mut action: F,
    ) -> Result<&mut Self, Error>
    where
        F: FnMut(alloc::string::String) -> Result<(), Failure> + 'cb,
    {
        self.register(
            prototype,
            description,
            1,
            alloc::boxed::Box::new(move |ctx: &Context<'_>| {
                let value = ctx.raw(0)?;
                action(value).map_err(|e| ctx.fail(e))
            }),
        )
    }

    /// Register an option taking a single value, which is converted to `V`
    /// before it is passed to the callback.
    pub fn add_typed<V, F>(
        &mut self,
        prototype: &str,
        description: Option<&str>,
        mut action: F,
    ) -> Result<&mut Self, Error>
    where
        V: FromArg + 'cb,
        F: FnMut(V) -> Result<(), Failure> + 'cb,
    {
        self.register(
            prototype,
            description,
            1,
            alloc::boxed::Box::new(move |ctx: &Context<'_>| {
                let value = ctx.convert::<V>(0)?;
                action(value).map_err(|e| ctx.fail(e))
            }),
        )
    }

    /// Register a key/value option, which passes both values as raw strings
    /// to the callback.
    pub fn add_keyed<F>(
        &mut self,
        prototype: &str,
        description: Option<&str>,
        mut action: F,
    ) -> Result<&mut Self, Error>
    where
        F: FnMut(alloc::string::String, alloc::string::String) -> Result<(), Failure> + 'cb,
    {
        self.register(
            prototype,
            description,
            2,
            alloc::boxed::Box::new(move |ctx: &Context<'_>| {
                let key = ctx.raw(0)?;
                let value = ctx.raw(1)?;
                action(key, value).map_err(|e| ctx.fail(e))
            }),
        )
    }

    /// Register a key/value option, which converts the key to `K` and the
    /// value to `V` before passing them to the callback.
    pub fn add_keyed_typed<K, V, F>(
        &mut self,
        prototype: &str,
        description: Option<&str>,
        mut action: F,
    ) -> Result<&mut Self, Error>
    where
        K: FromArg + 'cb,
        V: FromArg + 'cb,
        F: FnMut(K, V) -> Result<(), Failure> + 'cb,
    {
        self.register(
            prototype,
            description,
            2,
            alloc::boxed::Box::new(move |ctx: &Context<'_>| {
                let key = ctx.convert::<K>(0)?;
                let value = ctx.convert::<V>(1)?;
                action(key, value).map_err(|e| ctx.fail(e))
            }),
        )
    }

    fn invoke(&mut self, pending: Pending) -> Result<(), Error> {
        let entry = &mut self.entries[pending.entry];
        let ctx = Context {
            option: &pending.option,
            value_type: entry.prototype.value_type,
            values: &pending.values,
        };

        log::trace!("invoking option `{}` with {} value(s)", pending.option, pending.values.len());
        (entry.action)(&ctx)
    }

    // Add a value to a pending option. Yields the option back if it still
    // waits for more values, otherwise it is invoked.
    fn parse_value(
        &mut self,
        mut pending: Pending,
        value: Option<&str>,
    ) -> Result<Option<Pending>, Error> {
        let prototype = &self.entries[pending.entry].prototype;

        if let Some(v) = value {
            match prototype.separators {
                Some(ref separators) => pending.values.extend(
                    split_separators(v, separators).into_iter().map(|v| Some(v.into())),
                ),
                None => pending.values.push(Some(v.into())),
            }
        }

        let count = prototype.count;
        let value_type = prototype.value_type;

        if pending.values.len() == count || value_type == ValueType::Optional {
            self.invoke(pending)?;
            Ok(None)
        } else if pending.values.len() > count {
            Err(Error::ValueExcess(pending.option, pending.values.len(), count))
        } else {
            Ok(Some(pending))
        }
    }

    // Handle `--name+` and `--name-` for a registered option `name`.
    fn parse_toggle(
        &mut self,
        argument: &str,
        name: &str,
    ) -> Result<bool, Error> {
        let enable = match name.chars().last() {
            Some('+') => true,
            Some('-') => false,
            _ => return Ok(false),
        };

        let entry = match self.names.get(&name[..name.len() - 1]) {
            Some(&v) => v,
            None => return Ok(false),
        };

        self.invoke(Pending {
            entry: entry,
            option: argument.into(),
            values: alloc::vec![enable.then(|| argument.into())],
        })?;
        Ok(true)
    }

    // Handle a list of bundled short options, like `-abc`. An option that
    // takes a value consumes the remainder of the bundle.
    fn parse_bundle(
        &mut self,
        flag: &str,
        body: &str,
        pending: &mut Option<Pending>,
    ) -> Result<bool, Error> {
        if flag != "-" {
            return Ok(false);
        }

        for (i, c) in body.char_indices() {
            let option = alloc::format!("-{}", c);
            let mut buf = [0u8; 4];
            let entry = match self.names.get(&*c.encode_utf8(&mut buf)) {
                Some(&v) => v,
                None if i == 0 => return Ok(false),
                None => return Err(Error::BundleUnknown(option)),
            };

            match self.entries[entry].prototype.value_type {
                ValueType::None => {
                    self.invoke(Pending {
                        entry: entry,
                        option: option,
                        values: alloc::vec![Some(body.into())],
                    })?;
                },
                ValueType::Optional | ValueType::Required => {
                    let rest = &body[i + c.len_utf8()..];
                    let p = Pending {
                        entry: entry,
                        option: option,
                        values: alloc::vec::Vec::new(),
                    };
                    *pending = self.parse_value(p, (!rest.is_empty()).then_some(rest))?;
                    return Ok(true);
                },
            }
        }

        Ok(true)
    }

    // Try handling an argument as option. Yields `false` if it matches no
    // registered option.
    fn parse_option(
        &mut self,
        argument: &str,
        pending: &mut Option<Pending>,
    ) -> Result<bool, Error> {
        let (flag, body, name, value) = match split_option(argument) {
            None => return Ok(false),
            Some(v) => v,
        };

        if let Some(&entry) = self.names.get(name) {
            let mut p = Pending {
                entry: entry,
                option: alloc::format!("{}{}", flag, name),
                values: alloc::vec::Vec::new(),
            };

            if self.entries[entry].prototype.value_type == ValueType::None {
                p.values.push(Some(name.into()));
                self.invoke(p)?;
            } else {
                *pending = self.parse_value(p, value)?;
            }

            return Ok(true);
        }

        if self.parse_toggle(argument, name)? {
            return Ok(true);
        }

        self.parse_bundle(flag, body, pending)
    }

    // Handle an argument that matched no option. It is passed to the default
    // handler, if registered, or otherwise collected.
    fn parse_unmatched(
        &mut self,
        argument: &str,
        extras: &mut alloc::vec::Vec<alloc::string::String>,
    ) -> Result<(), Error> {
        match self.names.get(DEFAULT_NAME) {
            None => {
                extras.push(argument.into());
                Ok(())
            },
            Some(&entry) => self.invoke(Pending {
                entry: entry,
                option: DEFAULT_NAME.into(),
                values: alloc::vec![Some(argument.into())],
            }),
        }
    }

    /// Parse all arguments as command-line arguments, invoking the callbacks
    /// of all options as they are found. Returns all arguments that did not
    /// match any option, in their original order.
    ///
    /// The first lone `--` ends option processing and all following
    /// arguments are treated as unmatched.
    ///
    /// ## Errors
    ///
    /// Parsing stops at the first error. Callbacks of options preceding
    /// the offending argument have been invoked already.
    pub fn parse<Source, SourceItem>(
        &mut self,
        arguments: Source,
    ) -> Result<alloc::vec::Vec<alloc::string::String>, Error>
    where
        Source: IntoIterator<Item = SourceItem>,
        SourceItem: AsRef<str>,
    {
        let mut extras = alloc::vec::Vec::new();
        let mut pending: Option<Pending> = None;
        let mut process = true;

        for argument in arguments {
            let argument = argument.as_ref();

            if process && argument == "--" {
                process = false;
                continue;
            }

            if process {
                // An option waiting for values takes this argument.
                if let Some(p) = pending.take() {
                    pending = self.parse_value(p, Some(argument))?;
                    continue;
                }
                if self.parse_option(argument, &mut pending)? {
                    continue;
                }
            }

            self.parse_unmatched(argument, &mut extras)?;
        }

        // Complete an option still waiting for values. This fails for
        // required values, but passes optional ones along as omitted.
        if let Some(p) = pending.take() {
            self.invoke(p)?;
        }

        log::debug!("parsed arguments with {} unmatched", extras.len());
        Ok(extras)
    }

    // Build the prototype column of an option, like `  -v, --verbose`.
    fn prototype_column(&self, entry: &Entry<'cb>) -> Option<alloc::string::String> {
        let prototype = &entry.prototype;
        let description = entry.description.as_deref();
        let mut names = prototype.names.iter().filter(|v| *v != DEFAULT_NAME);
        let first = names.next()?;
        let mut column = alloc::string::String::new();

        let short = |v: &str| v.chars().count() == 1;

        column.push_str(if short(first.as_str()) { "  -" } else { "      --" });
        column.push_str(first);
        for name in names {
            column.push_str(", ");
            column.push_str(if short(name.as_str()) { "-" } else { "--" });
            column.push_str(name);
        }

        if prototype.value_type != ValueType::None {
            let optional = prototype.value_type == ValueType::Optional;
            let separator = prototype.separators()
                .and_then(|v| v.first())
                .map_or(" ", |v| v.as_str());

            if optional {
                column.push_str(&self.localize("["));
            }
            column.push_str(&self.localize(&alloc::format!(
                "={}",
                argument_name(0, prototype.count, description),
            )));
            for i in 1..prototype.count {
                column.push_str(&self.localize(&alloc::format!(
                    "{}{}",
                    separator,
                    argument_name(i, prototype.count, description),
                )));
            }
            if optional {
                column.push_str(&self.localize("]"));
            }
        }

        Some(column)
    }

    /// Write descriptions of all registered options to the specified
    /// destination, in registration order. Each option gets one row with
    /// its names and value placeholders in the first column, followed by
    /// its wrapped description. Options without description get an empty
    /// description field.
    pub fn write_option_descriptions(
        &self,
        dst: &mut dyn core::fmt::Write,
    ) -> Result<(), Error> {
        for entry in self.entries.iter() {
            let Some(column) = self.prototype_column(entry) else {
                continue;
            };

            // Continue on a new line if the column overflows.
            let written = column.chars().count();
            dst.write_str(&column)?;
            if written < OPTION_WIDTH {
                dst.write_fmt(core::format_args!("{:1$}", "", OPTION_WIDTH - written))?;
            } else {
                dst.write_fmt(core::format_args!("\n{:1$}", "", OPTION_WIDTH))?;
            }

            let text = self.localize(&description_text(entry.description.as_deref())?);
            for (i, line) in description_lines(&text).iter().enumerate() {
                if i > 0 {
                    dst.write_fmt(core::format_args!("{:1$}", "", OPTION_WIDTH + 2))?;
                }
                dst.write_fmt(core::format_args!("{}\n", line))?;
            }
        }

        Ok(())
    }
}

impl<'cb> Default for Parser<'cb> {
    fn default() -> Self {
        Self::new()
    }
}

pub mod convert {
    //! # Conversion of Option Values
    //!
    //! Values of typed options are converted from their command-line
    //! representation via the `FromArg` trait. It is implemented for the
    //! common primitive types and can be implemented for any other type
    //! that should be usable as option value.

    /// Enumeration of errors that can be raised by value conversions. The
    /// enumeration is not exhaustive and uncaught errors must be handled by
    /// callers.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[non_exhaustive]
    pub enum Error {
        /// Value was not valid for this type
        ValueInvalid,
        /// Value was required but omitted
        ValueMissing,
    }

    /// Conversion of command-line values into typed values.
    pub trait FromArg: Sized {
        /// Convert a value given on the command-line.
        fn from_arg(data: &str) -> Result<Self, Error>;

        /// Produce a value for an option that was used without value. This
        /// applies to omitted optional values and disabled toggles. By
        /// default, this is an error.
        fn from_none() -> Result<Self, Error> {
            Err(Error::ValueMissing)
        }
    }

    impl core::fmt::Display for Error {
        fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
            match self {
                Self::ValueInvalid => fmt.write_str("Value is not valid"),
                Self::ValueMissing => fmt.write_str("Value is missing"),
            }
        }
    }

    impl core::error::Error for Error {
    }

    impl FromArg for alloc::string::String {
        fn from_arg(data: &str) -> Result<Self, Error> {
            Ok(data.into())
        }

        fn from_none() -> Result<Self, Error> {
            Ok(Self::new())
        }
    }

    impl FromArg for bool {
        fn from_arg(data: &str) -> Result<Self, Error> {
            match data {
                "TRUE" | "True" | "true"
                    | "YES" | "Yes" | "yes"
                    | "ON" | "On" | "on" => Ok(true),
                "FALSE" | "False" | "false"
                    | "NO" | "No" | "no"
                    | "OFF" | "Off" | "off" => Ok(false),
                _ => Err(Error::ValueInvalid),
            }
        }

        fn from_none() -> Result<Self, Error> {
            Ok(false)
        }
    }

    impl FromArg for char {
        fn from_arg(data: &str) -> Result<Self, Error> {
            let mut chars = data.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(Error::ValueInvalid),
            }
        }
    }

    impl<T> FromArg for Option<T>
    where
        T: FromArg,
    {
        fn from_arg(data: &str) -> Result<Self, Error> {
            T::from_arg(data).map(Some)
        }

        fn from_none() -> Result<Self, Error> {
            Ok(None)
        }
    }

    macro_rules! from_arg_via_str {
        ($($ty:ty),* $(,)?) => {
            $(
                impl FromArg for $ty {
                    fn from_arg(data: &str) -> Result<Self, Error> {
                        data.parse::<$ty>().map_err(|_| Error::ValueInvalid)
                    }
                }
            )*
        };
    }

    from_arg_via_str!(
        i8, i16, i32, i64, i128, isize,
        u8, u16, u32, u64, u128, usize,
        f32, f64,
    );

    #[cfg(feature = "std")]
    impl FromArg for std::path::PathBuf {
        fn from_arg(data: &str) -> Result<Self, Error> {
            Ok(data.into())
        }
    }

    #[cfg(feature = "std")]
    impl FromArg for std::ffi::OsString {
        fn from_arg(data: &str) -> Result<Self, Error> {
            Ok(data.into())
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::prelude::rust_2021::*;

    // Collect all invocations of a parser run as `(tag, value)` pairs.
    type Log = core::cell::RefCell<Vec<(&'static str, String)>>;

    fn record<'a>(
        log: &'a Log,
        tag: &'static str,
    ) -> impl FnMut(String) -> Result<(), Failure> + 'a {
        move |v| {
            log.borrow_mut().push((tag, v));
            Ok(())
        }
    }

    fn describe(parser: &Parser<'_>) -> String {
        let mut v = String::new();
        parser.write_option_descriptions(&mut v).unwrap();
        v
    }

    // Verify that prototypes are split into names, value types, and
    // separators, and that malformed prototypes are rejected.
    #[test]
    fn prototype_basic() {
        let p = Prototype::parse("v|verbose", 1).unwrap();
        assert_eq!(p.names(), ["v", "verbose"]);
        assert_eq!(p.value_type(), ValueType::None);
        assert_eq!(p.separators(), None);

        let p = Prototype::parse("o|output=", 1).unwrap();
        assert_eq!(p.names(), ["o", "output"]);
        assert_eq!(p.value_type(), ValueType::Required);

        let p = Prototype::parse("D:", 2).unwrap();
        assert_eq!(p.value_type(), ValueType::Optional);
        assert_eq!(p.separators(), Some(&[":".to_string(), "=".to_string()][..]));

        let p = Prototype::parse("D={=>}!", 2).unwrap();
        assert_eq!(p.separators(), Some(&["=>".to_string(), "!".to_string()][..]));

        let p = Prototype::parse("D={}", 2).unwrap();
        assert_eq!(p.separators(), None);

        assert!(core::matches!(Prototype::parse("", 1), Err(Error::PrototypeEmpty)));
        assert!(core::matches!(Prototype::parse("a||b", 1), Err(Error::NameEmpty(_))));
        assert!(core::matches!(Prototype::parse("a=|b:", 1), Err(Error::TypeConflict(_, '=', ':'))));
        assert!(core::matches!(Prototype::parse("D={=", 2), Err(Error::SeparatorIllFormed(_))));
        assert!(core::matches!(Prototype::parse("D=}", 2), Err(Error::SeparatorIllFormed(_))));
        assert!(core::matches!(Prototype::parse("D=:", 1), Err(Error::SeparatorUnexpected(_, 1))));
        assert!(core::matches!(Prototype::parse("person", 2), Err(Error::ValueCount(_, 2))));
        assert!(core::matches!(Prototype::parse("name=", 0), Err(Error::ValueCount(_, 0))));
        assert!(core::matches!(Prototype::parse("<>=", 1), Err(Error::DefaultTakesValues(_))));
    }

    // Verify long, short, and slash options with inline and separate values,
    // as well as collection of unmatched arguments.
    #[test]
    fn parse_basic() {
        let log = Log::default();
        let mut parser = Parser::new();
        parser
            .add("v|verbose", None, record(&log, "verbose")).unwrap()
            .add("n|name=", None, record(&log, "name")).unwrap()
            .add("color:", None, record(&log, "color")).unwrap();

        let extras = parser.parse([
            "first", "--verbose", "-n", "Jim", "/name:Bob", "second",
            "--color", "third", "--color=red", "-", "--unknown",
        ]).unwrap();

        assert_eq!(extras, ["first", "second", "third", "-", "--unknown"]);
        assert_eq!(
            *log.borrow(),
            [
                ("verbose", "verbose".to_string()),
                ("name", "Jim".to_string()),
                ("name", "Bob".to_string()),
                ("color", String::new()),
                ("color", "red".to_string()),
            ],
        );
    }

    // Verify that `--` stops option processing and that a pending optional
    // value is completed at the end of the arguments.
    #[test]
    fn parse_terminator() {
        let log = Log::default();
        let mut parser = Parser::new();
        parser
            .add("a", None, record(&log, "a")).unwrap()
            .add("color:", None, record(&log, "color")).unwrap();

        let extras = parser.parse(["-a", "--", "-a", "--", "x"]).unwrap();
        assert_eq!(extras, ["-a", "--", "x"]);

        let extras = parser.parse(["--color"]).unwrap();
        assert!(extras.is_empty());
        assert_eq!(
            *log.borrow(),
            [("a", "a".to_string()), ("color", String::new())],
        );
    }

    // Verify bundled short options, including a value-taking member that
    // consumes the remainder of the bundle.
    #[test]
    fn parse_bundle() {
        let log = Log::default();
        let mut parser = Parser::new();
        parser
            .add("a", None, record(&log, "a")).unwrap()
            .add("b", None, record(&log, "b")).unwrap()
            .add("o=", None, record(&log, "o")).unwrap();

        let extras = parser.parse(["-ab", "-aofile", "-bo", "out", "-xa"]).unwrap();
        assert_eq!(extras, ["-xa"]);
        assert_eq!(
            *log.borrow(),
            [
                ("a", "ab".to_string()),
                ("b", "ab".to_string()),
                ("a", "aofile".to_string()),
                ("o", "file".to_string()),
                ("b", "bo".to_string()),
                ("o", "out".to_string()),
            ],
        );

        let r = parser.parse(["-ax"]).unwrap_err();
        assert!(core::matches!(r, Error::BundleUnknown(ref v) if v == "-x"));
    }

    // Verify `name+` and `name-` toggles of registered options.
    #[test]
    fn parse_toggle() {
        let state = core::cell::Cell::new(None);
        let mut parser = Parser::new();
        parser.add_typed("debug", None, |v: Option<String>| {
            state.set(Some(v.is_some()));
            Ok(())
        }).unwrap();

        parser.parse(["--debug+"]).unwrap();
        assert_eq!(state.get(), Some(true));
        parser.parse(["--debug-"]).unwrap();
        assert_eq!(state.get(), Some(false));

        let extras = parser.parse(["--other+"]).unwrap();
        assert_eq!(extras, ["--other+"]);
    }

    // Verify key/value options with default and custom separators, values
    // spread across arguments, and typed conversion of both parts.
    #[test]
    fn parse_keyed() {
        let pairs = core::cell::RefCell::new(Vec::new());
        let typed = core::cell::RefCell::new(Vec::new());
        let mut parser = Parser::new();
        parser
            .add_keyed("D=", None, |k, v| {
                pairs.borrow_mut().push((k, v));
                Ok(())
            }).unwrap()
            .add_keyed_typed("limit={=>}", None, |k: char, v: u32| {
                typed.borrow_mut().push((k, v));
                Ok(())
            }).unwrap();

        let extras = parser.parse([
            "-Dfoo=bar", "-D", "a:b", "-D", "key", "value", "--limit", "x=>7",
        ]).unwrap();
        assert!(extras.is_empty());
        assert_eq!(
            *pairs.borrow(),
            [
                ("foo".to_string(), "bar".to_string()),
                ("a".to_string(), "b".to_string()),
                ("key".to_string(), "value".to_string()),
            ],
        );
        assert_eq!(*typed.borrow(), [('x', 7)]);

        let r = parser.parse(["-D", "a=b=c"]).unwrap_err();
        assert!(core::matches!(r, Error::ValueExcess(ref o, 3, 2) if o == "-D"));
    }

    // Verify that unmatched arguments go to the `<>` handler if registered.
    #[test]
    fn parse_default_handler() {
        let log = Log::default();
        let mut parser = Parser::new();
        parser
            .add("<>", None, record(&log, "default")).unwrap()
            .add("q", None, record(&log, "q")).unwrap();

        let extras = parser.parse(["one", "-q", "--", "-q"]).unwrap();
        assert!(extras.is_empty());
        assert_eq!(
            *log.borrow(),
            [
                ("default", "one".to_string()),
                ("q", "q".to_string()),
                ("default", "-q".to_string()),
            ],
        );
    }

    // Verify that conversion, missing values, callbacks, and duplicate
    // names all yield their respective errors.
    #[test]
    fn parse_errors() {
        let mut parser = Parser::new();
        parser
            .add_typed("age=", None, |_: i32| Ok(())).unwrap()
            .add("fail", None, |_| Err("refused".into())).unwrap();

        let r = parser.parse(["--age=notanumber"]).unwrap_err();
        assert!(core::matches!(
            r,
            Error::ValueParse { ref option, ref value, target: "i32", error: convert::Error::ValueInvalid }
                if option == "--age" && value == "notanumber",
        ));

        let r = parser.parse(["--age"]).unwrap_err();
        assert!(core::matches!(r, Error::ValueMissing(ref v) if v == "--age"));

        let r = parser.parse(["--fail"]).unwrap_err();
        assert!(core::matches!(r, Error::Action(ref v, _) if v == "--fail"));
        assert_eq!(
            core::error::Error::source(&r).map(|v| v.to_string()),
            Some("refused".to_string()),
        );

        let r = parser.add("a|age", None, |_| Ok(())).unwrap_err();
        assert!(core::matches!(r, Error::NameDuplicate(ref v) if v == "age"));
        let r = parser.add("x|x", None, |_| Ok(())).unwrap_err();
        assert!(core::matches!(r, Error::NameDuplicate(ref v) if v == "x"));
    }

    // Verify the layout of option descriptions, including aliases, value
    // placeholders, overflowing prototypes, and hidden default handlers.
    #[test]
    fn describe_basic() {
        let mut parser = Parser::new();
        parser
            .add("v|verbose", Some("Be verbose"), |_| Ok(())).unwrap()
            .add("o|output:", Some("Write to {FILE}"), |_| Ok(())).unwrap()
            .add_keyed("D={=}", Some("Define {0:NAME} as {1:VALUE}"), |_, _| Ok(())).unwrap()
            .add("person=", None, |_| Ok(())).unwrap()
            .add_keyed("pair=", Some("Use {{braces}}"), |_, _| Ok(())).unwrap()
            .add("a-very-long-option-name=", Some("Short"), |_| Ok(())).unwrap()
            .add("<>", None, |_| Ok(())).unwrap();

        assert_eq!(
            describe(&parser),
            concat!(
                "  -v, --verbose              Be verbose\n",
                "  -o, --output[=FILE]        Write to FILE\n",
                "  -D=NAME=VALUE              Define NAME as VALUE\n",
                "      --person=VALUE         \n",
                "      --pair=VALUE1:VALUE2   Use {braces}\n",
                "      --a-very-long-option-name=VALUE\n",
                "                             Short\n",
            ),
        );
    }

    // Verify wrapping of long descriptions, both at word boundaries and
    // with hyphenation of words that do not fit a line.
    #[test]
    fn describe_wrap() {
        let mut parser = Parser::new();
        parser
            .add(
                "threads=",
                Some("Set the number of worker threads used while processing large inputs from disk"),
                |_| Ok(()),
            ).unwrap()
            .add(
                "x",
                Some("abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwxyzabcdefghij"),
                |_| Ok(()),
            ).unwrap();

        assert_eq!(
            describe(&parser),
            concat!(
                "      --threads=VALUE        Set the number of worker threads used while\n",
                "                               processing large inputs from disk\n",
                "  -x                         abcdefghijklmnopqrstuvwxyzabcdefghijklmnopqrstuvwx-\n",
                "                               yzabcdefghij\n",
            ),
        );
    }

    // Verify that descriptions and placeholders pass through the localizer,
    // and that unbalanced braces are reported.
    #[test]
    fn describe_localized() {
        let localizer = |v: &str| v.to_uppercase();
        let mut parser = Parser::with_localizer(&localizer);
        parser.add("q|quiet", Some("be quiet"), |_| Ok(())).unwrap();
        assert_eq!(
            describe(&parser),
            "  -q, --quiet                BE QUIET\n",
        );

        let mut parser = Parser::new();
        parser.add("q", Some("broken } brace"), |_| Ok(())).unwrap();
        let mut v = String::new();
        let r = parser.write_option_descriptions(&mut v).unwrap_err();
        assert!(core::matches!(r, Error::DescriptionInvalid(_)));
    }
}
