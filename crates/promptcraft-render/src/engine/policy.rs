//! Security tiers for the Jinja renderer.
//!
//! Each [`SecurityLevel`] maps to a fixed [`TierPolicy`]: the filters, tests
//! and globals an expression may use, whether output is HTML-escaped, and how
//! many parsed sources are cached. The MiniJinja environment for a tier is
//! built from an empty environment by registering only the allowed
//! capabilities, so nothing outside the allow-list exists to be called.
//!
//! | Level | Filters | Tests | Globals | Autoescape | Parse cache |
//! |-------|---------|-------|---------|------------|-------------|
//! | `strict` | `lower`, `upper`, `title` | `defined`, `undefined`, `none` | none | on | off |
//! | `standard` | strict + `capitalize`, `trim`, `strip`, `replace`, `int`, `float`, `join`, `split`, `length`, `safe` | strict + `number`, `string`, `sequence` | `range`, `dict`, `len` | on | 100 |
//! | `relaxed` | all builtins | all builtins | all builtins | off | 400 |

use std::fmt;
use std::str::FromStr;

use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior};

use crate::error::RenderError;

/// How much of the expression language a template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// Case transforms and definedness tests only.
    Strict,
    /// A balanced set of string, cast and collection helpers.
    #[default]
    Standard,
    /// The full builtin language, for trusted templates only.
    Relaxed,
}

impl SecurityLevel {
    /// Every level, from most to least restrictive.
    pub const ALL: [SecurityLevel; 3] = [
        SecurityLevel::Strict,
        SecurityLevel::Standard,
        SecurityLevel::Relaxed,
    ];

    /// The canonical literal for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Strict => "strict",
            SecurityLevel::Standard => "standard",
            SecurityLevel::Relaxed => "relaxed",
        }
    }

    /// The capability table for this level.
    pub fn policy(&self) -> &'static TierPolicy {
        match self {
            SecurityLevel::Strict => &STRICT,
            SecurityLevel::Standard => &STANDARD,
            SecurityLevel::Relaxed => &RELAXED,
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(SecurityLevel::Strict),
            "standard" => Ok(SecurityLevel::Standard),
            "relaxed" => Ok(SecurityLevel::Relaxed),
            other => Err(RenderError::InvalidOption(format!(
                "invalid security level: {}. Valid options are: strict, standard, relaxed",
                other
            ))),
        }
    }
}

/// The fixed capability bundle of one security level.
///
/// `None` for an allow-list means the tier is unrestricted.
#[derive(Debug)]
pub struct TierPolicy {
    pub filters: Option<&'static [&'static str]>,
    pub tests: Option<&'static [&'static str]>,
    pub globals: Option<&'static [&'static str]>,
    pub autoescape: bool,
    /// Maximum number of parsed sources kept; `0` disables the cache.
    pub cache_capacity: usize,
}

impl TierPolicy {
    pub fn allows_filter(&self, name: &str) -> bool {
        allows(self.filters, name)
    }

    pub fn allows_test(&self, name: &str) -> bool {
        allows(self.tests, name)
    }

    pub fn allows_global(&self, name: &str) -> bool {
        allows(self.globals, name)
    }

    /// Names that resolve to globals rather than template variables.
    pub fn global_names(&self) -> &'static [&'static str] {
        self.globals.unwrap_or(RELAXED_GLOBALS)
    }

    pub fn is_restricted(&self) -> bool {
        self.filters.is_some() || self.tests.is_some() || self.globals.is_some()
    }
}

fn allows(list: Option<&'static [&'static str]>, name: &str) -> bool {
    list.map_or(true, |names| names.contains(&name))
}

const STRICT_FILTERS: &[&str] = &["lower", "upper", "title"];
const STRICT_TESTS: &[&str] = &["defined", "undefined", "none"];

const STANDARD_FILTERS: &[&str] = &[
    "lower",
    "upper",
    "title",
    "capitalize",
    "trim",
    "strip",
    "replace",
    "int",
    "float",
    "join",
    "split",
    "length",
    "safe",
];
const STANDARD_TESTS: &[&str] = &[
    "defined", "undefined", "none", "number", "string", "sequence",
];
const STANDARD_GLOBALS: &[&str] = &["range", "dict", "len"];

// Globals present in a builtin MiniJinja environment plus our additions.
const RELAXED_GLOBALS: &[&str] = &["range", "dict", "debug", "namespace", "len"];

static STRICT: TierPolicy = TierPolicy {
    filters: Some(STRICT_FILTERS),
    tests: Some(STRICT_TESTS),
    globals: Some(&[]),
    autoescape: true,
    cache_capacity: 0,
};

static STANDARD: TierPolicy = TierPolicy {
    filters: Some(STANDARD_FILTERS),
    tests: Some(STANDARD_TESTS),
    globals: Some(STANDARD_GLOBALS),
    autoescape: true,
    cache_capacity: 100,
};

static RELAXED: TierPolicy = TierPolicy {
    filters: None,
    tests: None,
    globals: None,
    autoescape: false,
    cache_capacity: 400,
};

/// Builds the evaluation environment for `level`.
///
/// Called once per renderer; the environment is never mutated afterwards.
pub(crate) fn build_environment(level: SecurityLevel) -> Environment<'static> {
    let policy = level.policy();
    let mut env = match level {
        SecurityLevel::Relaxed => Environment::new(),
        SecurityLevel::Strict | SecurityLevel::Standard => Environment::empty(),
    };

    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    if policy.autoescape {
        env.set_auto_escape_callback(|_| AutoEscape::Html);
    } else {
        env.set_auto_escape_callback(|_| AutoEscape::None);
    }

    match level {
        SecurityLevel::Strict => register_strict(&mut env),
        SecurityLevel::Standard => {
            register_strict(&mut env);
            register_standard(&mut env);
        }
        SecurityLevel::Relaxed => register_extras(&mut env),
    }

    env
}

fn register_strict(env: &mut Environment<'static>) {
    use minijinja::{filters, tests};

    env.add_filter("lower", filters::lower);
    env.add_filter("upper", filters::upper);
    env.add_filter("title", filters::title);

    env.add_test("defined", tests::is_defined);
    env.add_test("undefined", tests::is_undefined);
    env.add_test("none", tests::is_none);
}

fn register_standard(env: &mut Environment<'static>) {
    use minijinja::{filters, functions, tests};

    env.add_filter("capitalize", filters::capitalize);
    env.add_filter("trim", filters::trim);
    env.add_filter("replace", filters::replace);
    env.add_filter("int", filters::int);
    env.add_filter("float", filters::float);
    env.add_filter("join", filters::join);
    env.add_filter("length", filters::length);
    env.add_filter("safe", filters::safe);

    env.add_test("number", tests::is_number);
    env.add_test("string", tests::is_string);
    env.add_test("sequence", tests::is_sequence);

    env.add_function("range", functions::range);
    env.add_function("dict", functions::dict);

    register_extras(env);
}

// Helpers that MiniJinja does not ship under these names. Registered on the
// relaxed environment too so every standard capability exists there.
fn register_extras(env: &mut Environment<'static>) {
    env.add_filter("strip", strip);
    env.add_filter("split", split);
    env.add_function("len", len);
}

fn strip(value: String) -> String {
    value.trim().to_string()
}

fn split(value: String, separator: Option<String>) -> Vec<String> {
    match separator {
        Some(sep) if !sep.is_empty() => value.split(sep.as_str()).map(String::from).collect(),
        _ => value.split_whitespace().map(String::from).collect(),
    }
}

fn len(value: Value) -> Result<usize, Error> {
    value.len().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("len() is not supported for values of type {}", value.kind()),
        )
    })
}
