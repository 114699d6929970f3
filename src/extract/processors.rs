//! Value processors
//!
//! A processor transforms one located value. Processors are referenced from
//! configuration by name, optionally with an argument after the first `:`
//! (`strip-prefix:Reference: `). A processor that fails drops the entry it
//! was applied to; it never aborts the record.

use super::value::FieldValue;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Errors raised while processing a single value
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessorError {
    #[error("processor '{processor}' expects text input")]
    NotText { processor: String },

    #[error("no integer found in '{0}'")]
    NoInteger(String),

    #[error("no number found in '{0}'")]
    NoNumber(String),

    #[error("value is empty")]
    Empty,

    #[error("{0}")]
    Custom(String),
}

/// The function a processor runs
pub type ProcessorFn = Arc<dyn Fn(FieldValue) -> Result<FieldValue, ProcessorError> + Send + Sync>;

/// Builds a processor from its optional argument
pub type ProcessorFactory =
    Arc<dyn Fn(Option<&str>) -> Result<ProcessorFn, String> + Send + Sync>;

/// A resolved, ready-to-run processor
#[derive(Clone)]
pub struct Processor {
    spec: String,
    func: ProcessorFn,
}

impl Processor {
    /// The configuration string this processor was resolved from
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn apply(&self, value: FieldValue) -> Result<FieldValue, ProcessorError> {
        (self.func)(value)
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor").field("spec", &self.spec).finish()
    }
}

/// Runs a chain of processors over one value
pub fn apply_chain(
    processors: &[Processor],
    value: FieldValue,
) -> Result<FieldValue, ProcessorError> {
    processors.iter().try_fold(value, |v, p| p.apply(v))
}

/// Name-to-factory table used when compiling extractors
#[derive(Clone)]
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ProcessorRegistry")
            .field("processors", &names)
            .finish()
    }
}

impl ProcessorRegistry {
    /// A registry with no processors at all
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding every built-in processor
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_simple("trim", text_op("trim", |s| s.trim().to_string()));
        registry.register_simple("clean-text", text_op("clean-text", clean_text));
        registry.register_simple(
            "collapse-whitespace",
            text_op("collapse-whitespace", |s| {
                s.split_whitespace().collect::<Vec<_>>().join(" ")
            }),
        );
        registry.register_simple("lowercase", text_op("lowercase", |s| s.to_lowercase()));
        registry.register_simple("uppercase", text_op("uppercase", |s| s.to_uppercase()));
        registry.register_simple("parse-int", Arc::new(parse_int));
        registry.register_simple("parse-float", Arc::new(parse_float));
        registry.register_simple("non-empty", Arc::new(non_empty));

        registry.register("strip-prefix", |arg| {
            let prefix = required(arg)?.to_string();
            Ok(text_op("strip-prefix", move |s| {
                s.strip_prefix(prefix.as_str()).unwrap_or(s).to_string()
            }))
        });
        registry.register("strip-suffix", |arg| {
            let suffix = required(arg)?.to_string();
            Ok(text_op("strip-suffix", move |s| {
                s.strip_suffix(suffix.as_str()).unwrap_or(s).to_string()
            }))
        });
        registry.register("remove", |arg| {
            let needle = required(arg)?.to_string();
            Ok(text_op("remove", move |s| s.replace(needle.as_str(), "")))
        });
        registry.register("replace", |arg| {
            let arg = required(arg)?;
            let (from, to) = arg
                .split_once('=')
                .ok_or_else(|| "expected '<from>=<to>'".to_string())?;
            if from.is_empty() {
                return Err("nothing to replace".to_string());
            }
            let (from, to) = (from.to_string(), to.to_string());
            Ok(text_op("replace", move |s| s.replace(from.as_str(), &to)))
        });

        registry
    }

    /// Registers a processor factory under `name`
    ///
    /// The factory receives the text after the first `:` of the
    /// configuration string, if any. Registering an existing name replaces it.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(Option<&str>) -> Result<ProcessorFn, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Registers a processor that takes no argument
    pub fn register_simple(&mut self, name: &str, func: ProcessorFn) {
        let owned = name.to_string();
        self.register(name, move |arg| match arg {
            None => Ok(func.clone()),
            Some(_) => Err(format!("'{}' takes no argument", owned)),
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolves a configuration string such as `strip-prefix:Reference: `
    pub fn resolve(&self, spec: &str) -> Result<Processor, ConfigError> {
        let (name, arg) = match spec.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (spec.trim(), None),
        };

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProcessor(name.to_string()))?;
        let func = factory(arg).map_err(|message| ConfigError::InvalidProcessorArgument {
            name: name.to_string(),
            message,
        })?;

        Ok(Processor {
            spec: spec.to_string(),
            func,
        })
    }
}

fn required(arg: Option<&str>) -> Result<&str, String> {
    match arg {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err("an argument is required".to_string()),
    }
}

/// Lifts a string transform into a processor that rejects non-text values
fn text_op<F>(name: &'static str, f: F) -> ProcessorFn
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Arc::new(move |value| match value {
        FieldValue::Text(s) => Ok(FieldValue::Text(f(&s))),
        _ => Err(ProcessorError::NotText {
            processor: name.to_string(),
        }),
    })
}

/// Removes line breaks and tabs, then trims
fn clean_text(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn int_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?)(\d+(?:,\d{3})*)").expect("valid integer pattern"))
}

fn float_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(-?)(\d+(?:,\d{3})*(?:\.\d+)?)").expect("valid number pattern")
    })
}

/// First number matched by `re`, without thousands separators
///
/// A `-` is a sign only at the start of the text or after a character that
/// is not alphanumeric; `JOB-4821` reads as 4821.
fn first_number(re: &Regex, s: &str) -> Option<String> {
    let caps = re.captures(s)?;
    let digits = caps.get(2)?.as_str().replace(',', "");
    let signed = caps.get(1).is_some_and(|m| {
        !m.as_str().is_empty()
            && !s[..m.start()]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric)
    });
    Some(if signed { format!("-{}", digits) } else { digits })
}

/// Reads the first integer in the text; thousands separators are allowed
fn parse_int(value: FieldValue) -> Result<FieldValue, ProcessorError> {
    match value {
        FieldValue::Integer(n) => Ok(FieldValue::Integer(n)),
        FieldValue::Text(s) => {
            first_number(int_pattern(), &s)
                .ok_or_else(|| ProcessorError::NoInteger(s.clone()))?
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| ProcessorError::NoInteger(s.clone()))
        }
        _ => Err(ProcessorError::NotText {
            processor: "parse-int".to_string(),
        }),
    }
}

/// Reads the first decimal number in the text (`£51.77` gives 51.77)
fn parse_float(value: FieldValue) -> Result<FieldValue, ProcessorError> {
    match value {
        FieldValue::Float(x) => Ok(FieldValue::Float(x)),
        FieldValue::Integer(n) => Ok(FieldValue::Float(n as f64)),
        FieldValue::Text(s) => {
            first_number(float_pattern(), &s)
                .ok_or_else(|| ProcessorError::NoNumber(s.clone()))?
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| ProcessorError::NoNumber(s.clone()))
        }
        _ => Err(ProcessorError::NotText {
            processor: "parse-float".to_string(),
        }),
    }
}

/// Drops blank text entries; other values pass through
fn non_empty(value: FieldValue) -> Result<FieldValue, ProcessorError> {
    match &value {
        FieldValue::Text(s) if s.trim().is_empty() => Err(ProcessorError::Empty),
        _ => Ok(value),
    }
}
