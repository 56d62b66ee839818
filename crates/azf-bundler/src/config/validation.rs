//! Structural validation of raw configuration values.
//!
//! Validation walks the raw JSON and collects every violation instead of
//! stopping at the first one. Only when the value is clean is it handed to
//! serde for the typed conversion.

use std::fmt;

use serde_json::{Map, Value};

use super::{BuildConfig, LogLevel};

/// JSON kind of a value, as named in violation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    /// The key was absent.
    Undefined,
}

impl ValueKind {
    /// Kind of an optional value (`None` means the key is missing).
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => ValueKind::Undefined,
            Some(Value::Null) => ValueKind::Null,
            Some(Value::Bool(_)) => ValueKind::Boolean,
            Some(Value::Number(_)) => ValueKind::Number,
            Some(Value::String(_)) => ValueKind::String,
            Some(Value::Array(_)) => ValueKind::Array,
            Some(Value::Object(_)) => ValueKind::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Null => "null",
            ValueKind::Undefined => "undefined",
        })
    }
}

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The value has the wrong JSON type (or is missing).
    InvalidType {
        expected: ValueKind,
        received: ValueKind,
    },
    /// The value has the right type but is not one of the accepted values.
    InvalidValue,
    /// A required string is empty.
    Empty,
    /// The key clashes with another key carrying the same meaning.
    Conflict,
}

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path segments from the root, e.g. `["advancedOptions", "enableDirnameShim"]`.
    pub path: Vec<String>,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new<I, S>(path: I, kind: ViolationKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            kind,
        }
    }

    /// Dotted path, e.g. `entryPoints.0`.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::InvalidType { expected, received } => write!(
                f,
                "{}: Expected {expected} but received {received}",
                self.dotted_path()
            ),
            _ => f.write_str(&self.dotted_path()),
        }
    }
}

/// Accepted spellings of the pass-through options key.
const BUNDLER_OPTIONS_KEYS: [&str; 2] = ["bundlerOptions", "esbuildOptions"];

/// Validate a raw configuration value and convert it into a [`BuildConfig`].
///
/// # Errors
///
/// Returns every violation found. The list is never empty on `Err`.
pub fn validate(raw: &Value) -> Result<BuildConfig, Vec<Violation>> {
    let Some(root) = raw.as_object() else {
        return Err(vec![Violation::new(
            Vec::<String>::new(),
            ViolationKind::InvalidType {
                expected: ValueKind::Object,
                received: ValueKind::of(Some(raw)),
            },
        )]);
    };

    let mut checker = Checker::default();

    checker.required_string(root, "project");
    checker.optional_string_array(root, "entryPoints");
    checker.optional_string_array(root, "exclude");
    checker.bundler_options(root);
    checker.optional_bool(root, &[], "clean");
    checker.log_level(root);
    checker.advanced_options(root);

    if !checker.violations.is_empty() {
        return Err(checker.violations);
    }

    serde_json::from_value(raw.clone()).map_err(|err| {
        tracing::debug!("typed config conversion failed after validation: {err}");
        vec![Violation::new(
            Vec::<String>::new(),
            ViolationKind::InvalidValue,
        )]
    })
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, path: Vec<String>, kind: ViolationKind) {
        self.violations.push(Violation { path, kind });
    }

    fn type_mismatch(&mut self, path: Vec<String>, expected: ValueKind, value: Option<&Value>) {
        self.push(
            path,
            ViolationKind::InvalidType {
                expected,
                received: ValueKind::of(value),
            },
        );
    }

    fn required_string(&mut self, obj: &Map<String, Value>, key: &str) {
        match obj.get(key) {
            Some(Value::String(s)) if s.is_empty() => {
                self.push(vec![key.to_string()], ViolationKind::Empty)
            }
            Some(Value::String(_)) => {}
            other => self.type_mismatch(vec![key.to_string()], ValueKind::String, other),
        }
    }

    fn optional_string_array(&mut self, obj: &Map<String, Value>, key: &str) {
        match obj.get(key) {
            None => {}
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.type_mismatch(
                            vec![key.to_string(), index.to_string()],
                            ValueKind::String,
                            Some(item),
                        );
                    }
                }
            }
            other => self.type_mismatch(vec![key.to_string()], ValueKind::Array, other),
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, parent: &[&str], key: &str) {
        match obj.get(key) {
            None | Some(Value::Bool(_)) => {}
            other => {
                let path = parent
                    .iter()
                    .chain(std::iter::once(&key))
                    .map(|s| s.to_string())
                    .collect();
                self.type_mismatch(path, ValueKind::Boolean, other)
            }
        }
    }

    fn bundler_options(&mut self, obj: &Map<String, Value>) {
        let present: Vec<&str> = BUNDLER_OPTIONS_KEYS
            .into_iter()
            .filter(|k| obj.contains_key(*k))
            .collect();

        if present.len() > 1 {
            self.push(vec!["esbuildOptions".to_string()], ViolationKind::Conflict);
            return;
        }

        for key in present {
            match obj.get(key) {
                Some(Value::Object(_)) => {}
                other => self.type_mismatch(vec![key.to_string()], ValueKind::Object, other),
            }
        }
    }

    fn log_level(&mut self, obj: &Map<String, Value>) {
        match obj.get("logLevel") {
            None => {}
            Some(Value::String(s)) => {
                if s.parse::<LogLevel>().is_err() {
                    self.push(vec!["logLevel".to_string()], ViolationKind::InvalidValue);
                }
            }
            other => self.type_mismatch(vec!["logLevel".to_string()], ValueKind::String, other),
        }
    }

    fn advanced_options(&mut self, obj: &Map<String, Value>) {
        match obj.get("advancedOptions") {
            None => {}
            Some(Value::Object(advanced)) => {
                self.optional_bool(advanced, &["advancedOptions"], "enableDirnameShim");
                self.optional_bool(advanced, &["advancedOptions"], "enableRequireShim");
            }
            other => self.type_mismatch(
                vec!["advancedOptions".to_string()],
                ValueKind::Object,
                other,
            ),
        }
    }
}
