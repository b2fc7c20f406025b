//! Session configuration.  Bounds are fixed for the lifetime of a
//! search session; the flags select how candidates are encoded and
//! parsed.
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Settings {
    pub max_rules: usize,
    pub max_vars: usize,
    pub max_body: usize,
    pub max_literals: usize,
    /// Candidates may contain rules that call their own head.
    pub recursion_enabled: bool,
    /// Candidates may define invented predicates; models carry heads,
    /// directions and rule orderings.
    pub pi_enabled: bool,
    /// Solve once with search-order heuristics instead of walking
    /// size windows.
    pub single_solve: bool,
    /// Also window on variable and rule counts, and skip bad-handle
    /// pruning.
    pub no_bias: bool,
    /// Constraints may be qualified by `program_size_at_least/1`.
    pub noisy: bool,
    /// Append the caller's background constraints to the base program.
    pub bkcons: bool,
    /// In single-solve mode, walk (size, variables, rules)
    /// configurations in a fixed order instead of preferring small
    /// sizes.
    pub order_space: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_rules: 2,
            max_vars: 6,
            max_body: 6,
            max_literals: 40,
            recursion_enabled: false,
            pi_enabled: false,
            single_solve: false,
            no_bias: false,
            noisy: false,
            bkcons: false,
            order_space: false,
        }
    }
}

impl Settings {
    /// The largest program the bounds admit, in literals.
    #[must_use]
    pub fn max_size(&self) -> usize {
        (1 + self.max_body) * self.max_rules
    }

    /// The effective literal bound: `max_literals`, capped by
    /// `max_size()`.
    #[must_use]
    pub fn literal_bound(&self) -> usize {
        self.max_literals.min(self.max_size())
    }

    /// Parses settings from JSON; missing fields take their default.
    ///
    /// # Errors
    ///
    /// Returns `Err` on malformed JSON or mistyped fields.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the file can't be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[test]
fn test_defaults() {
    let settings = Settings::from_json(r#"{"max_rules": 3, "recursion_enabled": true}"#)
        .expect("ok");

    assert_eq!(settings.max_rules, 3);
    assert!(settings.recursion_enabled);
    assert_eq!(settings.max_vars, Settings::default().max_vars);
    assert_eq!(settings.max_size(), 21);
    assert_eq!(settings.literal_bound(), 21);
}

#[test]
fn test_bad_settings() {
    let err = Settings::from_json(r#"{"max_rules": "many"}"#).expect_err("mistyped");
    assert!(matches!(err, crate::Error::Settings(_)));

    let err = Settings::from_path("/nonexistent/settings.json").expect_err("missing");
    assert!(matches!(err, crate::Error::Io(_)));
}

#[test]
fn test_round_trip() {
    let settings = Settings {
        max_literals: 5,
        single_solve: true,
        bkcons: true,
        order_space: true,
        ..Settings::default()
    };

    let text = serde_json::to_string(&settings).expect("ok");
    assert!(text.contains(r#""order_space":true"#));
    assert_eq!(Settings::from_json(&text).expect("ok"), settings);
}
