//! Field machine-name derivation
//!
//! A field's `name` is derived from its label and must be unique across the
//! whole form, nested groups included. Derivation runs on every label
//! keystroke, so it is synchronous and deterministic: the same label and the
//! same set of taken names always yield the same result.

use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::NamingConfig;
use crate::domain::aggregates::SchemaError;

const FALLBACK_NAME: &str = "field";

fn markup_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

/// Derives unique machine names from labels
#[derive(Clone, Debug)]
pub struct NameDeriver {
    max_length: usize,
    max_suffix_attempts: u32,
}

impl NameDeriver {
    pub fn new(config: &NamingConfig) -> Self {
        Self {
            max_length: config.max_length.max(1),
            max_suffix_attempts: config.max_suffix_attempts,
        }
    }

    /// Base machine name for a label, before collision handling
    pub fn base_name(&self, label: &str) -> String {
        let stripped = match markup_pattern() {
            Some(re) => re.replace_all(label, " "),
            None => Cow::Borrowed(label),
        };
        let lowered = stripped.replace("&nbsp;", " ").trim().to_lowercase();

        let mut name = String::with_capacity(lowered.len());
        let mut pending_dash = false;
        for c in lowered.chars() {
            match c {
                'a'..='z' | '0'..='9' | '-' => {
                    if pending_dash && !name.is_empty() {
                        name.push('-');
                    }
                    pending_dash = false;
                    name.push(c);
                }
                // Apostrophes and quotes vanish: "Pet's" -> "pets"
                '\'' | '"' | '`' | '\u{2018}' | '\u{2019}' | '\u{201c}' | '\u{201d}' => {}
                _ => pending_dash = true,
            }
        }

        let mut name: String = name.trim_start_matches('-').chars().take(self.max_length).collect();
        while name.ends_with('-') {
            name.pop();
        }

        if name.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            name
        }
    }

    /// Derive a name for `label` that does not collide with `taken`.
    ///
    /// Collisions get `-0`, `-1`, ... appended to the base name.
    pub fn derive(&self, label: &str, taken: &HashSet<String>) -> Result<String, SchemaError> {
        let base = self.base_name(label);
        if !taken.contains(&base) {
            return Ok(base);
        }

        for suffix in 0..self.max_suffix_attempts {
            let candidate = format!("{}-{}", base, suffix);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(SchemaError::NameExhausted { base })
    }
}

impl Default for NameDeriver {
    fn default() -> Self {
        Self::new(&NamingConfig::default())
    }
}
