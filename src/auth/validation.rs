use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // local@domain.tld, no whitespace, at least one dot in the domain
        let pattern = concat!(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+",
            r"@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?",
            r"(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$",
        );
        Regex::new(pattern).unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Accumulates every rule violation instead of stopping at the first.
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.0.push(format!("\"{field}\" is not allowed to be empty"));
        }
        self
    }

    pub fn require_email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.0.push(format!("\"{field}\" is not allowed to be empty"));
        } else if !is_valid_email(value) {
            self.0.push(format!("\"{field}\" must be a valid email"));
        }
        self
    }

    pub fn push(&mut self, message: String) -> &mut Self {
        self.0.push(message);
        self
    }

    /// The body's fields, or `None` (recording a violation) when it is not an object.
    pub fn require_object<'a>(&mut self, body: &'a Value) -> Option<&'a Map<String, Value>> {
        let fields = body.as_object();
        if fields.is_none() {
            self.push("\"value\" must be of type object".to_string());
        }
        fields
    }

    /// Reads a string field. Missing or `null` reads as empty; any other type
    /// records a violation and yields `None`, as does a body that was not an object.
    pub fn require_string(
        &mut self,
        fields: Option<&Map<String, Value>>,
        field: &str,
    ) -> Option<String> {
        match fields?.get(field) {
            None | Some(Value::Null) => Some(String::new()),
            Some(Value::String(value)) => Some(value.clone()),
            Some(_) => {
                self.push(format!("\"{field}\" must be a string"));
                None
            }
        }
    }

    /// `Err` with all collected messages, in rule order, if any rule failed.
    pub fn finish(&mut self) -> Result<(), Vec<String>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.0))
        }
    }
}
