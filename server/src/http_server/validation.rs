use std::collections::BTreeMap;

use serde::Serialize;

use super::errors::ServerError;

pub(crate) const REQUIRED: &str = "This field is required.";

/// Per-field error messages, serialized as `{"field": ["message", ..]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), ServerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServerError::Invalid(self))
        }
    }
}

/// Records a "required" error when `value` is missing.
pub(crate) fn require<'a, T>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&'a T>,
) -> Option<&'a T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// Length and blankness checks shared by every free-text field.
pub(crate) fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, max_chars: usize) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else if value.chars().count() > max_chars {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_chars} characters."),
        );
    }
}
