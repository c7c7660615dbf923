#[cfg(test)]
mod tests;

use itertools::Itertools;

use crate::boundaries::Ward;
use crate::{Result, WardError};

/// Deterministic embedding text for one ward
///
/// Attributes are appended in key order so the same ward always yields the
/// same text, and therefore the same vector.
#[inline]
pub fn describe_ward(ward: &Ward, city: &str) -> Result<String> {
    let name = ward
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| WardError::IncompleteRecord {
            ward_id: ward.id.clone(),
            field: "name".to_string(),
        })?;

    let mut text = format!(
        "This is municipal ward number {}, named {}, in {}.",
        ward.id, name, city
    );

    let attributes = ward
        .attributes
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("{}: {}", key, value.trim()))
        .join("; ");

    if !attributes.is_empty() {
        text.push_str(" Attributes: ");
        text.push_str(&attributes);
        text.push('.');
    }

    Ok(text)
}
