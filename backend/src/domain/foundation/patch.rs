//! Tri-state field update for partial (PATCH) requests.

use serde::{Deserialize, Deserializer};

/// A field in a partial update: left alone, cleared, or replaced.
///
/// Use with `#[serde(default)]` so an absent key deserializes to `Unset`
/// while an explicit `null` becomes `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    /// Applies the patch to an optional field.
    pub fn apply_to(self, field: &mut Option<T>) {
        match self {
            Patch::Unset => {}
            Patch::Null => *field = None,
            Patch::Value(value) => *field = Some(value),
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Patch::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        reference: Patch<String>,
    }

    #[test]
    fn absent_key_is_unset() {
        let body: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(body.reference, Patch::Unset);
    }

    #[test]
    fn explicit_null_clears() {
        let body: Body = serde_json::from_str(r#"{"reference": null}"#).unwrap();
        let mut field = Some("old".to_string());
        body.reference.apply_to(&mut field);
        assert_eq!(field, None);
    }

    #[test]
    fn value_replaces() {
        let body: Body = serde_json::from_str(r#"{"reference": "TRX-9"}"#).unwrap();
        let mut field = None;
        body.reference.apply_to(&mut field);
        assert_eq!(field.as_deref(), Some("TRX-9"));
    }
}
