//! Typed view of the payment's `meta` annotation.
//!
//! The annotation is stored as schema-light JSON. It is decoded once, when a
//! payment is built or loaded, into a closed set of linkage shapes so that the
//! propagator never has to poke at raw JSON.

use serde_json::{Map, Value};

use crate::domain::foundation::{EnrollmentId, UserId};

/// Category tag marking a payment as a registration fee.
pub const REGISTRATION_CATEGORY: &str = "registration";

const KEY_CATEGORY: &str = "category";
const KEY_PAYER_ID: &str = "payer_id";
const KEY_ENROLLMENT_ID: &str = "enrollment_id";
const KEY_ENROLLMENT_IDS: &str = "enrollment_ids";

/// Dependent enrollment records a payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EnrollmentLinkage {
    #[default]
    NoLinkage,
    SingleEnrollment(EnrollmentId),
    EnrollmentBundle(Vec<EnrollmentId>),
}

impl EnrollmentLinkage {
    pub fn ids(&self) -> Vec<EnrollmentId> {
        match self {
            EnrollmentLinkage::NoLinkage => Vec::new(),
            EnrollmentLinkage::SingleEnrollment(id) => vec![*id],
            EnrollmentLinkage::EnrollmentBundle(ids) => ids.clone(),
        }
    }
}

/// Decoded annotation; keys this crate does not understand ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentAnnotation {
    pub linkage: EnrollmentLinkage,
    pub category: Option<String>,
    pub payer_id: Option<UserId>,
    pub extra: Map<String, Value>,
}

impl PaymentAnnotation {
    /// Decodes the raw annotation. Non-object values decode to an empty annotation.
    ///
    /// A known key only leaves `extra` when it decodes cleanly; anything
    /// malformed or shadowed is kept verbatim so that re-encoding loses nothing.
    pub fn decode(raw: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = raw else {
            return Self::default();
        };

        let mut extra = map.clone();
        let category = take_decoded(&mut extra, KEY_CATEGORY, |v| v.as_str().map(str::to_string));
        let payer_id =
            take_decoded(&mut extra, KEY_PAYER_ID, |v| v.as_str()?.parse::<UserId>().ok());

        let bundle = take_decoded(&mut extra, KEY_ENROLLMENT_IDS, exact_id_list)
            .or_else(|| extra.get(KEY_ENROLLMENT_IDS).map(parse_id_list))
            .filter(|ids| !ids.is_empty());
        let linkage = match bundle {
            Some(ids) => EnrollmentLinkage::EnrollmentBundle(ids),
            None => {
                let single = take_decoded(&mut extra, KEY_ENROLLMENT_ID, |v| {
                    v.as_str()?.parse::<EnrollmentId>().ok()
                });
                single.map_or(EnrollmentLinkage::NoLinkage, EnrollmentLinkage::SingleEnrollment)
            }
        };

        Self {
            linkage,
            category,
            payer_id,
            extra,
        }
    }

    /// Encodes back to the stored JSON shape. Raw values kept in `extra` win.
    pub fn to_json(&self) -> Option<Value> {
        let mut map = self.extra.clone();
        if let Some(category) = &self.category {
            insert_absent(&mut map, KEY_CATEGORY, Value::String(category.clone()));
        }
        if let Some(payer_id) = &self.payer_id {
            insert_absent(&mut map, KEY_PAYER_ID, Value::String(payer_id.to_string()));
        }
        match &self.linkage {
            EnrollmentLinkage::NoLinkage => {}
            EnrollmentLinkage::SingleEnrollment(id) => {
                insert_absent(&mut map, KEY_ENROLLMENT_ID, Value::String(id.to_string()));
            }
            EnrollmentLinkage::EnrollmentBundle(ids) => {
                let list = ids.iter().map(|id| Value::String(id.to_string())).collect();
                insert_absent(&mut map, KEY_ENROLLMENT_IDS, Value::Array(list));
            }
        }

        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    }

    pub fn is_registration(&self) -> bool {
        self.category.as_deref() == Some(REGISTRATION_CATEGORY)
    }

    /// Enrollment ids to propagate to; empty unless tagged as a registration.
    pub fn registration_enrollments(&self) -> Vec<EnrollmentId> {
        if self.is_registration() {
            self.linkage.ids()
        } else {
            Vec::new()
        }
    }
}

/// Removes `key` from `map` only when `decode` accepts its value.
fn take_decoded<T>(
    map: &mut Map<String, Value>,
    key: &str,
    decode: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let decoded = map.get(key).and_then(decode)?;
    map.remove(key);
    Some(decoded)
}

fn insert_absent(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !map.contains_key(key) {
        map.insert(key.to_string(), value);
    }
}

/// A non-empty list that re-encodes to exactly the same JSON.
fn exact_id_list(value: &Value) -> Option<Vec<EnrollmentId>> {
    let items = value.as_array()?;
    let ids = parse_id_list(value);
    let canonical = ids.len() == items.len()
        && ids
            .iter()
            .zip(items)
            .all(|(id, item)| item.as_str() == Some(id.to_string().as_str()));
    (canonical && !ids.is_empty()).then_some(ids)
}

/// Parses a list of ids, skipping malformed entries and duplicates.
fn parse_id_list(value: &Value) -> Vec<EnrollmentId> {
    let mut ids: Vec<EnrollmentId> = Vec::new();
    if let Value::Array(items) = value {
        for id in items
            .iter()
            .filter_map(|item| item.as_str().and_then(|s| s.parse().ok()))
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
