//! Raw record normalization and record materialization
//!
//! ```text
//! extractor / editor → RawRecord → normalize() → Patch → WorkingRecord::merge()
//!                                                     ↘ materialize(defaults, patch) → CanonicalRecord
//! ```

use crate::alias::AliasResolver;
use crate::schema::{CanonicalRecord, Field, FieldKind, FieldValue, NUMERIC_FALLBACK};
use crate::sanitize::{clamp, sanitize_text, to_safe_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Partial record of unsanitized values keyed by canonical field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    values: BTreeMap<Field, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object whose keys are free-text labels
    ///
    /// Keys are resolved through `resolver`; unresolved keys are dropped.
    /// Non-object input (arrays, scalars, null) yields an empty record.
    pub fn from_json(value: &Value, resolver: &AliasResolver) -> Self {
        let mut record = Self::new();
        let Some(object) = value.as_object() else {
            debug!("Raw input is not an object, ignoring");
            return record;
        };

        for (label, raw) in object {
            match resolver.resolve(label) {
                Some(field) => {
                    record.values.entry(field).or_insert_with(|| raw.clone());
                }
                None => debug!(label = %label, "Dropping unmapped key"),
            }
        }
        record
    }

    pub fn insert(&mut self, field: Field, value: Value) {
        self.values.insert(field, value);
    }

    /// Insert only when `field` has no value yet; returns whether it was inserted
    pub fn insert_if_absent(&mut self, field: Field, value: Value) -> bool {
        if self.values.contains_key(&field) {
            return false;
        }
        self.values.insert(field, value);
        true
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.values.get(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }
}

/// Partial clean record; merged onto the working record field by field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    values: BTreeMap<Field, FieldValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.values.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }
}

impl IntoIterator for Patch {
    type Item = (Field, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<Field, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl From<&CanonicalRecord> for Patch {
    fn from(record: &CanonicalRecord) -> Self {
        let mut patch = Patch::new();
        for field in Field::ALL {
            patch.insert(field, record.get(field));
        }
        patch
    }
}

/// Clean one raw value for `field`
///
/// `numeric_fallback` is used when a numeric value cannot be recovered.
pub fn clean_value(field: Field, raw: &Value, numeric_fallback: f64) -> FieldValue {
    let descriptor = field.descriptor();
    match descriptor.kind {
        FieldKind::Text => FieldValue::Text(sanitize_text(raw, descriptor.text_fallback)),
        FieldKind::Score | FieldKind::Number => {
            let mut n = to_safe_number(raw, numeric_fallback);
            if let Some((lo, hi)) = descriptor.clamp_range() {
                n = clamp(n, lo, hi);
            }
            FieldValue::Number(n)
        }
    }
}

/// Sanitize every field of a raw record
///
/// Text fields use their field-specific fallback, numeric fields fall back to
/// `0`, and score fields are clamped.
pub fn normalize(raw: &RawRecord) -> Patch {
    let mut patch = Patch::new();
    for (field, value) in raw.iter() {
        patch.insert(field, clean_value(field, value, NUMERIC_FALLBACK));
    }
    patch
}

/// Resolve the keys of a JSON object and normalize the result
///
/// Arrays and scalars yield an empty patch.
pub fn normalize_json(value: &Value, resolver: &AliasResolver) -> Patch {
    normalize(&RawRecord::from_json(value, resolver))
}

/// Overlay `patch` onto `defaults`, producing a total record
///
/// The patch wins for every field it contains. Each value is re-checked
/// against the field descriptor, so a numeric field transiently holding text
/// (e.g. `""` while being edited) resolves to the default value.
pub fn materialize(defaults: &CanonicalRecord, patch: &Patch) -> CanonicalRecord {
    let mut record = defaults.clone();

    for (field, value) in patch.iter() {
        let default_number = defaults.get(field).as_number().unwrap_or(NUMERIC_FALLBACK);
        let raw = match value {
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
        };
        record.set(field, clean_value(field, &raw, default_number));
    }

    record
}
