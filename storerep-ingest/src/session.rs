//! Editing session state
//!
//! One [`WorkingRecord`] lives for one editing session. It changes only
//! through manual edits (one field at a time) and whole-patch merges from
//! successful extractions. Nothing is persisted.

use crate::normalizer::{clean_value, materialize, Patch};
use crate::sanitize::sanitize_text;
use crate::schema::{CanonicalRecord, Field, FieldKind, FieldValue, NUMERIC_FALLBACK};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Live record being edited
///
/// Holds a value for every field. Numeric fields may transiently hold
/// `Text("")` after a blank manual edit; [`WorkingRecord::materialize`]
/// resolves that back to a safe value.
#[derive(Debug, Clone)]
pub struct WorkingRecord {
    defaults: CanonicalRecord,
    values: Patch,
}

impl Default for WorkingRecord {
    fn default() -> Self {
        Self::new(CanonicalRecord::default())
    }
}

impl WorkingRecord {
    pub fn new(defaults: CanonicalRecord) -> Self {
        Self {
            values: Patch::from(&defaults),
            defaults,
        }
    }

    pub fn get(&self, field: Field) -> FieldValue {
        self.values
            .get(field)
            .cloned()
            .unwrap_or_else(|| self.defaults.get(field))
    }

    /// Apply a manual edit to one field
    ///
    /// Numeric fields: blank input is kept as transient `""`; anything else is
    /// coerced with the field's previous value as fallback (and clamped for
    /// scores). Text fields are sanitized without substituting a fallback so
    /// the editor can hold an empty value.
    pub fn apply_edit(&mut self, field: Field, raw: &Value) -> FieldValue {
        let value = match field.kind() {
            FieldKind::Text => FieldValue::Text(sanitize_text(raw, "")),
            FieldKind::Score | FieldKind::Number => {
                let blank = match raw {
                    Value::String(s) => s.trim().is_empty(),
                    Value::Null => true,
                    _ => false,
                };
                if blank {
                    FieldValue::Text(String::new())
                } else {
                    let previous = self.get(field).as_number().unwrap_or(NUMERIC_FALLBACK);
                    clean_value(field, raw, previous)
                }
            }
        };

        debug!(field = %field, value = ?value, "Manual edit applied");
        self.values.insert(field, value.clone());
        value
    }

    /// Merge a clean patch in one step; fields absent from the patch are untouched
    ///
    /// # Returns
    /// * Fields written by the patch
    pub fn merge(&mut self, patch: Patch) -> Vec<Field> {
        let fields = patch.fields();
        for (field, value) in patch {
            self.values.insert(field, value);
        }
        info!(fields = fields.len(), "Patch merged into working record");
        fields
    }

    /// Discard all edits and return to the default record
    pub fn reset(&mut self) {
        self.values = Patch::from(&self.defaults);
        info!("Working record reset to defaults");
    }

    /// Total, invariant-satisfying record for rendering
    pub fn materialize(&self) -> CanonicalRecord {
        materialize(&self.defaults, &self.values)
    }
}

/// In-flight gate for one kind of extraction
///
/// At most one holder at a time; released when the [`BusyGuard`] drops.
#[derive(Debug)]
pub struct BusyFlag {
    name: &'static str,
    busy: AtomicBool,
}

impl BusyFlag {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the flag, or `None` if an operation is already in flight
    pub fn try_acquire(self: &Arc<Self>) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                flag: Arc::clone(self),
            })
    }
}

/// Holds a [`BusyFlag`] until dropped
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<BusyFlag>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
        debug!(operation = self.flag.name, "Busy flag released");
    }
}
