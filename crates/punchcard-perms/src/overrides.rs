//! Per-employee permission overrides.
//!
//! Overrides are stored as one loosely typed JSON object keyed by employee
//! id. Each entry is a partial permission set whose values may be booleans,
//! the string `"true"`, or anything else an admin UI happened to write.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use punchcard_core::EmployeeId;

use crate::permissions::PermissionSet;

/// A raw override value as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFlag {
    Bool(bool),
    Text(String),
    Other(Value),
}

impl RawFlag {
    /// The coercion rule: only boolean `true` and the exact string `"true"`
    /// grant. Everything else (`"TRUE"`, `1`, `null`, ...) denies.
    pub fn is_true(&self) -> bool {
        match self {
            RawFlag::Bool(b) => *b,
            RawFlag::Text(s) => s == "true",
            RawFlag::Other(_) => false,
        }
    }
}

impl From<bool> for RawFlag {
    fn from(b: bool) -> Self {
        RawFlag::Bool(b)
    }
}

impl From<&str> for RawFlag {
    fn from(s: &str) -> Self {
        RawFlag::Text(s.to_string())
    }
}

/// Deserialize a field that is present in the object, even if `null`.
///
/// Plain `Option<T>` would fold an explicit `null` into "absent", which
/// matters for `modify_payroll` inheritance.
fn present<'de, D>(deserializer: D) -> Result<Option<RawFlag>, D::Error>
where
    D: Deserializer<'de>,
{
    RawFlag::deserialize(deserializer).map(Some)
}

/// A partial permission set for one employee. `None` means the key is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOverride {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub see_shipments: Option<RawFlag>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub modify_time: Option<RawFlag>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub view_time_reports: Option<RawFlag>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub view_payroll: Option<RawFlag>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub modify_payroll: Option<RawFlag>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub modify_pay_rates: Option<RawFlag>,
}

impl RawOverride {
    /// An override that spells out every field of `perms`.
    pub fn from_permissions(perms: &PermissionSet) -> Self {
        Self {
            see_shipments: Some(perms.see_shipments.into()),
            modify_time: Some(perms.modify_time.into()),
            view_time_reports: Some(perms.view_time_reports.into()),
            view_payroll: Some(perms.view_payroll.into()),
            modify_payroll: Some(perms.modify_payroll.into()),
            modify_pay_rates: Some(perms.modify_pay_rates.into()),
        }
    }
}

/// Coerce an optional raw value. Absent counts as `false`.
pub fn coerce_flag(raw: Option<&RawFlag>) -> bool {
    raw.is_some_and(RawFlag::is_true)
}

/// Resolve `modify_payroll`.
///
/// When the override carries any value for the key, that value is coerced
/// like every other field. When the key is absent, `modify_payroll` follows
/// the already-coerced `view_payroll` instead of the global default, so an
/// override of `{"view_payroll": true}` grants payroll modification too.
pub fn inherit_modify_payroll(raw: Option<&RawFlag>, view_payroll: bool) -> bool {
    match raw {
        Some(flag) => flag.is_true(),
        None => view_payroll,
    }
}

/// Merge one employee's override into a full permission set.
pub fn merge_override(raw: &RawOverride) -> PermissionSet {
    let view_payroll = coerce_flag(raw.view_payroll.as_ref());

    PermissionSet {
        see_shipments: coerce_flag(raw.see_shipments.as_ref()),
        modify_time: coerce_flag(raw.modify_time.as_ref()),
        view_time_reports: coerce_flag(raw.view_time_reports.as_ref()),
        view_payroll,
        modify_payroll: inherit_modify_payroll(raw.modify_payroll.as_ref(), view_payroll),
        modify_pay_rates: coerce_flag(raw.modify_pay_rates.as_ref()),
    }
}

/// The stored override map: employee id → raw entry.
///
/// Entries are kept as raw JSON so unexpected shapes survive a
/// read-modify-write by an admin edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideMap(BTreeMap<String, Value>);

impl OverrideMap {
    /// Parse the stored blob. Malformed JSON or a non-object top level
    /// yields an empty map.
    pub fn parse(blob: &str) -> Self {
        match serde_json::from_str::<Value>(blob) {
            Ok(Value::Object(entries)) => Self(entries.into_iter().collect()),
            Ok(other) => {
                warn!(kind = json_kind(&other), "access override map is not an object; ignoring");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "access override map is not valid JSON; ignoring");
                Self::default()
            }
        }
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// The override entry for an employee, if any.
    ///
    /// A `null` entry counts as absent. A non-object entry counts as an
    /// override with every key missing.
    pub fn entry(&self, employee_id: &EmployeeId) -> Option<RawOverride> {
        match self.0.get(employee_id.as_str())? {
            Value::Null => None,
            value @ Value::Object(_) => Some(
                RawOverride::deserialize(value).unwrap_or_else(|e| {
                    warn!(%employee_id, error = %e, "unreadable access override entry");
                    RawOverride::default()
                }),
            ),
            other => {
                warn!(%employee_id, kind = json_kind(other), "access override entry is not an object");
                Some(RawOverride::default())
            }
        }
    }

    /// Resolve an employee's permissions against the defaults.
    pub fn resolve(&self, employee_id: &EmployeeId) -> PermissionSet {
        match self.entry(employee_id) {
            Some(raw) => merge_override(&raw),
            None => PermissionSet::DEFAULT,
        }
    }

    /// Replace an employee's entry.
    pub fn insert(&mut self, employee_id: &EmployeeId, raw: &RawOverride) {
        let value = serde_json::to_value(raw).unwrap_or(Value::Object(Default::default()));
        self.0.insert(employee_id.as_str().to_string(), value);
    }

    /// Remove an employee's entry. Returns whether one existed.
    pub fn remove(&mut self, employee_id: &EmployeeId) -> bool {
        self.0.remove(employee_id.as_str()).is_some()
    }

    /// Employee ids with an entry.
    pub fn employee_ids(&self) -> impl Iterator<Item = EmployeeId> + '_ {
        self.0.keys().map(|k| EmployeeId::new(k.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
