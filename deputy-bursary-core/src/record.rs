//! Records returned by resource queries, raw and typed.
//!
//! Joined objects (`join: ["ContactObject"]`) arrive inlined under an
//! object-named key. Accessors for them fail with [`MissingRelatedObject`]
//! rather than falling back to a default, since a missing contact on an
//! active employee means the upstream data is broken.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MissingRelatedObject;

/// Value of the field a [`crate::fetch::ResourceCollection`] is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// Numbers and strings can key a collection; anything else cannot.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordKey::Int),
            Value::String(s) => Some(RecordKey::Text(s.clone())),
            Value::Bool(b) => Some(RecordKey::Text(b.to_string())),
            _ => None,
        }
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        RecordKey::Int(id)
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::Text(s.to_string())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Int(i) => write!(f, "{i}"),
            RecordKey::Text(s) => f.write_str(s),
        }
    }
}

/// A resource the typed views know how to read.
pub trait Resource: serde::de::DeserializeOwned + Send {
    const NAME: &'static str;
}

/// An untyped record, for passthrough listings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRecord(pub Map<String, Value>);

impl ResourceRecord {
    pub fn id(&self) -> Option<i64> {
        self.0.get("Id").and_then(Value::as_i64)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The object inlined by a `join`, e.g. `OperationalUnitObject`.
    pub fn joined(&self, resource: &str, object: &str) -> Result<&Map<String, Value>, MissingRelatedObject> {
        self.0
            .get(object)
            .and_then(Value::as_object)
            .ok_or_else(|| missing(resource, self.id().unwrap_or_default(), object))
    }
}

fn missing(resource: &str, id: i64, object: &str) -> MissingRelatedObject {
    MissingRelatedObject {
        resource: resource.to_string(),
        id,
        object: object.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employee {
    pub id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(rename = "ContactObject", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Employee {
    pub const CONTACT: &'static str = "ContactObject";

    pub fn contact(&self) -> Result<&Contact, MissingRelatedObject> {
        self.contact
            .as_ref()
            .ok_or_else(|| missing(Self::NAME, self.id, Self::CONTACT))
    }

    /// Email from the joined contact. A contact without an email is treated
    /// the same as a missing contact.
    pub fn email(&self) -> Result<&str, MissingRelatedObject> {
        self.contact()?
            .email
            .as_deref()
            .ok_or_else(|| missing(Self::NAME, self.id, Self::CONTACT))
    }
}

impl Resource for Employee {
    const NAME: &'static str = "Employee";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingModule {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

impl Resource for TrainingModule {
    const NAME: &'static str = "TrainingModule";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingRecord {
    pub id: i64,
    pub employee: i64,
    pub module: i64,
    #[serde(default)]
    pub active: Option<bool>,
}

impl Resource for TrainingRecord {
    const NAME: &'static str = "TrainingRecord";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OperationalUnit {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub operational_unit_name: Option<String>,
}

pub const OPERATIONAL_UNIT: &str = "OperationalUnitObject";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Roster {
    pub id: i64,
    #[serde(default)]
    pub employee: i64,
    #[serde(default)]
    pub matched_by_timesheet: Option<i64>,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(rename = "OperationalUnitObject", default, skip_serializing_if = "Option::is_none")]
    pub operational_unit: Option<OperationalUnit>,
}

impl Roster {
    pub fn operational_unit(&self) -> Result<&OperationalUnit, MissingRelatedObject> {
        self.operational_unit
            .as_ref()
            .ok_or_else(|| missing(Self::NAME, self.id, OPERATIONAL_UNIT))
    }
}

impl Resource for Roster {
    const NAME: &'static str = "Roster";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Timesheet {
    pub id: i64,
    #[serde(default)]
    pub employee: i64,
    #[serde(default)]
    pub is_leave: bool,
    #[serde(default)]
    pub time_approved: bool,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(rename = "OperationalUnitObject", default, skip_serializing_if = "Option::is_none")]
    pub operational_unit: Option<OperationalUnit>,
}

impl Timesheet {
    pub fn operational_unit(&self) -> Result<&OperationalUnit, MissingRelatedObject> {
        self.operational_unit
            .as_ref()
            .ok_or_else(|| missing(Self::NAME, self.id, OPERATIONAL_UNIT))
    }
}

impl Resource for Timesheet {
    const NAME: &'static str = "Timesheet";
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalCategory {
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Journal {
    pub id: i64,
    #[serde(default)]
    pub employee_id: i64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub category: Vec<JournalCategory>,
    #[serde(default)]
    pub creator: i64,
}

impl Resource for Journal {
    const NAME: &'static str = "Journal";
}

/// Response of the `me` API, used as a credentials check on start up.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Me {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub deputy_version: String,
}
