#![allow(dead_code)]

//! In-memory stand-in for the Deputy resource API.
//!
//! Understands just enough of QUERY (eq/ne/ge/le filters, ascending sort,
//! 500-record pages) plus create, partial update and delete, and records
//! every call so tests can assert on what was sent.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use deputy_bursary_core::contract::{Method, Transport};
use deputy_bursary_core::fetch::PAGE_SIZE;
use deputy_bursary_core::DeputyError;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !(self.path.ends_with("/QUERY") || self.method == Method::Get)
    }
}

#[derive(Default)]
struct State {
    resources: HashMap<String, Vec<Value>>,
    calls: Vec<Call>,
    next_id: i64,
}

#[derive(Default)]
pub struct FakeDeputy {
    state: Mutex<State>,
}

impl FakeDeputy {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().next_id = 10_000;
        fake
    }

    pub fn with(self, resource: &str, records: Vec<Value>) -> Self {
        self.state
            .lock()
            .unwrap()
            .resources
            .entry(resource.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn records(&self, resource: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// A `YYYY-MM-DD` filter compares against the date part of a timestamp.
fn date_part(value: &Value, data: &Value) -> Value {
    match (value, data) {
        (Value::String(v), Value::String(d)) if d.len() == 10 && v.len() > 10 => {
            Value::String(v[..10].to_string())
        }
        _ => value.clone(),
    }
}

fn matches(record: &Value, search: &serde_json::Map<String, Value>) -> bool {
    search.iter().filter(|(name, _)| name.as_str() != "f1").all(|(_, filter)| {
        let field = filter["field"].as_str().unwrap_or_default();
        let data = &filter["data"];
        let value = date_part(record.get(field).unwrap_or(&Value::Null), data);
        match filter["type"].as_str().unwrap_or_default() {
            "eq" => &value == data,
            "ne" => &value != data,
            "ge" => compare(&value, data) != Ordering::Less,
            "le" => compare(&value, data) != Ordering::Greater,
            _ => true,
        }
    })
}

#[async_trait]
impl Transport for FakeDeputy {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DeputyError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method,
            path: path.to_string(),
            body: body.clone(),
        });

        if path == "me" {
            return Ok(json!({"Name": "Test Admin", "DeputyVersion": "3.0"}));
        }

        let parts: Vec<&str> = path.split('/').collect();
        match (method, parts.as_slice()) {
            (Method::Post, ["resource", name, "QUERY"]) => {
                let body = body.unwrap_or_default();
                let search = body["search"].as_object().cloned().unwrap_or_default();
                let (sort_field, _) = body["sort"]
                    .as_object()
                    .and_then(|s| s.iter().next().map(|(k, v)| (k.clone(), v.clone())))
                    .unwrap_or(("Id".to_string(), json!("asc")));
                let start = body["start"].as_u64().unwrap_or(0) as usize;

                let mut found: Vec<Value> = state
                    .resources
                    .get(*name)
                    .map(|records| records.iter().filter(|r| matches(r, &search)).cloned().collect())
                    .unwrap_or_default();
                found.sort_by(|a, b| compare(&a[&sort_field], &b[&sort_field]));
                Ok(Value::Array(found.into_iter().skip(start).take(PAGE_SIZE).collect()))
            }
            (Method::Post, ["resource", name]) => {
                state.next_id += 1;
                let id = state.next_id;
                let mut record = body.unwrap_or_else(|| json!({}));
                record["Id"] = json!(id);
                state
                    .resources
                    .entry(name.to_string())
                    .or_default()
                    .push(record.clone());
                Ok(record)
            }
            (Method::Post, ["resource", name, id]) => {
                let id: i64 = id.parse().unwrap();
                let fields = body.unwrap_or_default();
                let record = state
                    .resources
                    .get_mut(*name)
                    .and_then(|records| records.iter_mut().find(|r| r["Id"] == json!(id)));
                match record {
                    Some(record) => {
                        for (k, v) in fields.as_object().cloned().unwrap_or_default() {
                            record[k] = v;
                        }
                        Ok(record.clone())
                    }
                    None => Err(DeputyError::Http {
                        path: path.to_string(),
                        status: 404,
                        reason: "Not Found".to_string(),
                    }),
                }
            }
            (Method::Delete, ["resource", name, id]) => {
                let id: i64 = id.parse().unwrap();
                if let Some(records) = state.resources.get_mut(*name) {
                    records.retain(|r| r["Id"] != json!(id));
                }
                Ok(json!(format!("Deleted {id}")))
            }
            _ => Err(DeputyError::Http {
                path: path.to_string(),
                status: 400,
                reason: "Bad Request".to_string(),
            }),
        }
    }
}

pub fn employee(id: i64, first: &str, last: &str, email: &str, active: bool) -> Value {
    json!({
        "Id": id,
        "FirstName": first,
        "LastName": last,
        "DisplayName": format!("{first} {last}"),
        "Active": active,
        "ContactObject": {"Email": email}
    })
}

pub fn employee_without_contact(id: i64, first: &str, last: &str) -> Value {
    json!({
        "Id": id,
        "FirstName": first,
        "LastName": last,
        "DisplayName": format!("{first} {last}"),
        "Active": true
    })
}

pub fn module(id: i64, title: &str) -> Value {
    json!({"Id": id, "Title": title})
}

pub fn training(id: i64, employee: i64, module: i64) -> Value {
    json!({"Id": id, "Employee": employee, "Module": module, "Active": true})
}

pub fn roster(id: i64, employee: i64, location: &str, matched: i64, open: bool) -> Value {
    json!({
        "Id": id,
        "Employee": employee,
        "MatchedByTimesheet": matched,
        "Open": open,
        "Date": "2016-03-16T00:00:00+11:00",
        "OperationalUnitObject": {"Id": 1, "CompanyName": location}
    })
}

pub fn roster_on(id: i64, employee: i64, date: &str) -> Value {
    let mut record = roster(id, employee, "College", 1, false);
    record["Date"] = json!(format!("{date}T00:00:00+11:00"));
    record
}

pub fn timesheet(id: i64, employee: i64, location: &str, approved: bool, leave: bool) -> Value {
    json!({
        "Id": id,
        "Employee": employee,
        "TimeApproved": approved,
        "IsLeave": leave,
        "Date": "2016-03-16T00:00:00+11:00",
        "OperationalUnitObject": {"Id": 1, "CompanyName": location}
    })
}

/// Standard year modules: Year1=4, Year2=6, Year3=7, plus the bad "Year 3".
pub fn year_modules() -> Vec<Value> {
    vec![
        module(4, "Year1"),
        module(6, "Year2"),
        module(7, "Year3"),
        module(9, "Year 3"),
        module(11, "First Aid"),
    ]
}
