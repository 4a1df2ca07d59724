//! Which records across the account point at which employee.
//!
//! Many Deputy resources carry employee ids in attributes such as `Creator`,
//! `Employee` or `Supervisor`. Scanning them against the full employee list
//! shows what an employee has touched before they are deleted, and surfaces
//! dangling references to employees that no longer exist.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::contract::Transport;
use crate::error::Result;
use crate::fetch::{ResourceClient, ResourceCollection};
use crate::query::ResourceQuery;
use crate::record::{Employee, RecordKey, Resource, ResourceRecord};

/// A resource and the attributes of it that hold employee ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceScan {
    pub resource: &'static str,
    pub attributes: &'static [&'static str],
}

const fn creator(resource: &'static str) -> ReferenceScan {
    ReferenceScan {
        resource,
        attributes: &["Creator"],
    }
}

/// Resources known to reference employees. `Employee` itself is scanned
/// from the list already fetched for name lookups.
pub const REFERENCE_SCANS: &[ReferenceScan] = &[
    creator("Address"),
    creator("Category"),
    creator("Company"),
    creator("CompanyPeriod"),
    creator("Contact"),
    creator("Country"),
    ReferenceScan {
        resource: "CustomAppData",
        attributes: &["Creator", "Employee"],
    },
    creator("CustomField"),
    creator("CustomFieldData"),
    ReferenceScan {
        resource: "Employee",
        attributes: &["Id", "Creator"],
    },
    ReferenceScan {
        resource: "EmployeeAgreement",
        attributes: &["Creator", "EmployeeId"],
    },
    creator("EmployeeAgreementHistory"),
    ReferenceScan {
        resource: "EmployeeAppraisal",
        attributes: &["Creator", "Employee"],
    },
    creator("Event"),
    creator("Geo"),
    ReferenceScan {
        resource: "Journal",
        attributes: &["Creator", "EmployeeId"],
    },
    creator("Kiosk"),
    ReferenceScan {
        resource: "Leave",
        attributes: &["Creator", "Employee"],
    },
    creator("Memo"),
    creator("Noticeboard"),
    ReferenceScan {
        resource: "Roster",
        attributes: &["Creator", "ConfirmBy", "Employee"],
    },
    ReferenceScan {
        resource: "SalesData",
        attributes: &["Creator", "Employee"],
    },
    creator("Schedule"),
    creator("SmsLog"),
    ReferenceScan {
        resource: "Timesheet",
        attributes: &["Creator", "Employee", "Supervisor"],
    },
    ReferenceScan {
        resource: "TrainingRecord",
        attributes: &["Creator", "Employee"],
    },
];

/// One attribute of one record holding an employee id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeReference {
    pub resource: String,
    pub record: RecordKey,
    pub attribute: String,
    pub employee_id: i64,
    /// `None` when no employee has this id.
    pub employee_name: Option<String>,
}

impl fmt::Display for EmployeeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.employee_name.as_deref().unwrap_or("*Employee not found*");
        write!(
            f,
            "[{}:{}] {}: {} ({})",
            self.resource, self.record, self.attribute, name, self.employee_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub resource: String,
    pub fetched: usize,
    pub references: Vec<EmployeeReference>,
}

/// Display names by employee id.
pub fn employee_names(employees: &ResourceCollection<ResourceRecord>) -> HashMap<i64, String> {
    employees
        .values()
        .filter_map(|e| {
            let name = e.get("DisplayName").and_then(Value::as_str).unwrap_or_default();
            e.id().map(|id| (id, name.to_string()))
        })
        .collect()
}

/// References from `records` to employees.
///
/// Ids of zero or below are not references (CompanyPeriod uses -1 as its
/// creator). With `find_id` only references to that employee are kept, but
/// references to missing employees are always reported.
pub fn extract_references(
    resource: &str,
    records: &ResourceCollection<ResourceRecord>,
    attributes: &[&str],
    names: &HashMap<i64, String>,
    find_id: Option<i64>,
) -> Vec<EmployeeReference> {
    let mut references = Vec::new();
    for (key, record) in records.iter() {
        for attribute in attributes {
            let Some(employee_id) = record.get(attribute).and_then(Value::as_i64) else {
                continue;
            };
            if employee_id <= 0 {
                continue;
            }
            let employee_name = names.get(&employee_id).cloned();
            if employee_name.is_some() && find_id.is_some_and(|id| id != employee_id) {
                continue;
            }
            references.push(EmployeeReference {
                resource: resource.to_string(),
                record: key.clone(),
                attribute: attribute.to_string(),
                employee_id,
                employee_name,
            });
        }
    }
    references
}

pub struct Explorer<'a, T> {
    client: &'a ResourceClient<T>,
}

impl<'a, T: Transport> Explorer<'a, T> {
    pub fn new(client: &'a ResourceClient<T>) -> Self {
        Self { client }
    }

    /// Every employee, active or not, sorted by last name.
    pub async fn all_employees(&self) -> Result<ResourceCollection<Employee>> {
        self.client
            .fetch(&ResourceQuery::new(Employee::NAME).sort("LastName"))
            .await
    }

    /// Fetch each resource in `scans` and collect its employee references.
    ///
    /// The first result is always the employee list used for lookups. Any
    /// fetch failure ends the scan.
    pub async fn scan(&self, scans: &[ReferenceScan], find_id: Option<i64>) -> Result<Vec<ScanResult>> {
        let employees: ResourceCollection<ResourceRecord> =
            self.client.fetch(&ResourceQuery::new(Employee::NAME)).await?;
        let names = employee_names(&employees);

        let mut results = vec![ScanResult {
            resource: Employee::NAME.to_string(),
            fetched: employees.len(),
            references: Vec::new(),
        }];
        for scan in scans {
            if scan.resource == Employee::NAME {
                let references = extract_references(scan.resource, &employees, scan.attributes, &names, find_id);
                results[0].references.extend(references);
                continue;
            }
            let records = self.client.fetch(&ResourceQuery::new(scan.resource)).await?;
            let references = extract_references(scan.resource, &records, scan.attributes, &names, find_id);
            debug!(resource = scan.resource, references = references.len(), "Scanned resource");
            results.push(ScanResult {
                resource: scan.resource.to_string(),
                fetched: records.len(),
                references,
            });
        }

        let total: usize = results.iter().map(|r| r.references.len()).sum();
        info!(resources = results.len(), references = total, ?find_id, "Explored employee references");
        Ok(results)
    }
}
