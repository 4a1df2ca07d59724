//! Resource QUERY requests: filters, sort, joins and the wire body.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

/// Search operators understood by `resource/<Name>/QUERY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field is not null.
    Is,
    /// Field is null.
    Ns,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// SQL-style `LIKE`.
    Lk,
    /// SQL-style `NOT LIKE`.
    Nk,
    In,
    Nn,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Is => "is",
            FilterOp::Ns => "ns",
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Ge => "ge",
            FilterOp::Lt => "lt",
            FilterOp::Le => "le",
            FilterOp::Lk => "lk",
            FilterOp::Nk => "nk",
            FilterOp::In => "in",
            FilterOp::Nn => "nn",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Search key used in the request body: `<field>_<op>_<data>`.
    ///
    /// The operator is part of the key so `Date ge d` and `Date le d` both
    /// survive when a range covers a single day.
    fn search_key(&self) -> String {
        let data = match &self.value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            other => other.to_string(),
        };
        format!("{}_{}_{}", self.field, self.op.as_str(), data)
    }
}

/// Inclusive date window applied to a resource's `Date` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(from) = self.from {
            filters.push(Filter::new("Date", FilterOp::Ge, from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            filters.push(Filter::new("Date", FilterOp::Le, to.format("%Y-%m-%d").to_string()));
        }
        filters
    }
}

/// Describes one paginated fetch of a resource collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuery {
    pub resource: String,
    pub key: String,
    pub sort: String,
    pub joins: Vec<String>,
    pub filters: Vec<Filter>,
}

impl ResourceQuery {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            key: "Id".to_string(),
            sort: "Id".to_string(),
            joins: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn join(mut self, object: impl Into<String>) -> Self {
        self.joins.push(object.into());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn path(&self) -> String {
        format!("resource/{}/QUERY", self.resource)
    }

    /// Request body for the page starting at `start`.
    ///
    /// `f1` guards on the key field being present so that every returned
    /// record can be keyed.
    pub fn body(&self, start: usize) -> Value {
        let mut search = Map::new();
        search.insert(
            "f1".to_string(),
            json!({ "field": self.key, "type": FilterOp::Is.as_str(), "data": "" }),
        );
        for filter in &self.filters {
            search.insert(
                filter.search_key(),
                json!({ "field": filter.field, "type": filter.op.as_str(), "data": filter.value }),
            );
        }
        let mut sort = Map::new();
        sort.insert(self.sort.clone(), Value::String("asc".to_string()));

        json!({
            "search": search,
            "sort": sort,
            "join": self.joins,
            "start": start,
        })
    }
}
