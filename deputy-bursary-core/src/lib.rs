#![doc = "deputy-bursary-core: resource query, aggregation and reconciliation for bursary students."]

//! This crate holds everything that reasons about Deputy data. It never
//! touches the network, the filesystem or stdout directly: requests go
//! through the [`contract::Transport`] trait, so the CLI supplies an HTTP
//! client and tests supply mocks.
//!
//! # Layers (leaf first)
//! - [`fetch`]: paginated `resource/<Name>/QUERY` into keyed collections
//! - [`record`]: typed resources and joined-object accessors
//! - [`views`]: active employees, year levels, roster/timesheet tallies
//! - [`reconcile`]: create/update/delete/reinstate decisions
//! - [`report`]: compliance rows from the views
//! - [`explore`]: employee references across every resource

pub mod contract;
pub mod counter;
pub mod error;
pub mod explore;
pub mod fetch;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod views;

pub use error::{DeputyError, MissingRelatedObject};
