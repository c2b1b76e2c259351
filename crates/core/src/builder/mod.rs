//! PC builder: a fixed component catalog and the rules that decide whether
//! a selection of components fits together.
//!
//! The catalog is hard-coded; nothing here touches storage. Routes resolve
//! client-supplied ids with [`BuildSelection::resolve`] and report
//! [`BuildSelection::summary`].

pub mod catalog;
pub mod compatibility;

pub use catalog::{
    Component, ComponentCategory, ComponentKind, catalog, component_by_id, find_component,
};
pub use compatibility::{BuildSelection, BuildSummary, CatalogError, CompatibilityIssue, evaluate};
