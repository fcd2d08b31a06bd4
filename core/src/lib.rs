//! Core library for tricook: models, persistence, catalog resolution,
//! extraction reconciliation, shopping-list aggregation, and the service layer.

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod shopping_list;
