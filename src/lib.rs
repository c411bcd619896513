//! aeromap - A schema-driven entity mapper
//!
//! Declare entity types and their columns, freeze them into a schema, then
//! convert between caller input, stored output and normalized transfer data.

pub mod config;
pub mod entity;
pub mod mapper;
pub mod observability;
pub mod query;
pub mod schema;
