//! Ephemeris Core Types and Definitions
//!
//! This crate provides the foundational types for the Ephemeris
//! configuration engine. It includes:
//!
//! - **Identifiers**: Efficient string-interned identifiers and the
//!   hierarchical element id ([`identifier::ElemId`])
//! - **Values**: Nested value trees and reference expressions
//!   ([`value`] module)
//! - **Elements**: Typed representations of configuration entities
//!   ([`element`] module)
//! - **Registry**: Session-scoped element storage keyed by id
//!   ([`registry`] module)

pub mod element;
pub mod identifier;
pub mod registry;
pub mod value;
