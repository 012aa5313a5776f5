//! Access masks and group attributes
//!
//! Local validation that runs before any handle is opened.

pub mod access;

pub use access::{
    rights_table, AccessDescriptor, AccessRequest, GenericMapping, GroupAttributes, RightsTable,
    ValidatedMask,
};
