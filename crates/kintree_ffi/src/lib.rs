//! Flutter bridge crate for KinTree.
//!
//! Only `api` is scanned by the FRB code generator.

pub mod api;
