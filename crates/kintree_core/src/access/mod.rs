//! Session permission gate.
//!
//! Two session modes decide which edit intents may reach the relationship
//! engine. The gate is consulted once per intent, before any mutation.

pub mod gate;
