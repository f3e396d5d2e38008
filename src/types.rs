//! Shared identifier types.

/// Stable node identifier, unique within a graph view.
pub type NodeID = String;
