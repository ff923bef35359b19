//! Processes which can be carried out against a cluster.
pub mod backup;
pub mod restore;
