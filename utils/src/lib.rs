//! Shared utilities for the redactor upload workspace.
//!
//! Holds build metadata that both the service binary and its health
//! endpoint report.

pub mod version_info;
