//! End-to-end tests
//!
//! These tests wire complete authorities together: an IdP exporting its
//! metadata, an SP consuming it, keys flowing between them and attributes
//! released across.

mod common;
mod attribute_release;
mod endpoints;
mod key_management;
mod metadata_export;
