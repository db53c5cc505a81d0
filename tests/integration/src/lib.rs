//! End-to-end tests for the SAML authority crates.
//!
//! The tests live under `tests/`; this library target is intentionally empty.
