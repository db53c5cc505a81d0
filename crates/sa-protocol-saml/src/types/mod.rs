//! SAML 2.0 types and data structures.
//!
//! Metadata descriptors consumed by key lookup and service selection,
//! attribute statements produced by release, XML Schema value typing and
//! protocol status codes.

mod attribute;
mod constants;
mod metadata;
mod status;
mod xs;

pub use attribute::*;
pub use constants::*;
pub use metadata::*;
pub use status::*;
pub use xs::*;
