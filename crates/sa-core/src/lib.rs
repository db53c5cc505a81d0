//! # sa-core
//!
//! Core utilities, configuration, and error handling for the SAML authority.
//!
//! This crate provides the foundational types shared by the other `sa-*`
//! crates:
//!
//! - [`AuthorityConfig`] - entity id, base URL, key files and validity window
//! - [`EntityId`] - opaque URI identifying a SAML party
//! - [`Charset`] - character sets used to decode byte-valued properties
//! - [`Clock`] - injectable time source
//! - [`ChangeNotifier`] - synchronous change broadcast used for cache invalidation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod charset;
pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;

pub use charset::Charset;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthorityConfig;
pub use entity::EntityId;
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeListener, ChangeNotifier};
