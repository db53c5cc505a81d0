//! # sa-cache
//!
//! Volatile, validity-bounded caching for the SAML authority.
//!
//! [`ValidityCache`] holds one slot per key. Each slot pairs a value with an
//! optional `valid_until` instant; a slot without one never expires on its
//! own and is only removed by explicit invalidation. Nothing here is
//! persisted.
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use sa_cache::{CacheEntry, ValidityCache};
//!
//! let cache: ValidityCache<String, u32> = ValidityCache::new();
//! let now = Utc::now();
//! cache.insert("urn:sp".to_string(), CacheEntry::new(7, Some(now + Duration::hours(1))));
//! assert_eq!(cache.get_valid("urn:sp", now), Some(7));
//! assert_eq!(cache.get_valid("urn:sp", now + Duration::hours(2)), None);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod validity;

pub use validity::{CacheEntry, ValidityCache};
