//! HTTP request handlers.
//!
//! - [`buckets`]: bucket creation
//! - [`objects`]: presigned upload URLs and existence checks
//! - [`uploads`]: batch upload through the service
//! - [`root`]: redirect from `/` to the documentation
//!
//! Handlers return [`crate::errors::Error`], which converts into the matching status code and a
//! JSON `{"message": ...}` body.

pub mod buckets;
pub mod objects;
pub mod root;
pub mod uploads;
