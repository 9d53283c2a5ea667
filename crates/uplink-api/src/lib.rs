//! Uplink API Library
//!
//! HTTP surface for the resumable upload service. Modules are public so
//! integration tests can assemble the router against in-process
//! collaborators.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod quota;
pub mod services;
pub mod setup;
pub mod state;
