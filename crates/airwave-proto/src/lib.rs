//! Shared types for the airwave client: data model, configuration, platform
//! paths and the backend-as-a-service client.

pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod platform;
pub mod seed;
