//! Hosting platform access: check runs, pull requests and credentials.
//!
//! The core only talks to the platform through [`traits::HostingApi`] and
//! [`token::TokenProvider`], so both can be swapped for fakes in tests.

/// Connection settings for the hosting API.
pub mod config;

/// GitHub API client implementation.
pub mod github;

/// Request and response types shared by hosting API implementations.
pub mod request;

/// Installation token handling.
pub mod token;

/// Common traits for hosting platform abstraction.
pub mod traits;
