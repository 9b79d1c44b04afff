//! MRA Client
//!
//! Bearer-authenticated access to the Mobile Risk API: client-credentials
//! token exchange, cursor-paginated device listing and OS vulnerability
//! lookups, with fixed-delay retries for transport faults, 429 and 5xx.

pub mod client;
pub mod models;
pub mod token;

pub use client::{ClientConfig, DeviceSource, MraClient};
pub use models::{
    ApiDevice, ApiSoftware, DevicesResponse, TokenResponse, VulnerabilitiesResponse, Vulnerability,
};
pub use token::{AccessToken, TokenManager};
