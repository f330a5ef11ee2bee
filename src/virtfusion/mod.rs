//! VirtFusion API interaction module
//!
//! This module provides the authenticated transport every resource adapter
//! talks through.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer token handling and environment variable names
//! - [`client`] - Main client: base URL rooted under `/api/v1`, token injection
//! - [`http`] - HTTP utilities returning raw status + body
//! - [`error`] - [`ApiError`], the fault taxonomy shared by all adapters
//!
//! # Example
//!
//! ```ignore
//! use virtfusion_provider::virtfusion::{auth::Credentials, client::{parse_endpoint, VirtFusionClient}};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let endpoint = parse_endpoint("cp.example.com").map_err(anyhow::Error::msg)?;
//!     let creds = Credentials::new("token").expect("valid token");
//!     let client = VirtFusionClient::new(&endpoint, creds, std::time::Duration::from_secs(30))?;
//!     let response = client.get("servers/1").await?;
//!     println!("{}", response.status);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;

pub use client::VirtFusionClient;
pub use error::ApiError;
