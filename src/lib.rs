//! # Hoist - Single-Host AWS Deployment
//!
//! Hoist provisions one public web host on AWS and hands in-instance setup
//! to an external playbook runner (`ansible-playbook`). The resource list is
//! fixed: a security group, a read-only IAM user with an access key, a
//! private S3 bucket holding the website page, an imported SSH key pair, an
//! EC2 instance, and an Elastic IP. The literal values behind each resource
//! (CIDR blocks, AMI filter, instance type, bucket name, the playbook
//! invocation) live in a layered TOML configuration.
//!
//! ## Core Concepts
//!
//! - **Stack**: the fixed, ordered list of resource steps; `up` walks it
//!   forward, `destroy` walks it backward
//! - **Ensure operations**: every resource is looked up by name before it is
//!   created, so reruns converge without a local state store
//! - **Outputs**: a successful run publishes the public address and the
//!   access-credential pair, persisted to `.hoist/outputs.json`
//! - **Handoff**: in-instance configuration belongs to the playbook runner;
//!   Hoist only renders and launches the invocation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI Interface                          │
//! │          (up / preview / destroy / outputs / validate)       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Stack                               │
//! │        (linear resource walk, first failure aborts)          │
//! └─────────────────────────────────────────────────────────────┘
//!            │                  │                  │
//!            ▼                  ▼                  ▼
//! ┌────────────────┐  ┌────────────────┐  ┌────────────────────┐
//! │   EC2 client   │  │  IAM client    │  │     S3 client      │
//! │ (group, keys,  │  │ (user, access  │  │ (bucket, website   │
//! │  instance, IP) │  │  key, policy)  │  │     object)        │
//! └────────────────┘  └────────────────┘  └────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ansible-playbook handoff                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use hoist::config::DeployConfig;
//! use hoist::stack::{Stack, UpOptions};
//!
//! #[tokio::main]
//! async fn main() -> hoist::error::Result<()> {
//!     let config = DeployConfig::load(None)?;
//!     config.validate()?;
//!
//!     let stack = Stack::connect(config).await;
//!     if let Some(outputs) = stack.up(UpOptions::default()).await? {
//!         outputs.print_human(false);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod aws;
pub mod config;
pub mod error;
pub mod output;
pub mod outputs;
pub mod playbook;
pub mod stack;

pub use config::DeployConfig;
pub use error::{Error, Result};
pub use outputs::StackOutputs;
pub use stack::{Stack, UpOptions};
