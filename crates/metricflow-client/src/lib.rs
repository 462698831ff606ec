//! MetricFlow Client SDK.
//!
//! This crate provides a client library for tracked applications to send
//! events to the MetricFlow ingestion API.
//!
//! # Example
//!
//! ```no_run
//! use metricflow_client::{EventType, MetricflowClient, TrackEvent};
//!
//! # async fn example() -> Result<(), metricflow_client::ClientError> {
//! let client = MetricflowClient::new("https://metricflow.example.com", "mk_live_...")?;
//!
//! let projects = client.list_projects().await?;
//! let event = client
//!     .track(
//!         TrackEvent::new("checkout", EventType::Purchase, projects[0].project.id)
//!             .revenue(49.0)
//!             .property("plan", "pro"),
//!     )
//!     .await?;
//!
//! println!("Recorded {} at {}", event.id, event.timestamp);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, MetricflowClient};
pub use error::ClientError;
pub use metricflow_core::{Event, EventId, EventType, ProjectId, ProjectSummary};
pub use types::*;
