//! Windowed query pipeline
//!
//! One query resolves a requested [start, end) window into three adjacent
//! windows of equal length, filters the collection per window, and
//! produces per-type projections plus summary statistics:
//!
//! - [`endpoints`]: the window planner
//! - [`params`]: query parameters, built fresh per call
//! - [`executor`]: the orchestrator, [`DataSet`]
//! - [`result`]: the assembled, caller-owned result
//! - [`error`]: typed errors for structurally invalid calls

pub mod endpoints;
pub mod error;
pub mod executor;
pub mod params;
pub mod result;

pub use endpoints::{EndpointWindow, Endpoints};
pub use error::{QueryError, QueryResult};
pub use executor::DataSet;
pub use params::{Query, SortOrder, SortSpec, TypeQuery};
pub use result::{ProjectedRecord, QueryOutput, ResultData, WindowData};
