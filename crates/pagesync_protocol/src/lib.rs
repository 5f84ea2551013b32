//! # pagesync Protocol
//!
//! Wire types for the CRM console API consumed by the pagesync engine.
//!
//! This crate provides:
//! - `Resource` and `ResourceId` for opaque API records
//! - `PageResponse`, `UnreadCount` and single-record envelope decoding
//! - `ApiRequest` for the (method, path, params, body) tuple handed to a transport
//! - `CollectionSpec` and `FilterKey` mapping logical filters to API parameters
//! - `DashboardData`, `SalesmanAreas` and record-list decoding for
//!   non-paginated lookups
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod collection;
mod error;
mod lookup;
mod page;
mod request;
mod resource;

pub use collection::{is_unfiltered, CollectionSpec, FilterKey, ALL_SENTINEL};
pub use error::{ProtocolError, ProtocolResult};
pub use lookup::{
    decode_record_list, salesmen_by_city_request, ChartData, ChartPoint, DashboardData,
    DashboardStats, Period, SalesmanAreas,
};
pub use page::{decode_record, ErrorBody, PageResponse, UnreadCount};
pub use request::{ApiRequest, Method};
pub use resource::{Lead, Resource, ResourceId};
