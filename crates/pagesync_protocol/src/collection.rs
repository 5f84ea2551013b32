//! Collection descriptions and filter parameter mapping.

use crate::request::ApiRequest;
use crate::resource::ResourceId;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Filter value meaning "no filter". Never sent to the server.
pub const ALL_SENTINEL: &str = "all";

/// Logical filter keys a list query can carry.
///
/// Each collection maps the keys it supports to its own API parameter
/// names (see [`CollectionSpec`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKey {
    /// Owning salesman / user.
    Owner,
    /// Sales area.
    Area,
    /// Relative date range (`today`, `week`, `month`, ...).
    DateRange,
    /// Record status.
    Status,
    /// User role.
    Role,
    /// Active flag.
    Active,
}

impl FilterKey {
    /// All filter keys.
    pub const ALL: [FilterKey; 6] = [
        FilterKey::Owner,
        FilterKey::Area,
        FilterKey::DateRange,
        FilterKey::Status,
        FilterKey::Role,
        FilterKey::Active,
    ];

    /// Short name used in logs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            FilterKey::Owner => "owner",
            FilterKey::Area => "area",
            FilterKey::DateRange => "date-range",
            FilterKey::Status => "status",
            FilterKey::Role => "role",
            FilterKey::Active => "active",
        }
    }

    /// Parses a short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns true if a filter value means "no filter".
pub fn is_unfiltered(value: &str) -> bool {
    value.is_empty() || value == ALL_SENTINEL
}

/// Describes one API-backed resource collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    path: &'static str,
    label: &'static str,
    noun: &'static str,
    filter_params: Vec<(FilterKey, &'static str)>,
}

impl CollectionSpec {
    /// Creates a collection rooted at `path` with no filters.
    ///
    /// `label` and `noun` are the plural and singular nouns used in
    /// fallback error messages.
    pub fn new(path: &'static str, label: &'static str, noun: &'static str) -> Self {
        Self {
            path,
            label,
            noun,
            filter_params: Vec::new(),
        }
    }

    /// Maps a filter key to an API parameter name.
    pub fn with_filter(mut self, key: FilterKey, param: &'static str) -> Self {
        self.filter_params.retain(|(k, _)| *k != key);
        self.filter_params.push((key, param));
        self
    }

    /// Clients collection.
    pub fn clients() -> Self {
        Self::new("clients", "clients", "client")
            .with_filter(FilterKey::Area, "area")
            .with_filter(FilterKey::Status, "status")
    }

    /// Inquiries (feedback) collection.
    pub fn inquiries() -> Self {
        Self::new("feedback", "inquiries", "inquiry")
            .with_filter(FilterKey::Owner, "salesmanId")
            .with_filter(FilterKey::Area, "areaId")
            .with_filter(FilterKey::DateRange, "dateRange")
    }

    /// Notifications collection.
    pub fn notifications() -> Self {
        Self::new("notifications", "notifications", "notification")
    }

    /// Areas reference data.
    pub fn areas() -> Self {
        Self::new("areas", "areas", "area").with_filter(FilterKey::Active, "isActive")
    }

    /// Users reference data.
    pub fn users() -> Self {
        Self::new("users", "users", "user")
            .with_filter(FilterKey::Role, "role")
            .with_filter(FilterKey::Active, "isActive")
    }

    /// Path of the collection relative to the API base.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Plural noun for messages.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Singular noun for messages.
    pub fn noun(&self) -> &'static str {
        self.noun
    }

    /// API parameter name for a filter key, if this collection supports it.
    pub fn param_name(&self, key: FilterKey) -> Option<&'static str> {
        self.filter_params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, param)| *param)
    }

    /// Whether this collection supports a filter key.
    pub fn supports(&self, key: FilterKey) -> bool {
        self.param_name(key).is_some()
    }

    /// Path of one record.
    pub fn record_path(&self, id: &ResourceId) -> String {
        format!("{}/{}", self.path, id)
    }

    /// `GET <collection>?page&limit&search&<filters>`.
    ///
    /// Empty search terms, unfiltered values and unsupported keys are omitted.
    pub fn list_request(
        &self,
        page: u32,
        limit: u32,
        search: &str,
        filters: &BTreeMap<FilterKey, String>,
    ) -> ApiRequest {
        let req = ApiRequest::get(self.path)
            .with_param("page", page.to_string())
            .with_param("limit", limit.to_string());
        self.with_filter_params(req, search, filters)
    }

    /// `GET <collection>/export?<same filters>`.
    pub fn export_request(&self, search: &str, filters: &BTreeMap<FilterKey, String>) -> ApiRequest {
        let req = ApiRequest::get(format!("{}/export", self.path));
        self.with_filter_params(req, search, filters)
    }

    /// `POST <collection>`.
    pub fn create_request(&self, payload: Value) -> ApiRequest {
        ApiRequest::post(self.path, payload)
    }

    /// `PUT <collection>/<id>`.
    pub fn update_request(&self, id: &ResourceId, payload: Value) -> ApiRequest {
        ApiRequest::put(self.record_path(id), payload)
    }

    /// `DELETE <collection>/<id>`.
    pub fn delete_request(&self, id: &ResourceId) -> ApiRequest {
        ApiRequest::delete(self.record_path(id))
    }

    /// `PATCH <collection>/<id>/toggle-status`.
    pub fn toggle_status_request(&self, id: &ResourceId) -> ApiRequest {
        ApiRequest::patch(format!("{}/toggle-status", self.record_path(id)))
    }

    /// `PATCH <collection>/<id>/read`.
    pub fn mark_read_request(&self, id: &ResourceId) -> ApiRequest {
        ApiRequest::patch(format!("{}/read", self.record_path(id)))
    }

    /// `PATCH <collection>/read-all`.
    pub fn mark_all_read_request(&self) -> ApiRequest {
        ApiRequest::patch(format!("{}/read-all", self.path))
    }

    /// `GET <collection>/unread-count`.
    pub fn unread_count_request(&self) -> ApiRequest {
        ApiRequest::get(format!("{}/unread-count", self.path))
    }

    fn with_filter_params(
        &self,
        mut req: ApiRequest,
        search: &str,
        filters: &BTreeMap<FilterKey, String>,
    ) -> ApiRequest {
        if !search.is_empty() {
            req = req.with_param("search", search);
        }
        for (key, value) in filters {
            if is_unfiltered(value) {
                continue;
            }
            if let Some(param) = self.param_name(*key) {
                req = req.with_param(param, value.clone());
            }
        }
        req
    }
}
