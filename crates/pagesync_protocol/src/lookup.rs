//! Non-paginated lookups: dashboard summary and salesman reference data.

use crate::error::{ProtocolError, ProtocolResult};
use crate::request::ApiRequest;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Keys under which a bare record list may be wrapped.
const LIST_ENVELOPES: &[&str] = &["data", "salesmen", "users", "items"];

/// Time window of the dashboard inquiry chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Today.
    Day,
    /// The last seven days.
    Week,
    /// The last month.
    #[default]
    Month,
}

impl Period {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(ProtocolError::invalid_field(
                "period",
                format!("expected day, week or month, got {other:?}"),
            )),
        }
    }
}

/// Headline counters of the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    /// Inquiries in the selected period.
    pub total_inquiries: u64,
    /// Registered clients.
    pub total_clients: u64,
    /// Salesmen accounts.
    pub total_salesmen: u64,
    /// Configured areas.
    pub total_areas: u64,
}

/// One bar of the inquiry chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Bucket label.
    pub name: String,
    /// Bucket value.
    #[serde(default)]
    pub value: f64,
}

/// Chart series of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartData {
    /// Inquiries per bucket of the selected period.
    pub inquiries: Vec<ChartPoint>,
}

/// Body of `GET dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardData {
    /// Headline counters.
    pub stats: DashboardStats,
    /// Latest inquiries, newest first.
    pub recent_inquiries: Vec<Resource>,
    /// Chart series.
    pub chart_data: ChartData,
}

impl DashboardData {
    /// Decodes a dashboard body. The payload may be wrapped under `data`.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let inner = match value {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                map.remove("data").unwrap_or_default()
            }
            other => other,
        };
        Ok(serde_json::from_value(inner)?)
    }

    /// `GET dashboard?period=<period>`.
    pub fn request(period: Period) -> ApiRequest {
        ApiRequest::get("dashboard").with_param("period", period.as_str())
    }
}

/// Body of `GET clients/salesman/areas`: the areas a salesman can pick
/// from, plus the salesman's own area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesmanAreas {
    /// Areas in the salesman's city.
    pub areas: Vec<Resource>,
    /// The salesman's assigned area, as the server sent it.
    pub salesman_area: Option<Value>,
}

impl SalesmanAreas {
    /// Decodes the body.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// `GET clients/salesman/areas`.
    pub fn request() -> ApiRequest {
        ApiRequest::get("clients/salesman/areas")
    }
}

/// `GET clients/salesmen/by-city?city=<city>`.
pub fn salesmen_by_city_request(city: &str) -> ApiRequest {
    ApiRequest::get("clients/salesmen/by-city").with_param("city", city)
}

/// Decodes a list of records sent bare or under a known envelope.
pub fn decode_record_list(bytes: &[u8]) -> ProtocolResult<Vec<Resource>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => LIST_ENVELOPES
            .iter()
            .find_map(|key| map.remove(*key).filter(Value::is_array))
            .ok_or_else(|| ProtocolError::Decode("no record list in response".into()))?,
        _ => return Err(ProtocolError::Decode("record list is not a JSON array".into())),
    };
    Ok(serde_json::from_value(list)?)
}
