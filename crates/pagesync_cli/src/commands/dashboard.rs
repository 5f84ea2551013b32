//! Dashboard and salesmen lookup commands.

use super::{describe, CommandResult};
use pagesync_engine::{Dashboard, SalesmenByCity, Transport};
use pagesync_protocol::Period;
use std::io::Write;
use std::sync::Arc;

/// Prints the dashboard summary for `period`.
pub async fn run<T: Transport>(transport: Arc<T>, period: Period, out: &mut impl Write) -> CommandResult {
    let dashboard = Dashboard::new(transport);
    dashboard.set_period(period).await?;
    let data = dashboard.snapshot().value.unwrap_or_default();

    let stats = data.stats;
    writeln!(out, "Dashboard ({period})")?;
    writeln!(out, "  inquiries: {}", stats.total_inquiries)?;
    writeln!(out, "  clients:   {}", stats.total_clients)?;
    writeln!(out, "  salesmen:  {}", stats.total_salesmen)?;
    writeln!(out, "  areas:     {}", stats.total_areas)?;
    if !data.chart_data.inquiries.is_empty() {
        writeln!(out, "Inquiries per bucket:")?;
        for point in &data.chart_data.inquiries {
            writeln!(out, "  {:<12} {}", point.name, point.value)?;
        }
    }
    writeln!(out, "Recent inquiries:")?;
    if data.recent_inquiries.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for inquiry in &data.recent_inquiries {
        writeln!(out, "  {}", describe(inquiry))?;
    }
    Ok(())
}

/// Prints the salesmen working in `city`.
pub async fn salesmen<T: Transport>(transport: Arc<T>, city: &str, out: &mut impl Write) -> CommandResult {
    let lookup = SalesmenByCity::new(transport);
    lookup.fetch(city).await?;

    let salesmen = lookup.salesmen();
    writeln!(out, "{} salesmen in {}", salesmen.len(), city.trim())?;
    for salesman in &salesmen {
        writeln!(out, "  {}", describe(salesman))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesync_engine::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn prints_stats_for_period() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(json!({
            "stats": {"totalInquiries": 12, "totalClients": 40, "totalSalesmen": 6, "totalAreas": 9},
            "recentInquiries": [{"_id": "f1", "clientName": "Acme", "lead": "Red"}],
            "chartData": {"inquiries": [{"name": "Mon", "value": 3}]}
        }));
        let mut out = Vec::new();

        run(Arc::clone(&transport), Period::Week, &mut out).await.unwrap();
        assert_eq!(transport.calls()[0].to_string(), "GET dashboard?period=week");
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Dashboard (week)\n  inquiries: 12"));
        assert!(text.contains("Acme [Red]"));
        assert!(text.contains("Mon"));
    }

    #[tokio::test]
    async fn lists_salesmen_of_city() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(json!([{"_id": "u1", "name": "Ravi"}]));
        let mut out = Vec::new();

        salesmen(Arc::clone(&transport), "Pune", &mut out).await.unwrap();
        assert_eq!(transport.calls()[0].param("city"), Some("Pune"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("1 salesmen in Pune"));
        assert!(text.contains("Ravi"));
    }
}
