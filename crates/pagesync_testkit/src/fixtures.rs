//! Resource fixtures and list body builders.

use pagesync_protocol::{Lead, Resource};
use serde_json::{json, Value};

fn resource(value: Value) -> Resource {
    match Resource::from_value(value) {
        Ok(resource) => resource,
        Err(e) => panic!("fixture is not a valid resource: {e}"),
    }
}

/// A client record.
pub fn client(id: &str, name: &str) -> Resource {
    resource(json!({
        "_id": id,
        "name": name,
        "phone": format!("555-{id}"),
        "isActive": true,
    }))
}

/// An inquiry (feedback) record.
pub fn inquiry(id: &str, lead: Lead, with_audio: bool) -> Resource {
    let audio = if with_audio {
        json!({"key": format!("audio/{id}.mp3")})
    } else {
        Value::Null
    };
    resource(json!({
        "_id": id,
        "lead": lead.label(),
        "audio": audio,
    }))
}

/// A notification record.
pub fn notification(id: &str, read: bool) -> Resource {
    resource(json!({
        "_id": id,
        "message": format!("notification {id}"),
        "isRead": read,
    }))
}

/// An area record.
pub fn area(id: &str, name: &str, city: &str, state: &str, active: bool) -> Resource {
    resource(json!({
        "_id": id,
        "name": name,
        "city": city,
        "state": state,
        "isActive": active,
    }))
}

/// A list response body with explicit pagination.
pub fn page_body(items: &[Resource], current_page: u32, total_pages: u32, total: u64) -> Value {
    let items: Vec<Value> = items.iter().cloned().map(Value::from).collect();
    json!({
        "items": items,
        "currentPage": current_page,
        "totalPages": total_pages,
        "total": total,
    })
}

/// Clients `client-<n>` numbered from 1, `count` of them.
pub fn numbered_clients(count: usize) -> Vec<Resource> {
    (1..=count)
        .map(|n| client(&format!("client-{n}"), &format!("Client {n}")))
        .collect()
}

/// Body of page `page` of a client collection holding `total` records,
/// sliced the way the server would slice it.
pub fn clients_page(page: u32, page_size: u32, total: u64) -> Value {
    let size = u64::from(page_size.max(1));
    let total_pages = total.div_ceil(size).max(1) as u32;
    let start = u64::from(page.max(1) - 1) * size;
    let end = (start + size).min(total);
    let items: Vec<Resource> = (start..end)
        .map(|n| client(&format!("client-{}", n + 1), &format!("Client {}", n + 1)))
        .collect();
    page_body(&items, page, total_pages, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesync_protocol::PageResponse;

    #[test]
    fn clients_page_slices() {
        let body = clients_page(3, 20, 45).to_string();
        let page = PageResponse::decode(body.as_bytes()).unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].id().as_str(), "client-41");
    }

    #[test]
    fn fixtures_expose_engine_fields() {
        assert!(inquiry("f1", Lead::Red, true).has_audio());
        assert!(!inquiry("f2", Lead::Green, false).has_audio());
        assert!(notification("n1", true).is_read());
        assert!(!area("a1", "Harbor", "Mumbai", "MH", false).is_active());
        assert_eq!(numbered_clients(3).len(), 3);
    }
}
