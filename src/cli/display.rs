use chrono::{DateTime, Local, Utc};

use crate::models::ContactRecord;

/// Render a record with clean formatting (only non-empty fields)
pub fn format_contact(record: &ContactRecord) -> String {
    let mut lines = Vec::new();

    // Header - title and id
    lines.push(format!("{}  [{}]", record.title(), record.short_id()));

    let full_name = record.name().full_name();
    if !full_name.is_empty() && full_name != record.title() {
        lines.push(format!("  ({})", full_name));
    }
    lines.push(String::new());

    for org in record.organization_names().filter(|o| !o.is_empty()) {
        lines.push(format!("  {}", org));
    }

    for email in record.emails() {
        lines.push(format!("  {}{}", email.address, tag(email.relation.as_ref().map(|r| r.as_str()), email.is_primary)));
    }

    for phone in record.phones() {
        lines.push(format!("  {}{}", phone.number, tag(phone.relation.as_ref().map(|r| r.as_str()), phone.is_primary)));
    }

    for im in record.im_handles() {
        let protocol = im.protocol.rsplit('#').next().unwrap_or(&im.protocol);
        lines.push(format!("  {} ({})", im.address, protocol.to_lowercase()));
    }

    // Addresses - city, region only for brevity
    for addr in record.addresses() {
        if let Some(loc) = addr.city_region().or_else(|| addr.formatted.clone()) {
            lines.push(format!("  {}", loc));
        }
    }

    // Notes (truncated)
    if let Some(note) = record.note() {
        let truncated = if note.chars().count() > 60 {
            let text: String = note.chars().take(59).collect();
            format!("{}…", text.trim_end())
        } else {
            note.to_string()
        };
        lines.push(format!("  {}", truncated));
    }

    lines.push(format!("\n  updated {}", format_updated(&record.updated_at())));
    lines.join("\n")
}

pub fn print_full_contact(record: &ContactRecord) {
    println!("{}", format_contact(record));
}

fn tag(relation: Option<&str>, primary: bool) -> String {
    match (relation, primary) {
        (Some(r), true) => format!(" ({}, primary)", r),
        (Some(r), false) => format!(" ({})", r),
        (None, true) => " (primary)".to_string(),
        (None, false) => String::new(),
    }
}

fn format_updated(updated: &DateTime<Utc>) -> String {
    updated.with_timezone(&Local).format("%b %-d, %Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::default_home_domains;

    #[test]
    fn shows_only_present_fields() {
        let mut record = ContactRecord::new("base/abc", "Jane Doe");
        record.set_organization("CEO at Acme");
        record.set_email("jane@acme.com", &default_home_domains());

        let text = format_contact(&record);
        assert!(text.starts_with("Jane Doe  [abc]"));
        assert!(text.contains("  CEO at Acme"));
        assert!(text.contains("  jane@acme.com (work, primary)"));
        assert!(!text.contains("()"));
    }

    #[test]
    fn long_notes_are_truncated() {
        let mut record = ContactRecord::new("x", "Note Taker");
        record.set_note(Some("a".repeat(100)));

        let text = format_contact(&record);
        assert!(text.contains('…'));
        assert!(!text.contains(&"a".repeat(60)));
    }
}
