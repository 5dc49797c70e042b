//! Plain-text tables for the console.

use conch_rack::models::Relay;
use conch_rack::submit::SubmitReport;
use conch_rack::view::{AssetTagCell, RackLayout};
use conch_rack::RoomListing;
use std::fmt::Write;

pub fn rooms(listing: &[RoomListing]) -> String {
    let mut out = String::new();
    for room in listing {
        let _ = writeln!(out, "{}", room.room);
        for rack in &room.racks {
            let marker = if rack.active { "*" } else { " " };
            let _ = writeln!(
                out,
                "  {marker} {:<12} {:<10} {:>4}  {}",
                rack.name,
                rack.role.as_deref().unwrap_or("-"),
                rack.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                rack.id
            );
        }
    }
    out
}

pub fn layout(layout: &RackLayout) -> String {
    let mut out = String::new();
    let h = &layout.header;
    let _ = writeln!(
        out,
        "{} / {} ({})",
        h.datacenter.as_deref().unwrap_or("-"),
        h.name,
        h.role.as_deref().unwrap_or("-")
    );
    if let Some(relay) = &h.relay {
        let _ = writeln!(out, "relay: {} ({})", relay.label, relay.href());
    }
    if layout.assign_success {
        let _ = writeln!(out, "devices assigned");
    }

    for row in &layout.rows {
        let status = row
            .status
            .map(|s| format!("{}{}", s.health, if s.reporting { "" } else { " (silent)" }))
            .unwrap_or_default();
        let device = if row.device_input.is_empty() {
            row.placeholder.unwrap_or_default().to_string()
        } else {
            row.device_input.clone()
        };
        let tag = match &row.asset_tag {
            AssetTagCell::Tag(tag) => tag.clone().unwrap_or_default(),
            AssetTagCell::Disabled => String::new(),
        };
        let mark = match (row.highlighted, row.dirty) {
            (true, _) => ">",
            (false, true) => "~",
            (false, false) => " ",
        };
        let _ = writeln!(
            out,
            "{mark}{:>3}  {:<10} {:<10} {:<20} {:<18} {}",
            row.slot,
            row.name.as_deref().unwrap_or(""),
            row.vendor.as_deref().unwrap_or(""),
            device,
            status,
            tag
        );
    }
    out
}

pub fn relays(relays: &[Relay]) -> String {
    let mut out = String::new();
    for relay in relays {
        let _ = writeln!(
            out,
            "{:<20} {:<16} {:<10} {}",
            relay.label(),
            relay.ipaddr.as_deref().unwrap_or("-"),
            relay.version.as_deref().unwrap_or("-"),
            relay.rack_id().unwrap_or("-")
        );
    }
    out
}

pub fn submit(report: &SubmitReport) -> String {
    let mut out = format!(
        "submitted {} assignments, {} edits settled",
        report.layout.len(),
        report.settled
    );
    if !report.cleared_slots.is_empty() {
        let _ = write!(out, "; slots {:?} left as they were (no unassign)", report.cleared_slots);
    }
    if !report.reloaded {
        out.push_str("; rack not reloaded");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conch_rack::dashboard::RackListItem;

    #[test]
    fn test_rooms_marks_active_rack() {
        let listing = vec![RoomListing {
            room: "Room 1".into(),
            racks: vec![
                RackListItem { id: "r1".into(), name: "A01".into(), role: None, size: Some(42), active: true },
                RackListItem { id: "r2".into(), name: "A02".into(), role: None, size: None, active: false },
            ],
        }];
        let text = rooms(&listing);
        assert!(text.contains("* A01"));
        assert!(text.contains("  A02"));
        assert!(text.lines().next() == Some("Room 1"));
    }

    #[test]
    fn test_submit_summary_mentions_cleared_slots() {
        let report = SubmitReport {
            layout: Default::default(),
            cleared_slots: vec![4],
            settled: 1,
            reloaded: true,
        };
        assert!(submit(&report).contains("[4]"));
    }
}
