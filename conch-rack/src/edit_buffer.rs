//! Pending slot assignments typed by the user, layered over server occupancy.
//!
//! A slot is Clean (shows its occupant) until the user types into it, then
//! Dirty (shows the typed value) until a submit that captured that exact value
//! succeeds, or the rack is opened afresh. Reloads of the rack never touch
//! this buffer: it is keyed by slot number and read on top of whatever rack
//! the directory holds.

use crate::models::{Rack, Slot, SlotNumber};
use std::collections::{BTreeMap, BTreeSet};

/// Dirty values captured at the moment a submit was started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSnapshot {
    entries: BTreeMap<SlotNumber, String>,
}

impl EditSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps only the slots the submitted layout actually placed a device in.
    pub fn covering(mut self, covered: &BTreeSet<SlotNumber>) -> Self {
        self.entries.retain(|slot, _| covered.contains(slot));
        self
    }
}

#[derive(Debug, Default)]
pub struct SlotEditBuffer {
    pending: BTreeMap<SlotNumber, String>,
    highlight: Option<String>,
    seen: BTreeMap<SlotNumber, BTreeSet<String>>,
}

impl SlotEditBuffer {
    pub fn new(highlight: Option<String>) -> Self {
        Self {
            highlight: highlight.filter(|h| !h.is_empty()),
            ..Self::default()
        }
    }

    /// Any input event makes the slot Dirty; the last keystroke wins.
    pub fn input(&mut self, slot: SlotNumber, value: impl Into<String>) {
        self.pending.insert(slot, value.into());
    }

    pub fn pending(&self, slot: SlotNumber) -> Option<&str> {
        self.pending.get(&slot).map(String::as_str)
    }

    pub fn is_dirty(&self, slot: SlotNumber) -> bool {
        self.pending.contains_key(&slot)
    }

    pub fn dirty_slots(&self) -> Vec<SlotNumber> {
        self.pending.keys().copied().collect()
    }

    pub fn has_edits(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn discard(&mut self) {
        self.pending.clear();
        self.seen.clear();
    }

    /// Device a slot resolves to: the Dirty value if any (blank means none),
    /// otherwise the occupant.
    pub fn effective<'a>(&'a self, number: SlotNumber, slot: &'a Slot) -> Option<&'a str> {
        match self.pending.get(&number) {
            Some(value) => Some(value.trim()).filter(|v| !v.is_empty()),
            None => slot.occupant.id(),
        }
    }

    /// Text shown in the slot's input field.
    pub fn display_value(&self, number: SlotNumber, slot: &Slot) -> String {
        match self.pending.get(&number) {
            Some(value) => value.clone(),
            None => slot.occupant.id().unwrap_or_default().to_string(),
        }
    }

    pub fn snapshot(&self) -> EditSnapshot {
        EditSnapshot { entries: self.pending.clone() }
    }

    /// Clears entries a successful submit covered. An entry edited after the
    /// snapshot was taken stays Dirty. Returns how many slots went Clean.
    pub fn settle(&mut self, submitted: &EditSnapshot) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|slot, value| submitted.entries.get(slot).map(|v| v != value).unwrap_or(true));
        before - self.pending.len()
    }

    /// Records current occupants so highlighting survives a device moving out.
    pub fn observe(&mut self, rack: &Rack) {
        for (number, slot) in &rack.slots {
            if let Some(id) = slot.occupant.id() {
                self.seen.entry(*number).or_default().insert(id.to_string());
            }
        }
    }

    pub fn highlight(&self) -> Option<&str> {
        self.highlight.as_deref()
    }

    pub fn set_highlight(&mut self, device_id: Option<String>) {
        self.highlight = device_id.filter(|h| !h.is_empty());
    }

    /// True when the highlighted device occupies, or occupied, this slot.
    pub fn is_highlighted(&self, number: SlotNumber, slot: &Slot) -> bool {
        let Some(target) = self.highlight.as_deref() else {
            return false;
        };
        slot.occupant.id() == Some(target)
            || self.seen.get(&number).map(|ids| ids.contains(target)).unwrap_or(false)
    }
}

/// Slot whose input receives focus after Enter in `current`, in display order.
pub fn next_slot(rack: &Rack, current: SlotNumber) -> Option<SlotNumber> {
    rack.display_order()
        .map(|(n, _)| n)
        .skip_while(|n| *n != current)
        .nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceSummary, Occupant};

    fn occupied(id: &str) -> Slot {
        Slot {
            occupant: Occupant::Occupied(DeviceSummary::new(id)),
            ..Slot::default()
        }
    }

    fn rack(slots: Vec<(SlotNumber, Slot)>) -> Rack {
        Rack {
            id: "r1".into(),
            name: "A01".into(),
            role: None,
            datacenter: None,
            size: None,
            slots: slots.into_iter().collect(),
        }
    }

    #[test]
    fn test_dirty_value_overrides_occupant() {
        let slot = occupied("dev1");
        let mut buffer = SlotEditBuffer::default();
        assert_eq!(buffer.effective(1, &slot), Some("dev1"));
        assert_eq!(buffer.display_value(1, &slot), "dev1");

        buffer.input(1, "dev2");
        assert!(buffer.is_dirty(1));
        assert_eq!(buffer.effective(1, &slot), Some("dev2"));
        assert_eq!(buffer.display_value(1, &slot), "dev2");
    }

    #[test]
    fn test_blank_dirty_value_resolves_to_nothing() {
        let slot = occupied("dev1");
        let mut buffer = SlotEditBuffer::default();
        buffer.input(1, "  ");
        assert_eq!(buffer.effective(1, &slot), None);
        assert_eq!(buffer.display_value(1, &slot), "  ");
    }

    #[test]
    fn test_last_keystroke_wins() {
        let mut buffer = SlotEditBuffer::default();
        buffer.input(4, "d");
        buffer.input(4, "de");
        buffer.input(4, "dev");
        assert_eq!(buffer.pending(4), Some("dev"));
        assert_eq!(buffer.dirty_slots(), vec![4]);
    }

    #[test]
    fn test_settle_keeps_later_edits() {
        let mut buffer = SlotEditBuffer::default();
        buffer.input(1, "dev1");
        buffer.input(2, "dev2");
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);

        // edits arriving while the submit is in flight
        buffer.input(2, "dev2b");
        buffer.input(3, "dev3");

        assert_eq!(buffer.settle(&snapshot), 1);
        assert!(!buffer.is_dirty(1));
        assert_eq!(buffer.pending(2), Some("dev2b"));
        assert_eq!(buffer.pending(3), Some("dev3"));
    }

    #[test]
    fn test_settle_skips_slots_outside_the_payload() {
        let mut buffer = SlotEditBuffer::default();
        buffer.input(1, "");
        buffer.input(2, "dev5");
        buffer.input(3, "dev5");

        let covered: BTreeSet<SlotNumber> = [3].into_iter().collect();
        let snapshot = buffer.snapshot().covering(&covered);
        assert_eq!(snapshot.len(), 1);

        assert_eq!(buffer.settle(&snapshot), 1);
        assert_eq!(buffer.dirty_slots(), vec![1, 2]);
    }

    #[test]
    fn test_discard_cleans_everything() {
        let mut buffer = SlotEditBuffer::default();
        buffer.input(1, "x");
        buffer.discard();
        assert!(!buffer.has_edits());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_highlight_current_and_previous_occupant() {
        let mut buffer = SlotEditBuffer::new(Some("dev9".into()));
        let before = rack(vec![(1, occupied("dev9")), (2, Slot::default())]);
        buffer.observe(&before);
        assert!(buffer.is_highlighted(1, before.slot(1).unwrap()));
        assert!(!buffer.is_highlighted(2, before.slot(2).unwrap()));

        let after = rack(vec![(1, Slot::default()), (2, occupied("dev9"))]);
        buffer.observe(&after);
        assert!(buffer.is_highlighted(1, after.slot(1).unwrap()));
        assert!(buffer.is_highlighted(2, after.slot(2).unwrap()));
    }

    #[test]
    fn test_no_highlight_without_device() {
        let buffer = SlotEditBuffer::new(Some(String::new()));
        assert_eq!(buffer.highlight(), None);
        assert!(!buffer.is_highlighted(1, &occupied("dev1")));
    }

    #[test]
    fn test_next_slot_follows_display_order() {
        let r = rack(vec![(1, Slot::default()), (2, Slot::default()), (5, Slot::default())]);
        assert_eq!(next_slot(&r, 5), Some(2));
        assert_eq!(next_slot(&r, 2), Some(1));
        assert_eq!(next_slot(&r, 1), None);
        assert_eq!(next_slot(&r, 42), None);
    }
}
