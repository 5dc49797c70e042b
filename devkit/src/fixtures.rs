/*!
Builders for rack, device and relay fixtures

Short constructors for the shapes the Conch backend returns, so scenario
tests read as a description of the room rather than a pile of struct literals.
*/

use conch_rack::models::{
    DeviceLocation, DeviceSummary, Health, LocationDatacenter, LocationRack, Occupant, Rack, Relay,
    RelayLocation, Slot, SlotNumber, Workspace,
};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use time::OffsetDateTime;

pub struct RackBuilder {
    rack: Rack,
}

impl RackBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            rack: Rack {
                id: id.to_string(),
                name: id.to_uppercase(),
                role: None,
                datacenter: None,
                size: None,
                slots: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.rack.name = name.to_string();
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.rack.role = Some(role.to_string());
        self
    }

    pub fn datacenter(mut self, datacenter: &str) -> Self {
        self.rack.datacenter = Some(datacenter.to_string());
        self
    }

    pub fn empty_slots(mut self, numbers: RangeInclusive<SlotNumber>) -> Self {
        for n in numbers {
            self.rack.slots.insert(n, slot(n, Occupant::Empty));
        }
        self
    }

    pub fn occupied(mut self, number: SlotNumber, device: DeviceSummary) -> Self {
        self.rack.slots.insert(number, slot(number, Occupant::Occupied(device)));
        self
    }

    pub fn build(mut self) -> Rack {
        self.rack.size = self.rack.slots.keys().next_back().copied();
        self.rack
    }
}

fn slot(number: SlotNumber, occupant: Occupant) -> Slot {
    Slot {
        name: Some(format!("u{number}")),
        vendor: Some("generic".into()),
        size: Some(1),
        occupant,
    }
}

pub struct DeviceBuilder {
    device: DeviceSummary,
}

pub fn device(id: &str) -> DeviceBuilder {
    DeviceBuilder { device: DeviceSummary::new(id) }
}

impl DeviceBuilder {
    pub fn pass(mut self) -> Self {
        self.device.health = Some(Health::Pass);
        self
    }

    pub fn fail(mut self) -> Self {
        self.device.health = Some(Health::Fail);
        self
    }

    pub fn validated(mut self) -> Self {
        self.device.validated = true;
        self
    }

    pub fn asset_tag(mut self, tag: &str) -> Self {
        self.device.asset_tag = Some(tag.to_string());
        self
    }

    pub fn seen(mut self, at: OffsetDateTime) -> Self {
        self.device.last_seen = Some(at);
        self
    }

    pub fn build(self) -> DeviceSummary {
        self.device
    }
}

pub struct RelayBuilder {
    relay: Relay,
}

pub fn relay(id: &str) -> RelayBuilder {
    RelayBuilder {
        relay: Relay {
            id: id.to_string(),
            alias: None,
            ipaddr: None,
            version: None,
            updated: None,
            location: None,
            devices: Vec::new(),
        },
    }
}

impl RelayBuilder {
    pub fn alias(mut self, alias: &str) -> Self {
        self.relay.alias = Some(alias.to_string());
        self
    }

    pub fn at_rack(mut self, rack_id: &str) -> Self {
        self.relay.location = Some(RelayLocation {
            rack_id: rack_id.to_string(),
            room_name: None,
            rack_name: None,
            role_name: None,
        });
        self
    }

    pub fn updated(mut self, at: OffsetDateTime) -> Self {
        self.relay.updated = Some(at);
        self
    }

    pub fn build(self) -> Relay {
        self.relay
    }
}

pub fn workspace(id: &str, name: &str) -> Workspace {
    Workspace { id: id.to_string(), name: name.to_string(), role: None }
}

pub fn location(rack_id: &str, unit: SlotNumber) -> DeviceLocation {
    DeviceLocation {
        datacenter: Some(LocationDatacenter {
            id: None,
            name: Some("DC1".into()),
            region: None,
        }),
        rack: LocationRack {
            id: rack_id.to_string(),
            name: None,
            role: None,
            unit: Some(unit),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rack_builder_sets_size_from_top_slot() {
        let rack = RackBuilder::new("r1").empty_slots(1..=4).occupied(6, device("d6").build()).build();
        assert_eq!(rack.size, Some(6));
        assert_eq!(rack.slots.len(), 5);
        assert_eq!(rack.slot(6).unwrap().occupant.id(), Some("d6"));
        assert_eq!(rack.name, "R1");
    }

    #[test]
    fn test_relay_builder() {
        let r = relay("rel-1").alias("edge").at_rack("r1").build();
        assert_eq!(r.label(), "edge");
        assert_eq!(r.rack_id(), Some("r1"));
    }
}
