/**
 * RELAY OVERLAY - Which relay, if any, is active in a rack
 *
 * ROLE: Holds the active relay list (and the full list for the relay pages)
 * and answers `relay_for(rack_id)`. The association is computed on demand by
 * matching `location.rack_id`; nothing is stored on the Rack itself.
 *
 * ORDER: lists are kept in natural alias order, so "PRD2" precedes "PRD10".
 */

use crate::api::ConchApi;
use crate::error::Result;
use crate::models::Relay;
use crate::state::{new_state, Shared};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Compares the alphabetic characters lexically, then the digits as an integer.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let alpha = |s: &str| s.chars().filter(|c| c.is_ascii_alphabetic()).collect::<String>();
    // digit runs that overflow u128 compare as None
    let number = |s: &str| {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse::<u128>().ok()
    };

    alpha(a)
        .cmp(&alpha(b))
        .then_with(|| number(a).cmp(&number(b)))
        .then_with(|| a.cmp(b))
}

pub fn sort_relays(relays: &mut [Relay]) {
    relays.sort_by(|a, b| natural_cmp(a.label(), b.label()));
}

/// Most recently updated relay claiming `rack_id`; ties go to the earlier one in `relays`.
pub fn relay_for<'a>(relays: &'a [Relay], rack_id: &str) -> Option<&'a Relay> {
    relays
        .iter()
        .filter(|r| r.rack_id() == Some(rack_id))
        .fold(None, |best: Option<&Relay>, candidate| match best {
            Some(best) if candidate.updated <= best.updated => Some(best),
            _ => Some(candidate),
        })
}

#[derive(Debug, Default)]
struct RelayState {
    active: Vec<Relay>,
}

pub struct RelayOverlay {
    api: Arc<dyn ConchApi>,
    workspace: String,
    state: Shared<RelayState>,
}

impl RelayOverlay {
    pub fn new(api: Arc<dyn ConchApi>, workspace: impl Into<String>) -> Self {
        Self {
            api,
            workspace: workspace.into(),
            state: new_state(RelayState::default()),
        }
    }

    pub async fn load_active_relays(&self) -> Result<Vec<Relay>> {
        let mut relays = self.fetch(true).await?;
        sort_relays(&mut relays);
        info!(count = relays.len(), "loaded active relays");
        self.state.lock().active = relays.clone();
        Ok(relays)
    }

    /// Every relay in the workspace, active or not. Not kept in the overlay.
    pub async fn load_relays(&self) -> Result<Vec<Relay>> {
        let mut relays = self.fetch(false).await?;
        sort_relays(&mut relays);
        Ok(relays)
    }

    async fn fetch(&self, active_only: bool) -> Result<Vec<Relay>> {
        self.api.relays(&self.workspace, active_only).await.inspect_err(|e| {
            if !e.is_unauthorized() {
                warn!(error = %e, active_only, "failed to load relays, keeping previous list");
            }
        })
    }

    pub fn active(&self) -> Vec<Relay> {
        self.state.lock().active.clone()
    }

    pub fn relay_for(&self, rack_id: &str) -> Option<Relay> {
        relay_for(&self.state.lock().active, rack_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelayLocation;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn relay(id: &str, alias: Option<&str>) -> Relay {
        Relay {
            id: id.into(),
            alias: alias.map(String::from),
            ipaddr: None,
            version: None,
            updated: None,
            location: None,
            devices: vec![],
        }
    }

    fn located(id: &str, rack: &str, updated: Option<OffsetDateTime>) -> Relay {
        Relay {
            updated,
            location: Some(RelayLocation {
                rack_id: rack.into(),
                room_name: None,
                rack_name: None,
                role_name: None,
            }),
            ..relay(id, None)
        }
    }

    #[test]
    fn test_natural_alias_order() {
        let mut relays = vec![relay("a", Some("PRD2")), relay("b", Some("PRD10")), relay("c", Some("PRD1"))];
        sort_relays(&mut relays);
        let labels: Vec<&str> = relays.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["PRD1", "PRD2", "PRD10"]);
    }

    #[test]
    fn test_alphabetic_part_decides_first() {
        assert_eq!(natural_cmp("ABC9", "ABD1"), Ordering::Less);
        assert_eq!(natural_cmp("PRD", "PRD1"), Ordering::Less);
        assert_eq!(natural_cmp("PRD-2", "PRD2"), Ordering::Less);
        assert_eq!(natural_cmp("PRD2", "PRD2"), Ordering::Equal);
    }

    #[test]
    fn test_relays_without_alias_sort_by_id() {
        let mut relays = vec![relay("R10", None), relay("R9", Some("")), relay("Q1", None)];
        sort_relays(&mut relays);
        let ids: Vec<&str> = relays.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Q1", "R9", "R10"]);
    }

    #[test]
    fn test_relay_for_prefers_most_recent_update() {
        let relays = vec![
            located("old", "rack-1", Some(datetime!(2024-01-01 0:00 UTC))),
            located("other", "rack-2", Some(datetime!(2024-06-01 0:00 UTC))),
            located("new", "rack-1", Some(datetime!(2024-03-01 0:00 UTC))),
            located("never", "rack-1", None),
        ];
        assert_eq!(relay_for(&relays, "rack-1").unwrap().id, "new");
        assert_eq!(relay_for(&relays, "rack-2").unwrap().id, "other");
        assert!(relay_for(&relays, "rack-3").is_none());
    }

    #[test]
    fn test_relay_for_tie_keeps_list_order() {
        let relays = vec![located("first", "rack-1", None), located("second", "rack-1", None)];
        assert_eq!(relay_for(&relays, "rack-1").unwrap().id, "first");
    }
}
