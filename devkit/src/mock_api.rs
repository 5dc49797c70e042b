/*!
Mock Conch backend for tests without a server

Implements `ConchApi` over in-memory racks, relays and devices. Every call is
recorded, failures can be queued per endpoint, and a call can be *held*: its
response waits until the test releases it, which is how out-of-order
responses are reproduced deterministically.
*/

use async_trait::async_trait;
use conch_rack::models::{
    Assignments, DeviceLocation, DeviceSummary, Feedback, Occupant, Rack, RackSummary, Relay, RoomIndex,
    Workspace,
};
use conch_rack::{ConchApi, ConchError, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Me,
    Login,
    Logout,
    Workspaces,
    Rooms,
    Rack(String),
    Layout(String),
    ActiveRelays,
    AllRelays,
    Location(String),
    Feedback,
}

impl Endpoint {
    fn requires_session(&self) -> bool {
        !matches!(self, Endpoint::Login)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: Endpoint,
    pub body: Option<Value>,
}

/// Canned failure returned by the next call to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Unauthorized,
    NotFound,
    Conflict,
    Status(u16),
}

impl MockFailure {
    fn into_error(self, endpoint: &Endpoint) -> ConchError {
        let what = format!("{endpoint:?}");
        match self {
            MockFailure::Unauthorized => ConchError::Unauthorized,
            MockFailure::NotFound => ConchError::NotFound(what),
            MockFailure::Conflict => ConchError::Conflict(what),
            MockFailure::Status(status) => ConchError::Status { status, url: what },
        }
    }
}

/// Releases one held call. Dropping it releases the call too.
pub struct Hold {
    sender: Option<oneshot::Sender<()>>,
}

impl Hold {
    pub fn release(mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

#[derive(Default)]
struct MockState {
    session: bool,
    users: HashMap<String, String>,
    workspaces: Vec<Workspace>,
    rooms: RoomIndex,
    racks: HashMap<String, Rack>,
    devices: HashMap<String, DeviceSummary>,
    relays: Vec<Relay>,
    locations: HashMap<String, DeviceLocation>,
    failures: HashMap<Endpoint, VecDeque<MockFailure>>,
    holds: HashMap<Endpoint, VecDeque<oneshot::Receiver<()>>>,
    requests: Vec<RecordedRequest>,
    layouts: Vec<(String, Assignments)>,
    feedback: Vec<Feedback>,
}

#[derive(Clone)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Logged in, one `GLOBAL` workspace, no racks.
    pub fn new() -> Self {
        let state = MockState {
            session: true,
            workspaces: vec![Workspace { id: "ws-global".into(), name: "GLOBAL".into(), role: None }],
            ..MockState::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn logged_out(self) -> Self {
        self.state.lock().unwrap().session = false;
        self
    }

    pub fn with_user(self, user: &str, password: &str) -> Self {
        self.state.lock().unwrap().users.insert(user.into(), password.into());
        self
    }

    pub fn with_workspaces(self, workspaces: Vec<Workspace>) -> Self {
        self.state.lock().unwrap().workspaces = workspaces;
        self
    }

    /// Adds the rack and lists it under `room`.
    pub fn with_rack(self, room: &str, rack: Rack) -> Self {
        self.put_rack(room, rack);
        self
    }

    pub fn with_device(self, device: DeviceSummary) -> Self {
        self.state.lock().unwrap().devices.insert(device.id.clone(), device);
        self
    }

    pub fn with_relay(self, relay: Relay) -> Self {
        self.state.lock().unwrap().relays.push(relay);
        self
    }

    pub fn with_location(self, device_id: &str, location: DeviceLocation) -> Self {
        self.state.lock().unwrap().locations.insert(device_id.into(), location);
        self
    }

    /// Replaces (or adds) a rack, as if someone changed it server-side.
    pub fn put_rack(&self, room: &str, rack: Rack) {
        let mut st = self.state.lock().unwrap();
        let summary = RackSummary {
            id: rack.id.clone(),
            name: rack.name.clone(),
            role: rack.role.clone(),
            size: rack.size,
        };
        let listed = st.rooms.entry(room.to_string()).or_default();
        listed.retain(|r| r.id != summary.id);
        listed.push(summary);
        st.racks.insert(rack.id.clone(), rack);
    }

    pub fn set_session(&self, valid: bool) {
        self.state.lock().unwrap().session = valid;
    }

    pub fn fail_next(&self, endpoint: Endpoint, failure: MockFailure) {
        self.state.lock().unwrap().failures.entry(endpoint).or_default().push_back(failure);
    }

    /// The next call to `endpoint` waits until the returned hold is released.
    pub fn hold(&self, endpoint: Endpoint) -> Hold {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().unwrap().holds.entry(endpoint).or_default().push_back(receiver);
        Hold { sender: Some(sender) }
    }

    pub fn verify_user(&self, user: &str, password: &str) -> bool {
        self.state.lock().unwrap().users.get(user).map(|p| p == password).unwrap_or(false)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, endpoint: &Endpoint) -> usize {
        self.state.lock().unwrap().requests.iter().filter(|r| &r.endpoint == endpoint).count()
    }

    /// Layout POSTs that succeeded, in order.
    pub fn submitted_layouts(&self) -> Vec<(String, Assignments)> {
        self.state.lock().unwrap().layouts.clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.state.lock().unwrap().feedback.clone()
    }

    pub fn rack_snapshot(&self, rack_id: &str) -> Option<Rack> {
        self.state.lock().unwrap().racks.get(rack_id).cloned()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    /// Records the call, waits on a hold if one is queued, then applies
    /// session and queued failures.
    async fn enter(&self, endpoint: Endpoint, body: Option<Value>) -> Result<()> {
        let hold = {
            let mut st = self.state.lock().unwrap();
            st.requests.push(RecordedRequest { endpoint: endpoint.clone(), body });
            st.holds.get_mut(&endpoint).and_then(|q| q.pop_front())
        };
        if let Some(receiver) = hold {
            log::debug!("[mock] holding {:?}", endpoint);
            let _ = receiver.await;
            log::debug!("[mock] released {:?}", endpoint);
        }

        let mut st = self.state.lock().unwrap();
        if let Some(failure) = st.failures.get_mut(&endpoint).and_then(|q| q.pop_front()) {
            log::info!("[mock] {:?} fails with {:?}", endpoint, failure);
            return Err(failure.into_error(&endpoint));
        }
        if endpoint.requires_session() && !st.session {
            return Err(ConchError::Unauthorized);
        }
        Ok(())
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves devices named in `layout` into their slots; unnamed occupants stay put.
fn apply_layout(rack: &mut Rack, layout: &Assignments, devices: &HashMap<String, DeviceSummary>) -> Result<()> {
    if let Some((_, missing)) = layout.iter().find(|(_, n)| !rack.slots.contains_key(n)) {
        return Err(ConchError::Status { status: 400, url: format!("slot {missing} not in rack {}", rack.id) });
    }

    let mut moved: HashMap<String, DeviceSummary> = HashMap::new();
    for slot in rack.slots.values_mut() {
        if let Occupant::Occupied(device) = &slot.occupant {
            if layout.contains_key(&device.id) {
                moved.insert(device.id.clone(), device.clone());
                slot.occupant = Occupant::Empty;
            }
        }
    }
    for (device_id, number) in layout {
        let device = moved
            .remove(device_id)
            .or_else(|| devices.get(device_id).cloned())
            .unwrap_or_else(|| DeviceSummary::new(device_id.clone()));
        if let Some(slot) = rack.slots.get_mut(number) {
            slot.occupant = Occupant::Occupied(device);
        }
    }
    Ok(())
}

#[async_trait]
impl ConchApi for MockApi {
    async fn me(&self) -> Result<()> {
        self.enter(Endpoint::Me, None).await
    }

    async fn login(&self, user: &str, password: &str) -> Result<bool> {
        self.enter(Endpoint::Login, Some(serde_json::json!({ "user": user }))).await?;
        let ok = self.verify_user(user, password);
        if ok {
            self.set_session(true);
        }
        Ok(ok)
    }

    async fn logout(&self) -> Result<()> {
        self.enter(Endpoint::Logout, None).await?;
        self.set_session(false);
        Ok(())
    }

    async fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.enter(Endpoint::Workspaces, None).await?;
        Ok(self.state.lock().unwrap().workspaces.clone())
    }

    async fn rack_rooms(&self, _workspace: &str) -> Result<RoomIndex> {
        self.enter(Endpoint::Rooms, None).await?;
        Ok(self.state.lock().unwrap().rooms.clone())
    }

    async fn rack(&self, _workspace: &str, rack_id: &str) -> Result<Rack> {
        self.enter(Endpoint::Rack(rack_id.into()), None).await?;
        self.state
            .lock()
            .unwrap()
            .racks
            .get(rack_id)
            .cloned()
            .ok_or_else(|| ConchError::NotFound(format!("rack {rack_id}")))
    }

    async fn assign_layout(&self, _workspace: &str, rack_id: &str, layout: &Assignments) -> Result<()> {
        let body = serde_json::to_value(layout)?;
        self.enter(Endpoint::Layout(rack_id.into()), Some(body)).await?;

        let mut st = self.state.lock().unwrap();
        let st = &mut *st;
        let rack = st
            .racks
            .get_mut(rack_id)
            .ok_or_else(|| ConchError::NotFound(format!("rack {rack_id}")))?;
        apply_layout(rack, layout, &st.devices)?;
        st.layouts.push((rack_id.to_string(), layout.clone()));
        Ok(())
    }

    async fn relays(&self, _workspace: &str, active_only: bool) -> Result<Vec<Relay>> {
        let endpoint = if active_only { Endpoint::ActiveRelays } else { Endpoint::AllRelays };
        self.enter(endpoint, None).await?;
        Ok(self.state.lock().unwrap().relays.clone())
    }

    async fn device_location(&self, device_id: &str) -> Result<Option<DeviceLocation>> {
        match self.enter(Endpoint::Location(device_id.into()), None).await {
            Ok(()) => {}
            Err(e) if e.is_empty_state() => return Ok(None),
            Err(e) => return Err(e),
        }
        Ok(self.state.lock().unwrap().locations.get(device_id).cloned())
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<()> {
        self.enter(Endpoint::Feedback, Some(serde_json::to_value(feedback)?)).await?;
        self.state.lock().unwrap().feedback.push(feedback.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{device, RackBuilder};

    #[tokio::test]
    async fn test_records_requests_and_serves_racks() {
        let api = MockApi::new().with_rack("Room 1", RackBuilder::new("r1").empty_slots(1..=2).build());
        let rack = api.rack("ws", "r1").await.unwrap();
        assert_eq!(rack.slots.len(), 2);
        assert!(matches!(api.rack("ws", "nope").await, Err(ConchError::NotFound(_))));
        assert_eq!(api.count(&Endpoint::Rack("r1".into())), 1);
        assert_eq!(api.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_queued_failure_applies_once() {
        let api = MockApi::new();
        api.fail_next(Endpoint::Rooms, MockFailure::Status(503));
        assert!(matches!(api.rack_rooms("ws").await, Err(ConchError::Status { status: 503, .. })));
        assert!(api.rack_rooms("ws").await.is_ok());
    }

    #[tokio::test]
    async fn test_logged_out_mock_rejects_calls() {
        let api = MockApi::new().logged_out().with_user("ops", "pw");
        assert!(matches!(api.me().await, Err(ConchError::Unauthorized)));
        assert!(!api.login("ops", "wrong").await.unwrap());
        assert!(api.login("ops", "pw").await.unwrap());
        assert!(api.me().await.is_ok());
    }

    #[tokio::test]
    async fn test_layout_moves_devices() {
        let api = MockApi::new()
            .with_device(device("dev9").pass().build())
            .with_rack(
                "Room 1",
                RackBuilder::new("r1").occupied(1, device("dev1").build()).empty_slots(2..=3).build(),
            );
        let layout: Assignments = [("dev1".to_string(), 2), ("dev9".to_string(), 3)].into_iter().collect();
        api.assign_layout("ws", "r1", &layout).await.unwrap();

        let rack = api.rack_snapshot("r1").unwrap();
        assert!(rack.slot(1).unwrap().occupant.is_empty());
        assert_eq!(rack.slot(2).unwrap().occupant.id(), Some("dev1"));
        assert_eq!(
            rack.slot(3).unwrap().occupant.device().unwrap().health,
            Some(conch_rack::models::Health::Pass)
        );
        assert_eq!(api.submitted_layouts().len(), 1);
    }

    #[tokio::test]
    async fn test_layout_rejects_unknown_slot() {
        let api = MockApi::new().with_rack("Room 1", RackBuilder::new("r1").empty_slots(1..=1).build());
        let layout: Assignments = [("dev1".to_string(), 7)].into_iter().collect();
        assert!(matches!(
            api.assign_layout("ws", "r1", &layout).await,
            Err(ConchError::Status { status: 400, .. })
        ));
        assert!(api.submitted_layouts().is_empty());
    }

    #[tokio::test]
    async fn test_hold_defers_response() {
        let api = MockApi::new().with_rack("Room 1", RackBuilder::new("r1").build());
        let hold = api.hold(Endpoint::Rack("r1".into()));
        let pending = tokio::spawn({
            let api = api.clone();
            async move { api.rack("ws", "r1").await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        hold.release();
        assert!(pending.await.unwrap().is_ok());
    }
}
