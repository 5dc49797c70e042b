/**
 * ASSIGNMENT SUBMITTER - Turns slot edits into a layout POST
 *
 * ROLE: Resolves every slot of the rack (Dirty value, else occupant), posts
 * the device -> slot map as the desired layout, then reconciles: settles the
 * edits the POST covered, raises the success flag and reloads the rack.
 *
 * ON FAILURE: the error goes back to the caller and the edit buffer is left
 * exactly as it was, so the user can retry without typing again.
 *
 * UNASSIGN: the layout endpoint has no way to say "empty this slot". Slots
 * left blank are simply absent from the payload; they are reported back as
 * `cleared_slots` so the caller can tell the user nothing was removed.
 */

use crate::api::ConchApi;
use crate::directory::{Loaded, RackDirectory};
use crate::edit_buffer::SlotEditBuffer;
use crate::error::{ConchError, Result};
use crate::models::{Assignments, Rack, SlotNumber};
use crate::state::{new_state, Shared};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Payload for the layout endpoint plus what it could not express.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub layout: Assignments,
    /// Occupied slots the user blanked; the backend has no unassign operation.
    pub cleared_slots: Vec<SlotNumber>,
}

impl AssignmentPlan {
    /// Slots that receive a device in `layout`.
    pub fn covered_slots(&self) -> BTreeSet<SlotNumber> {
        self.layout.values().copied().collect()
    }
}

pub fn compute_assignments(rack: &Rack, buffer: &SlotEditBuffer) -> AssignmentPlan {
    let mut plan = AssignmentPlan::default();
    for (number, slot) in &rack.slots {
        match buffer.effective(*number, slot) {
            Some(device) => {
                if let Some(previous) = plan.layout.insert(device.to_string(), *number) {
                    warn!(device, previous, slot = number, "device entered in two slots, keeping the higher one");
                }
            }
            None if !slot.occupant.is_empty() => plan.cleared_slots.push(*number),
            None => {}
        }
    }
    plan
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub layout: Assignments,
    pub cleared_slots: Vec<SlotNumber>,
    /// Slots whose edit was covered by this submit and went Clean.
    pub settled: usize,
    pub reloaded: bool,
}

#[derive(Debug, Default)]
struct FlagState {
    raised: bool,
    epoch: u64,
    expirations: u64,
    timer: Option<JoinHandle<()>>,
}

/// "Assignment succeeded" notice that lowers itself after a fixed window.
/// At most one timer is outstanding: raising again replaces it.
#[derive(Clone)]
pub struct SuccessFlag {
    window: Duration,
    state: Shared<FlagState>,
}

impl SuccessFlag {
    pub fn new(window: Duration) -> Self {
        Self { window, state: new_state(FlagState::default()) }
    }

    /// Must be called from within a tokio runtime.
    pub fn raise(&self) {
        let mut st = self.state.lock();
        st.epoch += 1;
        st.raised = true;
        if let Some(previous) = st.timer.take() {
            previous.abort();
        }

        let epoch = st.epoch;
        let state = self.state.clone();
        let window = self.window;
        st.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut st = state.lock();
            if st.epoch == epoch {
                st.raised = false;
                st.expirations += 1;
                st.timer = None;
                debug!("assignment success notice cleared");
            }
        }));
    }

    pub fn is_raised(&self) -> bool {
        self.state.lock().raised
    }

    /// How many times the window elapsed and lowered the flag.
    pub fn expirations(&self) -> u64 {
        self.state.lock().expirations
    }

    /// Lowers the flag and drops any pending timer.
    pub fn cancel(&self) {
        let mut st = self.state.lock();
        st.epoch += 1;
        st.raised = false;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
    }
}

pub struct AssignmentSubmitter {
    api: Arc<dyn ConchApi>,
    workspace: String,
    flag: SuccessFlag,
}

impl AssignmentSubmitter {
    pub fn new(api: Arc<dyn ConchApi>, workspace: impl Into<String>, success_window: Duration) -> Self {
        Self {
            api,
            workspace: workspace.into(),
            flag: SuccessFlag::new(success_window),
        }
    }

    pub fn success_flag(&self) -> &SuccessFlag {
        &self.flag
    }

    pub async fn assign_devices(
        &self,
        rack: &Rack,
        buffer: &Shared<SlotEditBuffer>,
        directory: &RackDirectory,
    ) -> Result<SubmitReport> {
        let (snapshot, plan) = {
            let buffer = buffer.lock();
            let plan = compute_assignments(rack, &buffer);
            (buffer.snapshot().covering(&plan.covered_slots()), plan)
        };
        debug!(rack_id = %rack.id, captured = snapshot.len(), "submitting layout");
        if !plan.cleared_slots.is_empty() {
            warn!(rack_id = %rack.id, slots = ?plan.cleared_slots, "blanked slots are not sent, the layout endpoint cannot unassign");
        }

        if let Err(e) = self.api.assign_layout(&self.workspace, &rack.id, &plan.layout).await {
            if !e.is_unauthorized() {
                error!(rack_id = %rack.id, error = %e, "failed to assign devices");
            }
            return Err(e);
        }

        let settled = buffer.lock().settle(&snapshot);
        self.flag.raise();
        info!(rack_id = %rack.id, devices = plan.layout.len(), settled, "devices assigned");

        let reloaded = match directory.refresh(&rack.id).await {
            Ok(Loaded::Applied(_)) => true,
            Ok(Loaded::Superseded) => false,
            Err(ConchError::Unauthorized) => return Err(ConchError::Unauthorized),
            Err(_) => false,
        };

        Ok(SubmitReport {
            layout: plan.layout,
            cleared_slots: plan.cleared_slots,
            settled,
            reloaded,
        })
    }
}
