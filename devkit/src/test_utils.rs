/*!
Test harness for rack scenarios

Wires a `MockApi` into an `AuthGate` and a `Dashboard` the way the console
does with the HTTP transport, and adds assertions over the recorded calls.
*/

use crate::mock_api::{Endpoint, MockApi};
use anyhow::Result;
use conch_rack::models::Workspace;
use conch_rack::{Access, AuthGate, ConchApi, Dashboard, RackSession, ViewSettings};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TestHarness {
    pub api: MockApi,
    pub gate: Arc<AuthGate>,
    pub dashboard: Dashboard,
}

impl TestHarness {
    pub fn new(api: MockApi) -> Self {
        Self::with_settings(api, ViewSettings::default())
    }

    pub fn with_settings(api: MockApi, settings: ViewSettings) -> Self {
        env_logger::try_init().ok();

        let shared: Arc<dyn ConchApi> = Arc::new(api.clone());
        let gate = Arc::new(AuthGate::new(shared.clone()));
        let workspace = Workspace { id: "ws-global".into(), name: "GLOBAL".into(), role: None };
        let dashboard = Dashboard::new(shared, gate.clone(), workspace, settings);
        Self { api, gate, dashboard }
    }

    /// Opens a rack page and fails the test on a login redirect.
    pub async fn open(&self, rack_id: &str) -> Result<RackSession> {
        self.open_highlighted(rack_id, None).await
    }

    pub async fn open_highlighted(&self, rack_id: &str, device: Option<&str>) -> Result<RackSession> {
        match self.dashboard.open_rack(rack_id, device.map(String::from)).await? {
            Access::Granted(session) => {
                log::info!("opened rack {}", rack_id);
                Ok(session)
            }
            Access::Redirect => anyhow::bail!("redirected to login while opening rack {}", rack_id),
        }
    }

    pub fn assert_requested(&self, endpoint: &Endpoint, expected: usize) -> Result<()> {
        let actual = self.api.count(endpoint);
        if actual != expected {
            anyhow::bail!("{:?}: expected {} calls, got {}", endpoint, expected, actual);
        }
        Ok(())
    }

    pub fn get_stats(&self) -> TestStats {
        let requests = self.api.requests();
        let mut endpoint_counts = HashMap::new();
        for req in &requests {
            *endpoint_counts.entry(req.endpoint.clone()).or_insert(0) += 1;
        }
        TestStats { total_requests: requests.len(), endpoint_counts }
    }

    pub fn reset(&self) {
        self.api.clear_requests();
        log::info!("test harness reset");
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_requests: usize,
    pub endpoint_counts: HashMap<Endpoint, usize>,
}

impl TestStats {
    pub fn print(&self) {
        println!("Test statistics:");
        println!("  Total requests: {}", self.total_requests);
        for (endpoint, count) in &self.endpoint_counts {
            println!("    {:?}: {}", endpoint, count);
        }
    }
}
