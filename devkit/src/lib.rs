/*!
# Conch DevKit - test doubles for the rack view model

- `mock_api`: in-memory backend with recorded calls, queued failures and held responses
- `fixtures`: rack, device and relay builders
- `stub_server`: the same mock served over HTTP with session cookies
- `test_utils`: harness wiring the mock into a dashboard
*/

pub mod fixtures;
pub mod mock_api;
pub mod stub_server;
pub mod test_utils;

pub use mock_api::{Endpoint, Hold, MockApi, MockFailure};
pub use stub_server::StubServer;
pub use test_utils::TestHarness;
