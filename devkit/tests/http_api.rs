//! `HttpApi` against the local stub server.

use conch_devkit::fixtures::{device, location, relay, workspace, RackBuilder};
use conch_devkit::{Endpoint, MockApi, MockFailure, StubServer};
use conch_rack::models::{Assignments, Feedback};
use conch_rack::{Access, AuthGate, ConchApi, ConchConfig, ConchError, Dashboard, HttpApi};
use std::sync::Arc;
use std::time::Duration;

fn backend() -> MockApi {
    MockApi::new()
        .with_user("ops", "secret")
        .with_workspaces(vec![workspace("ws-1", "LAB"), workspace("ws-global", "GLOBAL")])
        .with_rack(
            "Room 1",
            RackBuilder::new("r1").occupied(1, device("dev1").fail().build()).empty_slots(2..=3).build(),
        )
        .with_relay(relay("rel-1").alias("edge").at_rack("r1").build())
        .with_location("dev1", location("r1", 1))
        .with_location("a/b", location("r1", 2))
}

async fn logged_in(server: &StubServer) -> HttpApi {
    let api = HttpApi::new(server.base_url(), Some(Duration::from_secs(5))).unwrap();
    assert!(api.login("ops", "secret").await.unwrap());
    api
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() {
    let server = StubServer::start(backend()).await.unwrap();
    let api = HttpApi::new(server.base_url(), None).unwrap();

    assert!(matches!(api.me().await, Err(ConchError::Unauthorized)));
    assert!(matches!(api.rack("ws-global", "r1").await, Err(ConchError::Unauthorized)));
    assert!(!api.login("ops", "wrong").await.unwrap());
}

#[tokio::test]
async fn test_login_cookie_opens_session() {
    let server = StubServer::start(backend()).await.unwrap();
    let api = logged_in(&server).await;

    api.me().await.unwrap();
    let rack = api.rack("ws-global", "r1").await.unwrap();
    assert_eq!(rack.slots.len(), 3);
    assert_eq!(rack.slot(1).unwrap().occupant.id(), Some("dev1"));
    assert!(rack.slot(2).unwrap().occupant.is_empty());

    api.logout().await.unwrap();
    assert!(matches!(api.me().await, Err(ConchError::Unauthorized)));
}

#[tokio::test]
async fn test_layout_post_round_trip() {
    let backend = backend();
    let server = StubServer::start(backend.clone()).await.unwrap();
    let api = logged_in(&server).await;

    let layout: Assignments = [("dev1".to_string(), 1), ("dev3".to_string(), 2)].into_iter().collect();
    api.assign_layout("ws-global", "r1", &layout).await.unwrap();

    assert_eq!(backend.submitted_layouts(), vec![("r1".to_string(), layout)]);
    let rack = api.rack("ws-global", "r1").await.unwrap();
    assert_eq!(rack.slot(2).unwrap().occupant.id(), Some("dev3"));
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let backend = backend();
    let server = StubServer::start(backend.clone()).await.unwrap();
    let api = logged_in(&server).await;

    assert!(matches!(api.rack("ws-global", "missing").await, Err(ConchError::NotFound(_))));
    backend.fail_next(Endpoint::Rooms, MockFailure::Status(503));
    assert!(matches!(
        api.rack_rooms("ws-global").await,
        Err(ConchError::Status { status: 503, .. })
    ));
    backend.fail_next(Endpoint::Rooms, MockFailure::Unauthorized);
    assert!(matches!(api.rack_rooms("ws-global").await, Err(ConchError::Unauthorized)));
}

#[tokio::test]
async fn test_device_without_location_is_none() {
    let server = StubServer::start(backend()).await.unwrap();
    let api = logged_in(&server).await;

    let found = api.device_location("dev1").await.unwrap().unwrap();
    assert_eq!(found.rack.id, "r1");
    assert_eq!(found.rack.unit, Some(1));
    assert!(api.device_location("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ids_with_reserved_characters_reach_the_backend() {
    let backend = backend();
    let server = StubServer::start(backend.clone()).await.unwrap();
    let api = logged_in(&server).await;

    let found = api.device_location("a/b").await.unwrap().unwrap();
    assert_eq!(found.rack.unit, Some(2));
    assert_eq!(backend.count(&Endpoint::Location("a/b".into())), 1);

    backend.fail_next(Endpoint::Location("a/b".into()), MockFailure::Status(400));
    assert!(api.device_location("a/b").await.unwrap().is_none());
    assert!(matches!(api.rack("ws-global", "r1?x#y").await, Err(ConchError::NotFound(_))));
    assert_eq!(backend.count(&Endpoint::Rack("r1?x#y".into())), 1);
}

#[tokio::test]
async fn test_relays_and_feedback() {
    let backend = backend();
    let server = StubServer::start(backend.clone()).await.unwrap();
    let api = logged_in(&server).await;

    let relays = api.relays("ws-global", true).await.unwrap();
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].rack_id(), Some("r1"));
    assert_eq!(backend.count(&Endpoint::ActiveRelays), 1);
    api.relays("ws-global", false).await.unwrap();
    assert_eq!(backend.count(&Endpoint::AllRelays), 1);

    let feedback = Feedback { subject: "s".into(), message: "m".into() };
    api.send_feedback(&feedback).await.unwrap();
    assert_eq!(backend.feedback(), vec![feedback]);
}

#[tokio::test]
async fn test_dashboard_over_http() {
    let server = StubServer::start(backend()).await.unwrap();
    let http: Arc<dyn ConchApi> = Arc::new(HttpApi::new(server.base_url(), None).unwrap());
    let gate = Arc::new(AuthGate::new(http.clone()));
    let cfg = ConchConfig::default();

    assert!(Dashboard::connect(http.clone(), gate.clone(), &cfg).await.unwrap().is_redirect());
    assert!(gate.login("ops", "secret").await.unwrap());

    let dashboard = match Dashboard::connect(http, gate, &cfg).await.unwrap() {
        Access::Granted(d) => d,
        Access::Redirect => panic!("still redirected after login"),
    };
    assert_eq!(dashboard.workspace().name, "GLOBAL");

    let session = dashboard.open_rack("r1", None).await.unwrap().granted().unwrap();
    let layout = session.layout().unwrap();
    assert_eq!(layout.header.relay.unwrap().label, "edge");
    assert_eq!(
        layout.rows.iter().find(|r| r.slot == 1).unwrap().report.as_ref().and_then(|r| r.href()),
        Some("/problem/dev1".to_string())
    );

    dashboard.gate().logout().await.unwrap();
    assert!(!dashboard.gate().is_logged_in());
    assert!(dashboard.open_rack("r1", None).await.unwrap().is_redirect());
}
