//! Backend seam: the REST contract the view model consumes.
//!
//! `ConchApi` is the only way the core talks to the backend. `HttpApi` is the
//! production transport (reqwest, session cookie); tests plug in the devkit mock.

use crate::error::{ConchError, Result};
use crate::models::{
    Assignments, DeviceLocation, Feedback, LoginRequest, Rack, Relay, RoomIndex, Workspace,
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ConchApi: Send + Sync {
    /// `GET /me`: succeeds when the session is valid.
    async fn me(&self) -> Result<()>;
    /// `POST /login`: `Ok(false)` on rejected credentials.
    async fn login(&self, user: &str, password: &str) -> Result<bool>;
    async fn logout(&self) -> Result<()>;
    async fn workspaces(&self) -> Result<Vec<Workspace>>;
    async fn rack_rooms(&self, workspace: &str) -> Result<RoomIndex>;
    async fn rack(&self, workspace: &str, rack_id: &str) -> Result<Rack>;
    async fn assign_layout(&self, workspace: &str, rack_id: &str, layout: &Assignments) -> Result<()>;
    async fn relays(&self, workspace: &str, active_only: bool) -> Result<Vec<Relay>>;
    /// `Ok(None)` when the device has no location (400/404/409).
    async fn device_location(&self, device_id: &str) -> Result<Option<DeviceLocation>>;
    async fn send_feedback(&self, feedback: &Feedback) -> Result<()>;
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

fn is_unauthorized_body(body: &[u8]) -> bool {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.error.eq_ignore_ascii_case("unauthorized"))
        .unwrap_or(false)
}

/// reqwest transport with a cookie store holding the session.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| ConchError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ConchError::InvalidUrl(base_url.to_string()));
        }
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("conch-rack/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { client: builder.build()?, base_url: parsed })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends `segments` to the base path, percent-encoding each one, so an
    /// id holding `/`, `?` or `#` stays a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let path = url.path().to_string();
        let mut req = self.client.request(method.clone(), url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?.to_vec();
        debug!(%method, path, status = status.as_u16(), "backend response");
        Ok((status, bytes))
    }

    /// Maps transport status and body onto the error taxonomy.
    fn check(path: &str, status: StatusCode, body: &[u8]) -> Result<()> {
        if status == StatusCode::UNAUTHORIZED || is_unauthorized_body(body) {
            return Err(ConchError::Unauthorized);
        }
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ConchError::NotFound(path.to_string())),
            StatusCode::CONFLICT => Err(ConchError::Conflict(path.to_string())),
            s => Err(ConchError::Status { status: s.as_u16(), url: path.to_string() }),
        }
    }

    /// A device without a location answers 400, 404 or 409. An expired
    /// session still wins over all three.
    fn location(path: &str, status: StatusCode, body: &[u8]) -> Result<Option<DeviceLocation>> {
        match Self::check(path, status, body) {
            Ok(()) => Ok(Some(serde_json::from_slice(body)?)),
            Err(e) if e.is_empty_state() => Ok(None),
            Err(ConchError::Status { status: 400, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let path = url.path().to_string();
        let (status, body) = self.send::<()>(Method::GET, url, None).await?;
        Self::check(&path, status, &body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: Option<&B>) -> Result<()> {
        let path = url.path().to_string();
        let (status, bytes) = self.send(Method::POST, url, body).await?;
        Self::check(&path, status, &bytes)
    }
}

#[async_trait]
impl ConchApi for HttpApi {
    async fn me(&self) -> Result<()> {
        let (status, body) = self.send::<()>(Method::GET, self.url(&["me"])?, None).await?;
        Self::check("/me", status, &body)
    }

    async fn login(&self, user: &str, password: &str) -> Result<bool> {
        let body = LoginRequest { user: user.to_string(), password: password.to_string() };
        match self.post(self.url(&["login"])?, Some(&body)).await {
            Ok(()) => Ok(true),
            Err(ConchError::Unauthorized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.post::<()>(self.url(&["logout"])?, None).await
    }

    async fn workspaces(&self) -> Result<Vec<Workspace>> {
        self.get_json(self.url(&["workspace"])?).await
    }

    async fn rack_rooms(&self, workspace: &str) -> Result<RoomIndex> {
        self.get_json(self.url(&["workspace", workspace, "rack"])?).await
    }

    async fn rack(&self, workspace: &str, rack_id: &str) -> Result<Rack> {
        self.get_json(self.url(&["workspace", workspace, "rack", rack_id])?).await
    }

    async fn assign_layout(&self, workspace: &str, rack_id: &str, layout: &Assignments) -> Result<()> {
        let url = self.url(&["workspace", workspace, "rack", rack_id, "layout"])?;
        self.post(url, Some(layout)).await
    }

    async fn relays(&self, workspace: &str, active_only: bool) -> Result<Vec<Relay>> {
        let mut url = self.url(&["workspace", workspace, "relay"])?;
        if active_only {
            url.query_pairs_mut().append_pair("active", "1");
        }
        self.get_json(url).await
    }

    async fn device_location(&self, device_id: &str) -> Result<Option<DeviceLocation>> {
        let url = self.url(&["device", device_id, "location"])?;
        let path = url.path().to_string();
        let (status, body) = self.send::<()>(Method::GET, url, None).await?;
        Self::location(&path, status, &body)
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<()> {
        self.post(self.url(&["feedback"])?, Some(feedback)).await
    }
}
