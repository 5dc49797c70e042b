//! Conch rack view model.
//!
//! Loads a rack's physical layout, overlays device health and the relay
//! active in the rack, lets the user edit slot assignments in bulk and
//! submits the resulting layout back to the Conch backend.
//!
//! - `directory`: room index and the canonical rack, with stale-response rejection
//! - `relay`: active relays, natural alias order, relay-to-rack association
//! - `edit_buffer`: Dirty/Clean slot edits layered over server occupancy
//! - `submit`: layout diff, POST, success notice and reconciliation
//! - `view` / `dashboard`: rows for the table renderer and per-navigation sessions

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod directory;
pub mod edit_buffer;
pub mod error;
pub mod health;
pub mod models;
pub mod relay;
pub mod state;
pub mod submit;
pub mod view;
pub mod workspace;

pub use api::{ConchApi, HttpApi};
pub use auth::{Access, AuthGate};
pub use config::{load_config, ConchConfig};
pub use dashboard::{Dashboard, RoomListing, ViewSettings};
pub use directory::{Loaded, RackDirectory};
pub use error::{ConchError, Result};
pub use health::{classify, HealthCategory};
pub use view::{RackLayout, RackSession, SlotRow};
