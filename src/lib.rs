//! AstraDNS Admin Client
//!
//! Session-aware synchronization controllers for the AstraDNS REST API.
//!
//! # Features
//!
//! - **Session**: persisted bearer credential, login/logout, forced logout on 401/403
//! - **Polling**: live traffic statistics refreshed on a fixed interval
//! - **Collections**: blocklists and redirects with refresh-after-write
//! - **Config**: listener ports and signing secret, full-object updates
//!
//! # Architecture
//!
//! ```text
//! SessionController ──► CredentialStore (file / memory)
//!        │
//!        ├── Dashboard tab ──► StatsView ◄── PollingController
//!        └── Settings tab  ──► ConfigController
//!                              ResourceCollection<BlocklistEntry>
//!                              ResourceCollection<RedirectEntry>
//!                                      │
//!                                      ▼
//!                              RestClient ──► AstraDNS API
//! ```

pub mod api;
pub mod collection;
pub mod config;
pub mod credential;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod poller;
pub mod rest;
pub mod session;
pub mod settings;

pub use api::Api;
pub use collection::{Blocklists, Redirects, Resource, ResourceCollection};
pub use config::ClientConfig;
pub use credential::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use dashboard::StatsView;
pub use error::{ErrorKind, RequestError, SessionError};
pub use models::{
    BlocklistEntry, Config, EntityId, NewBlocklist, NewRedirect, QpsPoint, QpsSeries,
    RedirectEntry, StatsSnapshot, ViewTab,
};
pub use poller::{PollHandle, PollingController};
pub use rest::RestClient;
pub use session::{ActiveView, SessionController, SessionState};
pub use settings::{ConfigController, SettingsView};
