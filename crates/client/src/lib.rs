//! Client side of pwa-relay.
//!
//! This crate provides the network fetch pipeline, request routing between
//! network and cache, the install/activate lifecycle, the notification relay
//! and the [`Worker`] that ties them to host events.

pub mod clients;
pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod route;
pub mod router;
pub mod worker;

#[cfg(test)]
mod testing;

pub use clients::{ClientRegistry, ClientType, ClientView, ClientViews};
pub use fetch::{Body, FetchClient, FetchConfig, Network, Request, Response};
pub use lifecycle::{AssetFailure, InstallReport, Lifecycle, WorkerState};
pub use notify::{
    ClickOutcome, ClientMessage, Notification, NotificationData, NotificationDisplay, NotificationOptions,
    NotificationPayload, NotificationRelay, NotificationTray,
};
pub use route::{HostPattern, RouteTable};
pub use router::{RefreshOutcome, Routed, Router};
pub use worker::{EventOutcome, FetchEvent, FetchedResponse, HostEvent, Worker};
