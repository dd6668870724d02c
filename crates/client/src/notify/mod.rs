//! Notification relay: page messages and push deliveries in, displayed
//! notifications out, clicks routed back to a client view.

mod payload;
mod tray;

pub use payload::{ClientMessage, NotificationPayload};
pub use tray::NotificationTray;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pwa_relay_core::{Error, NotificationDefaults};

use crate::clients::{ClientType, ClientView, ClientViews};

/// Metadata attached to a notification and read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
    /// Same target as `url`, for older Android clients.
    #[serde(default)]
    pub click_action: Option<String>,
}

/// Display options for one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: String,
    pub badge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub data: NotificationData,
    /// Stay visible until the user acts.
    #[serde(default)]
    pub require_interaction: bool,
}

/// A notification as handed to the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

impl Notification {
    pub fn tag(&self) -> &str {
        &self.options.tag
    }

    pub fn target_url(&self) -> &str {
        &self.options.data.url
    }
}

/// Host notification surface.
#[async_trait]
pub trait NotificationDisplay: Send + Sync {
    /// Show a notification, replacing any visible one with the same tag.
    async fn show(&self, notification: Notification) -> Result<(), Error>;

    /// Dismiss this notification if it is still the one visible. A newer
    /// notification that replaced it under the same tag stays up.
    async fn close(&self, notification: &Notification) -> Result<(), Error>;
}

/// Where a click took the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "view", rename_all = "snake_case")]
pub enum ClickOutcome {
    Focused(ClientView),
    Opened(ClientView),
}

pub struct NotificationRelay {
    defaults: NotificationDefaults,
    display: Arc<dyn NotificationDisplay>,
    clients: Arc<dyn ClientViews>,
}

impl NotificationRelay {
    pub fn new(defaults: NotificationDefaults, display: Arc<dyn NotificationDisplay>, clients: Arc<dyn ClientViews>) -> Self {
        Self { defaults, display, clients }
    }

    /// Fill a payload's gaps from the defaults.
    pub fn build(&self, payload: NotificationPayload) -> Notification {
        let defaults = &self.defaults;
        let url = payload.url.unwrap_or_else(|| defaults.url.clone());

        Notification {
            title: payload.title.unwrap_or_else(|| defaults.title.clone()),
            options: NotificationOptions {
                body: payload.body.unwrap_or_else(|| defaults.body.clone()),
                icon: payload.icon.unwrap_or_else(|| defaults.icon.clone()),
                badge: payload.badge.unwrap_or_else(|| defaults.badge.clone()),
                image: payload.image,
                vibrate: defaults.vibrate.clone(),
                tag: payload.tag.unwrap_or_else(|| defaults.tag.clone()),
                data: NotificationData { click_action: Some(url.clone()), url },
                require_interaction: true,
            },
        }
    }

    async fn show(&self, payload: NotificationPayload) -> Result<Notification, Error> {
        let notification = self.build(payload);
        tracing::info!(tag = %notification.tag(), target = %notification.target_url(), "showing notification");
        self.display.show(notification.clone()).await?;
        Ok(notification)
    }

    /// Handle a message posted by a page. Unrecognized messages are ignored.
    pub async fn handle_message(&self, message: &Value) -> Result<Option<Notification>, Error> {
        match ClientMessage::parse(message) {
            Some(ClientMessage::ShowNotification(payload)) => self.show(payload).await.map(Some),
            None => {
                tracing::debug!("ignoring unrecognized client message");
                Ok(None)
            }
        }
    }

    /// Handle a push delivery. Malformed data still shows the default notification.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Notification, Error> {
        self.show(NotificationPayload::from_push(data)).await
    }

    /// Dismiss the notification, then focus a window already showing its
    /// target or open a new one.
    pub async fn handle_click(&self, notification: &Notification) -> Result<ClickOutcome, Error> {
        self.display.close(notification).await?;

        let target = notification.target_url();
        let windows = self.clients.match_all(ClientType::Window).await?;
        if let Some(view) = windows.iter().find(|v| v.url.contains(target)) {
            tracing::info!(id = %view.id, %target, "focusing existing view");
            return self.clients.focus(&view.id).await.map(ClickOutcome::Focused);
        }

        tracing::info!(%target, "no view open at target, opening one");
        self.clients.open_window(target).await.map(ClickOutcome::Opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRegistry;
    use serde_json::json;
    use url::Url;

    fn relay() -> (NotificationRelay, Arc<NotificationTray>, Arc<ClientRegistry>) {
        let tray = Arc::new(NotificationTray::new());
        let clients = Arc::new(ClientRegistry::new(Url::parse("http://localhost:8080").unwrap()));
        let relay = NotificationRelay::new(NotificationDefaults::default(), tray.clone(), clients.clone());
        (relay, tray, clients)
    }

    fn window(id: &str, url: &str) -> ClientView {
        ClientView { id: id.into(), url: url.into(), client_type: ClientType::Window, focused: false, controlled: true }
    }

    #[tokio::test]
    async fn test_push_then_click_opens_target() {
        let (relay, tray, clients) = relay();
        clients.add(window("a", "http://localhost:8080/mobile.html")).await;

        let shown = relay.handle_push(Some(br#"{"title":"Hi","body":"msg","url":"/chat/42"}"#)).await.unwrap();
        assert_eq!(shown.title, "Hi");
        assert_eq!(shown.options.body, "msg");
        assert_eq!(shown.tag(), "gochat-message");
        assert_eq!(shown.target_url(), "/chat/42");
        assert!(shown.options.require_interaction);

        let outcome = relay.handle_click(&shown).await.unwrap();
        let ClickOutcome::Opened(view) = outcome else {
            panic!("expected a new view, got {outcome:?}");
        };
        assert_eq!(view.url, "http://localhost:8080/chat/42");
        assert!(tray.visible().await.is_empty());
    }

    #[tokio::test]
    async fn test_click_focuses_matching_view() {
        let (relay, _, clients) = relay();
        clients.add(window("a", "http://localhost:8080/profile.html")).await;
        clients.add(window("b", "http://localhost:8080/mobile.html?room=7")).await;

        let shown = relay.handle_push(None).await.unwrap();
        let outcome = relay.handle_click(&shown).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::Focused(ref v) if v.id == "b" && v.focused));
        assert_eq!(clients.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_same_tag_replaces() {
        let (relay, tray, _) = relay();
        let first = json!({"type": "SHOW_NOTIFICATION", "body": "Ringing", "tag": "call"});
        let second = json!({"type": "SHOW_NOTIFICATION", "body": "Missed call", "tag": "call"});

        relay.handle_message(&first).await.unwrap();
        relay.handle_message(&second).await.unwrap();

        let visible = tray.visible().await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].options.body, "Missed call");
    }

    #[tokio::test]
    async fn test_click_on_replaced_notification_keeps_newer_one() {
        let (relay, tray, _) = relay();
        let older = relay.handle_push(Some(br#"{"body":"first message"}"#)).await.unwrap();
        let newer = relay.handle_push(Some(br#"{"body":"second message"}"#)).await.unwrap();
        assert_eq!(older.tag(), newer.tag());

        relay.handle_click(&older).await.unwrap();
        assert_eq!(tray.visible().await, vec![newer.clone()]);

        relay.handle_click(&newer).await.unwrap();
        assert!(tray.visible().await.is_empty());
    }

    #[tokio::test]
    async fn test_different_tags_coexist() {
        let (relay, tray, _) = relay();
        relay.handle_message(&json!({"type": "SHOW_NOTIFICATION", "tag": "call"})).await.unwrap();
        relay.handle_push(Some(b"hello")).await.unwrap();
        assert_eq!(tray.visible().await.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_push_uses_defaults() {
        let (relay, _, _) = relay();
        let shown = relay.handle_push(Some(b"[]")).await.unwrap();
        let defaults = NotificationDefaults::default();

        assert_eq!(shown.title, defaults.title);
        assert_eq!(shown.options.body, defaults.body);
        assert_eq!(shown.options.icon, defaults.icon);
        assert_eq!(shown.target_url(), defaults.url);
        assert_eq!(shown.options.data.click_action.as_deref(), Some(defaults.url.as_str()));
    }

    #[tokio::test]
    async fn test_text_push_keeps_default_title() {
        let (relay, _, _) = relay();
        let shown = relay.handle_push(Some(b"Sari sent a photo")).await.unwrap();
        assert_eq!(shown.title, "GoChat Pro");
        assert_eq!(shown.options.body, "Sari sent a photo");
    }

    #[tokio::test]
    async fn test_unrecognized_message_is_ignored() {
        let (relay, tray, _) = relay();
        assert_eq!(relay.handle_message(&json!({"type": "PING"})).await.unwrap(), None);
        assert!(tray.visible().await.is_empty());
    }

    #[test]
    fn test_click_outcome_wire_format() {
        let outcome = ClickOutcome::Opened(window("view-1", "http://localhost:8080/chat/42"));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["action"], "opened");
        assert_eq!(value["view"]["url"], "http://localhost:8080/chat/42");
    }
}
