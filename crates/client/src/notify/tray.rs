//! In-process notification display.

use async_trait::async_trait;
use tokio::sync::RwLock;

use pwa_relay_core::Error;

use super::{Notification, NotificationDisplay};

/// Visible notifications, at most one per tag.
///
/// Showing a notification whose tag is already visible replaces the old one.
#[derive(Debug, Default)]
pub struct NotificationTray {
    visible: RwLock<Vec<Notification>>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn visible(&self) -> Vec<Notification> {
        self.visible.read().await.clone()
    }
}

#[async_trait]
impl NotificationDisplay for NotificationTray {
    async fn show(&self, notification: Notification) -> Result<(), Error> {
        let mut visible = self.visible.write().await;
        let before = visible.len();
        visible.retain(|n| n.options.tag != notification.options.tag);
        if visible.len() != before {
            tracing::debug!(tag = %notification.options.tag, "replacing notification");
        }
        visible.push(notification);
        Ok(())
    }

    async fn close(&self, notification: &Notification) -> Result<(), Error> {
        let mut visible = self.visible.write().await;
        let before = visible.len();
        visible.retain(|n| n != notification);
        if visible.len() == before {
            tracing::debug!(tag = %notification.options.tag, "clicked notification is no longer visible");
        }
        Ok(())
    }
}
