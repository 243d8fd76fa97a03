use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::notifier::Notifier;
use crate::templates::RenderedEmail;

/// Sends `email` to `to` on a detached task.
///
/// The caller does not wait for delivery. Failures are logged with the
/// recipient and go nowhere else. The handle is returned for tests.
pub fn dispatch(notifier: Arc<dyn Notifier>, to: String, email: RenderedEmail) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&to, &email.subject, &email.html_body).await {
            Ok(delivery_id) => {
                info!(
                    recipient = %to,
                    notifier = notifier.name(),
                    delivery_id = %delivery_id,
                    "notification sent"
                );
            }
            Err(e) => {
                warn!(
                    recipient = %to,
                    notifier = notifier.name(),
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    })
}
