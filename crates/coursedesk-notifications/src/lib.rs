//! Outbound e-mail notifications.
//!
//! Notifications are a side effect of the request that triggers them: they
//! are rendered up front, handed to [`dispatch`] and delivered on a detached
//! task. A failed delivery is logged and never reaches the HTTP response.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod notifier;
pub mod smtp;
pub mod templates;

pub use config::{MailConfig, SmtpSecurity};
pub use dispatch::dispatch;
pub use error::NotificationError;
pub use notifier::{LogNotifier, Notifier, build_notifier};
pub use smtp::SmtpNotifier;
pub use templates::{ASSIGNMENT_CREATED, RenderedEmail, Template, TemplateRenderer};
