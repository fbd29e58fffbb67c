//! Meridian notification engine.
//!
//! The send pipeline between the HTTP surface and the outside world:
//!
//! - [`store`] — the [`NotificationStore`](store::NotificationStore)
//!   persistence seam with PostgreSQL and in-memory implementations.
//! - [`source`] — the [`EntitySource`](source::EntitySource) read seam for
//!   customers, policies, quotations, and settings.
//! - [`transport`] — outbound delivery ([`WhatsAppTransport`],
//!   [`EmailTransport`], channel routing).
//! - [`context`] — per-render [`RenderContext`](meridian_core::context::RenderContext)
//!   assembly.
//! - [`sender`] — attempt recording and retry.
//! - [`reconciler`] — webhook-driven delivery-status reconciliation.
//! - [`dispatch`] — the campaign dispatch engine (throttle, pause/resume,
//!   queue-or-inline policy, bulk sends).
//! - [`queue`] — the background dispatch queue and its worker loop.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod reconciler;
pub mod sender;
pub mod source;
pub mod store;
pub mod transport;

pub use context::ContextBuilder;
pub use dispatch::{CampaignEngine, DispatchPolicy};
pub use error::{NotifyError, StoreError};
pub use queue::{DispatchQueue, QueueWorker, TokioDispatchQueue};
pub use reconciler::StatusReconciler;
pub use sender::NotificationSender;
pub use transport::email::EmailTransport;
pub use transport::whatsapp::WhatsAppTransport;
pub use transport::{ChannelRouter, DisabledTransport, Transport};
