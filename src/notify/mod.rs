//! Report delivery channels

pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::{monitor::CycleReport, stats::SummaryReport, DeliveryError};
use async_trait::async_trait;

/// Destination of cycle reports, summaries and lifecycle announcements
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one cycle report
    async fn deliver(&self, report: &CycleReport) -> Result<(), DeliveryError>;

    /// Deliver a periodic summary
    async fn deliver_summary(&self, summary: &SummaryReport) -> Result<(), DeliveryError>;

    /// Send a short free-form notice (startup, shutdown)
    async fn announce(&self, text: &str) -> Result<(), DeliveryError>;
}
