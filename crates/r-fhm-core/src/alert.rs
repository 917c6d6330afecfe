//! ---
//! fhm_section: "04-configuration-orchestration"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Pipeline orchestration and streaming lifecycle."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use r_fhm_common::config::AlertConfig;
use r_fhm_telemetry::{round4, FuelSample};

/// Subject line attached to every anomaly alert.
pub const ALERT_SUBJECT: &str = "Helicopter Fuel Anomaly Detected";

/// Operator-facing alert, formatted once and fanned out to all sinks.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    /// Subject line.
    pub subject: String,
    /// Plain-text body describing the anomalous sample.
    pub body: String,
    /// Logical receiver (mail group, channel, pager rotation).
    pub receiver: String,
}

/// Delivery backend for alerts. Sinks must not assume exclusive
/// delivery; the dispatcher fans one message out to every sink.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert. Errors are recorded, never fatal.
    async fn deliver(&self, alert: &AlertMessage) -> Result<()>;
    /// Sink name for logging and dispatch summaries.
    fn name(&self) -> &'static str;
}

/// Sink that records the alert in the service log. Always configured,
/// so an alert is never silently lost when no webhook is set up.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, alert: &AlertMessage) -> Result<()> {
        info!(
            subject = %alert.subject,
            receiver = %alert.receiver,
            body = %alert.body,
            "alert recorded"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sink that posts the alert as JSON to a configured webhook.
pub struct WebhookSink {
    url: Url,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build webhook client")?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn deliver(&self, alert: &AlertMessage) -> Result<()> {
        let payload = serde_json::json!({
            "subject": alert.subject,
            "receiver": alert.receiver,
            "body": alert.body,
        });
        self.client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected alert")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Outcome of one dispatch across all sinks.
#[derive(Debug, Clone)]
pub struct AlertDispatch {
    /// Subject that was sent.
    pub subject: String,
    /// Body that was sent.
    pub body: String,
    /// Sinks that accepted the alert.
    pub delivered: Vec<&'static str>,
    /// Sinks that failed; failures are logged, not propagated.
    pub failed: Vec<&'static str>,
}

/// Formats anomaly alerts and fans them out to the configured sinks.
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
    receiver: String,
}

impl AlertDispatcher {
    /// Build a dispatcher from configuration. The log sink is always
    /// present; a webhook sink is added when a URL is configured.
    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogSink)];
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookSink::new(url.clone())?));
        }
        Ok(Self {
            sinks,
            receiver: config.receiver.clone(),
        })
    }

    /// Build a dispatcher over explicit sinks (tests, embedding).
    pub fn with_sinks(sinks: Vec<Arc<dyn AlertSink>>, receiver: impl Into<String>) -> Self {
        Self {
            sinks,
            receiver: receiver.into(),
        }
    }

    /// Format an anomalous sample and send it through every sink.
    pub async fn dispatch(&self, sample: &FuelSample) -> AlertDispatch {
        let message = AlertMessage {
            subject: ALERT_SUBJECT.to_owned(),
            body: format_alert_body(sample),
            receiver: self.receiver.clone(),
        };

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for sink in &self.sinks {
            match sink.deliver(&message).await {
                Ok(()) => delivered.push(sink.name()),
                Err(err) => {
                    warn!(sink = sink.name(), error = %err, "alert delivery failed");
                    failed.push(sink.name());
                }
            }
        }

        AlertDispatch {
            subject: message.subject,
            body: message.body,
            delivered,
            failed,
        }
    }
}

/// Render the plain-text alert body for an anomalous sample.
pub fn format_alert_body(sample: &FuelSample) -> String {
    let score = match sample.score {
        Some(score) => round4(score).to_string(),
        None => "n/a".to_owned(),
    };
    format!(
        "Anomaly Detected!\n\
         RPM: {}, Throttle: {}%\n\
         Fuel Pressure: {} Bar\n\
         Fuel Temp: {} °C\n\
         Flow Rate: {} L/min\n\
         Score: {}\n\
         Time: {}",
        sample.rpm,
        sample.throttle,
        sample.fuel_pressure,
        sample.fuel_temp,
        sample.flow_rate,
        score,
        sample.timestamp.to_rfc3339(),
    )
}
