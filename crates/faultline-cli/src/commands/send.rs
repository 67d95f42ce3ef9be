//! Send command - Deliver one report
//!
//! Provides the `faultline send` CLI command which:
//! 1. Builds a message report, or an exception report when `--error-type` is given
//! 2. Attaches `--attr key=value` attributes (values parsed as JSON when possible)
//! 3. Submits it through a client built from the configuration
//! 4. Reports whether it was delivered, queued offline or rejected

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use faultline_client::{ReportClient, SendOutcome};
use faultline_core::config::Config;
use faultline_core::domain::{AttributeValue, Attributes, CapturedException, Report};
use tracing::info;

use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct SendCommand {
    /// Report message
    pub message: String,

    /// Attribute to attach, as key=value (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,

    /// Send as an exception report of this type
    #[arg(long, value_name = "TYPE")]
    pub error_type: Option<String>,
}

/// Parses `key=value`; the value is read as JSON when it parses, so
/// `count=3` is an integer and `name=api` a string.
pub fn parse_attribute(raw: &str) -> Result<(String, AttributeValue)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("attribute '{raw}' must have the form key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("attribute '{raw}' has an empty key");
    }
    let value = serde_json::from_str::<serde_json::Value>(value)
        .map(AttributeValue::from)
        .unwrap_or_else(|_| AttributeValue::from(value));
    Ok((key.to_string(), value))
}

impl SendCommand {
    fn build_report(&self) -> Result<Report> {
        let attributes = self
            .attrs
            .iter()
            .map(|raw| parse_attribute(raw))
            .collect::<Result<Attributes>>()?;

        let report = match &self.error_type {
            Some(type_name) => Report::from_exception(
                CapturedException::new(type_name.as_str(), self.message.as_str()),
                attributes,
            ),
            None => Report::from_message(self.message.as_str(), attributes),
        };
        Ok(report.with_module("faultline-cli"))
    }

    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = format.formatter();

        let config = Config::load_or_default(config_path);
        let report = self.build_report()?;
        let report_id = report.id();

        let client = ReportClient::from_config(&config)
            .await
            .with_context(|| format!("Failed to create client from {}", config_path.display()))?;

        info!(%report_id, "Sending report");
        let outcome = client.send(report, None).await;
        client.shutdown().await;

        if format.is_json() {
            let json = match &outcome {
                SendOutcome::Delivered(result) => serde_json::json!({
                    "status": "delivered",
                    "report_id": report_id.to_string(),
                    "object": result.object,
                }),
                SendOutcome::Queued(record) => serde_json::json!({
                    "status": "queued",
                    "report_id": report_id.to_string(),
                    "record_id": record.record_id().to_string(),
                }),
                SendOutcome::Rejected(error) => serde_json::json!({
                    "status": "rejected",
                    "report_id": report_id.to_string(),
                    "error": error.to_string(),
                    "retryable": error.is_retryable(),
                }),
            };
            formatter.print_json(&json);
        } else {
            match &outcome {
                SendOutcome::Delivered(result) => {
                    formatter.success("Report delivered");
                    formatter.field("Report", &report_id.to_string());
                    if let Some(object) = &result.object {
                        formatter.field("Server object", object);
                    }
                }
                SendOutcome::Queued(record) => {
                    formatter.warn("Endpoint unreachable, report queued for retry");
                    formatter.field("Report", &report_id.to_string());
                    formatter.field("Record", &record.record_id().to_string());
                }
                SendOutcome::Rejected(error) => {
                    formatter.error(&format!("Report not sent: {error}"));
                }
            }
        }

        if let SendOutcome::Rejected(error) = outcome {
            return Err(anyhow::Error::new(error).context("Report was not sent"));
        }
        Ok(())
    }
}
