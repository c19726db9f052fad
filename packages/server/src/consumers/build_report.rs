use std::sync::Arc;

use common::BuildReport;
use mq::{BroccoliError, BrokerMessage, Mq};
use tracing::{debug, error, info, warn};

use crate::domain::GatewayError;
use crate::lifecycle::Lifecycle;

/// Consume build completion reports from the report queue.
pub async fn consume_build_reports(lifecycle: Lifecycle, mq: Arc<Mq>, queue_name: String) {
    info!(queue = %queue_name, "Starting build report consumer");

    let result = mq
        .process_messages(
            &queue_name,
            None,
            None,
            move |message: BrokerMessage<BuildReport>| {
                let lifecycle = lifecycle.clone();
                async move {
                    let report = message.payload;
                    let run_id = report.run_id.clone();

                    if let Err(e) = apply_report(&lifecycle, &report).await {
                        error!(run_id = %run_id, error = %e, "Failed to apply build report");
                        return Err(BroccoliError::Job(e.to_string()));
                    }
                    Ok(())
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Build report consumer stopped unexpectedly");
    }
}

/// Record one report against its build run.
///
/// Pending reports and reports for runs that no longer exist are acknowledged
/// without effect. Only backend failures are returned, so the queue retries them.
pub async fn apply_report(lifecycle: &Lifecycle, report: &BuildReport) -> Result<(), GatewayError> {
    if !report.outcome.is_final() {
        debug!(run_id = %report.run_id, "Ignoring non-final build report");
        return Ok(());
    }

    match lifecycle.builds().complete(report).await {
        Ok(run) => {
            if run.outcome == report.outcome {
                info!(run_id = %run.run_id, app = %run.app, outcome = %run.outcome, "Build run completed");
            } else {
                debug!(run_id = %run.run_id, "Build run already final, report ignored");
            }
            Ok(())
        }
        Err(GatewayError::NotFound { .. }) => {
            warn!(run_id = %report.run_id, "Report for unknown build run");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
