//! Command-line monitor for a generation job.
//!
//! Connects the channel client to a job's prediction stream, folds the
//! events into a [`ResultAggregator`], and logs the derived counts on
//! every change. Stands in for the presentation layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumen_channel::client::{ChannelClient, ChannelConfig};
use lumen_channel::events::ChannelEvent;
use lumen_channel::ws::WsTransport;
use lumen_core::types::validate_job_id;
use lumen_results::ResultAggregator;

mod config;

use config::MonitorConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumen_monitor=debug,lumen_channel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env();
    let Some(job_id) = config.job_id.clone() else {
        tracing::error!("No job id given; pass one as the first argument or set LUMEN_JOB_ID");
        std::process::exit(1);
    };
    if let Err(e) = validate_job_id(&job_id) {
        tracing::error!(error = %e, "Refusing to connect");
        std::process::exit(1);
    }

    let (client, mut events) = ChannelClient::new(
        WsTransport::new(),
        ChannelConfig::new(config.base_url.clone()),
    );
    let mut results = ResultAggregator::new();

    tracing::info!(job_id = %job_id, base_url = %config.base_url, "Monitoring job");
    client.connect(&job_id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                client.disconnect();
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ChannelEvent::Message(inbound) => {
                        if results.apply(&inbound) {
                            tracing::info!(
                                total = results.total(),
                                processing = results.processing_count(),
                                succeeded = results.succeeded_count(),
                                failed = results.failed_count(),
                                "Results updated",
                            );
                        }
                    }
                    ChannelEvent::Connected { job_id } => {
                        tracing::info!(job_id = %job_id, "Channel connected");
                    }
                    ChannelEvent::Disconnected { job_id, clean } => {
                        tracing::info!(job_id = %job_id, clean, "Channel disconnected");
                        if clean {
                            break;
                        }
                    }
                    ChannelEvent::TransportError { message } => {
                        tracing::warn!(message = %message, "Transport error");
                    }
                    ChannelEvent::ReconnectsExhausted { job_id, attempts } => {
                        tracing::error!(job_id = %job_id, attempts, "Gave up reconnecting");
                        break;
                    }
                }
            }
        }
    }

    for record in results.succeeded() {
        tracing::info!(
            prediction_id = %record.prediction_id,
            outputs = ?record.outputs,
            "Final output",
        );
    }
}
