use std::sync::Arc;

use clap::Parser;
use sheet_merger::{
    adapters::google_document_store::GoogleDocumentStore,
    cli::{args::Cli, cli_adapter::CliAdapter},
    config::app_config::AppConfig,
    prettyprint::prettyprint::PrettyFormatter,
};
use tracing::{error, info, instrument};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

const BACKUP_LABEL_FORMAT: &str = "%Y%m%d%H%M%S";

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load().map_err(|report| format!("{:?}", report))?;

    setup_tracing(&config.log_file)?;
    setup_panic_hook();

    let label = chrono::Local::now().format(BACKUP_LABEL_FORMAT).to_string();
    let invocation = cli.into_invocation(&config, label);

    info!("Starting sheet-merger {}", invocation.command.name());

    let store = GoogleDocumentStore::connect(&invocation.credential)
        .await
        .map_err(|report| {
            error!("Failed to connect: {:?}", report);
            format!("Failed to connect: {:?}", report)
        })?;
    let cli_adapter = CliAdapter::new(
        Arc::new(store),
        &invocation.index_sheet_name,
        &invocation.backup_folder_name,
    );

    match cli_adapter.run(invocation.command).await {
        Ok(()) => {
            info!("CLI execution completed successfully");
            Ok(())
        }
        Err(report) => Err(format!("Command failed: {:?}", report).into()),
    }
}

fn setup_tracing(log_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let indicatif_layer = IndicatifLayer::new();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(indicatif_layer.get_stderr_writer());

    let log_file_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(false))
        .with_writer(std::fs::File::create(log_file)?)
        .with_ansi(false);

    Registry::default()
        .with(
            tracing_subscriber::filter::Targets::new()
                .with_target("sheet_merger", tracing::Level::TRACE),
        )
        .with(indicatif_layer)
        .with(log_file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
