use std::sync::Arc;

use error_stack::Report;
use tracing::{error, info, instrument};

use crate::{
    application::{backup::BackupOrchestrator, merge::MergeOrchestrator},
    domain::error::SheetMergerError,
    ports::{
        command_handler::{Command, CommandError, CommandHandler},
        document_store::DocumentStore,
    },
};

/// Rejected input becomes `InvalidCommand`, anything else `ExecutionFailed`.
fn command_error(report: Report<SheetMergerError>, details: String) -> Report<CommandError> {
    let error = if report.current_context().is_validation() {
        CommandError::InvalidCommand { details }
    } else {
        CommandError::ExecutionFailed { details }
    };
    report.change_context(error)
}

pub struct CliAdapter {
    merge: MergeOrchestrator,
    backup: BackupOrchestrator,
}

impl std::fmt::Debug for CliAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliAdapter")
            .field("merge", &self.merge)
            .field("backup", &self.backup)
            .finish()
    }
}

impl CliAdapter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        index_sheet_name: &str,
        backup_folder_name: &str,
    ) -> Self {
        Self {
            merge: MergeOrchestrator::new(Arc::clone(&store), index_sheet_name),
            backup: BackupOrchestrator::new(store, index_sheet_name, backup_folder_name),
        }
    }

    /// Runs `command` and logs the outcome.
    #[instrument(skip(self))]
    pub async fn run(&self, command: Command) -> error_stack::Result<(), CommandError> {
        let name = command.name();
        match self.handle(command).await {
            Ok(result) => {
                info!("{}", result);
                Ok(())
            }
            Err(report) => {
                error!("❌ {} failed: {:?}", name, report);
                Err(report)
            }
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for CliAdapter {
    #[instrument(skip(self))]
    async fn handle(&self, command: Command) -> error_stack::Result<String, CommandError> {
        match command {
            Command::Merge {
                base_sheet_key,
                diff_sheet_key,
                sheet_names,
            } => {
                self.merge
                    .merge(&base_sheet_key, &diff_sheet_key, sheet_names.as_slice())
                    .await
                    .map_err(|report| {
                        command_error(
                            report,
                            format!("merge of {} into {} failed", diff_sheet_key, base_sheet_key),
                        )
                    })?;

                Ok(format!(
                    "✅ merged {} table(s) into {}: {}",
                    sheet_names.len(),
                    base_sheet_key,
                    sheet_names.join(", ")
                ))
            }
            Command::Backup {
                index_sheet_key,
                base_folder_id,
                label,
            } => {
                self.backup
                    .backup(&index_sheet_key, &base_folder_id, &label)
                    .await
                    .map_err(|report| {
                        command_error(report, format!("backup of {} failed", index_sheet_key))
                    })?;

                Ok(format!("✅ backup {} of {} completed", label, index_sheet_key))
            }
        }
    }
}
