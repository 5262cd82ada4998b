use clap::{Args, Parser, Subcommand};

use crate::{config::app_config::AppConfig, ports::command_handler::Command};

#[derive(Parser, Debug)]
#[command(
    name = "sheet-merger",
    author,
    version,
    about = "Merge and back up spreadsheets listed in an index sheet."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Append the rows of the diff tables to the base tables.
    Merge(MergeArgs),
    /// Copy an index spreadsheet and everything it references.
    Backup(BackupArgs),
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Spreadsheet holding the base index sheet.
    #[arg(long, env = "BASE_SHEET_KEY")]
    pub base_sheet_key: Option<String>,
    /// Spreadsheet holding the diff index sheet.
    #[arg(long, env = "DIFF_SHEET_KEY")]
    pub diff_sheet_key: Option<String>,
    /// Service account key file.
    #[arg(long, env = "CREDENTIAL")]
    pub credential: Option<String>,
    #[arg(long, env = "INDEX_SHEET_NAME")]
    pub index_sheet_name: Option<String>,
    /// Tables to merge, in order.
    #[arg(value_name = "TABLE", required = true)]
    pub sheet_names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[arg(long, env = "INDEX_SHEET_KEY")]
    pub index_sheet_key: Option<String>,
    /// Folder containing the backup folder.
    #[arg(long, env = "BASE_FOLDER_ID")]
    pub base_folder_id: Option<String>,
    /// Service account key file.
    #[arg(long, env = "CREDENTIAL")]
    pub credential: Option<String>,
    /// Name of the backup folder inside the base folder.
    #[arg(long, env = "DST_BASE_FOLDER_NAME")]
    pub dst_base_folder_name: Option<String>,
    #[arg(long, env = "INDEX_SHEET_NAME")]
    pub index_sheet_name: Option<String>,
}

/// Everything `main` needs to run one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub credential: String,
    pub index_sheet_name: String,
    pub backup_folder_name: String,
    pub command: Command,
}

// An empty value, from a flag or its env var, counts as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

impl Cli {
    /// Applies the flags on top of `config`. `label` names the backup run
    /// folder and is ignored by `merge`.
    pub fn into_invocation(self, config: &AppConfig, label: String) -> Invocation {
        match self.command {
            CliCommand::Merge(args) => Invocation {
                credential: non_empty(args.credential).unwrap_or_else(|| config.credential.clone()),
                index_sheet_name: non_empty(args.index_sheet_name)
                    .unwrap_or_else(|| config.index_sheet_name.clone()),
                backup_folder_name: config.backup_folder_name.clone(),
                command: Command::Merge {
                    base_sheet_key: args.base_sheet_key.unwrap_or_default(),
                    diff_sheet_key: args.diff_sheet_key.unwrap_or_default(),
                    sheet_names: args.sheet_names,
                },
            },
            CliCommand::Backup(args) => Invocation {
                credential: non_empty(args.credential).unwrap_or_else(|| config.credential.clone()),
                index_sheet_name: non_empty(args.index_sheet_name)
                    .unwrap_or_else(|| config.index_sheet_name.clone()),
                backup_folder_name: non_empty(args.dst_base_folder_name)
                    .unwrap_or_else(|| config.backup_folder_name.clone()),
                command: Command::Backup {
                    index_sheet_key: args.index_sheet_key.unwrap_or_default(),
                    base_folder_id: args.base_folder_id.unwrap_or_default(),
                    label,
                },
            },
        }
    }
}
