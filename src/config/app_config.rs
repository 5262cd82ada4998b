use config::Config;
use error_stack::ResultExt;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "SheetMerger";
pub const DEFAULT_CREDENTIAL: &str = "credential.json";
pub const DEFAULT_INDEX_SHEET_NAME: &str = "table_map";
pub const DEFAULT_BACKUP_FOLDER_NAME: &str = "backup";
pub const DEFAULT_LOG_FILE: &str = "sheet_merger.log";

/// Settings shared by every subcommand. Command line flags override them.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the service account key.
    pub credential: String,
    pub index_sheet_name: String,
    pub backup_folder_name: String,
    pub log_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credential: DEFAULT_CREDENTIAL.to_owned(),
            index_sheet_name: DEFAULT_INDEX_SHEET_NAME.to_owned(),
            backup_folder_name: DEFAULT_BACKUP_FOLDER_NAME.to_owned(),
            log_file: DEFAULT_LOG_FILE.to_owned(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("[CONFIG ERROR] Error reading config file '{0}'")]
    Read(String),
    #[error("[CONFIG ERROR] Failed to deserialize config file '{0}'")]
    Deserialize(String),
}

impl AppConfig {
    /// Loads `CONFIG_PATH` (default `SheetMerger`, extension optional) on top
    /// of the built-in defaults, then `SHEET_MERGER_*` environment variables.
    /// A missing file is not an error.
    pub fn load() -> error_stack::Result<Self, AppConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> error_stack::Result<Self, AppConfigError> {
        let defaults = AppConfig::default();
        let config = Config::builder()
            .set_default("credential", defaults.credential)
            .and_then(|builder| builder.set_default("index_sheet_name", defaults.index_sheet_name))
            .and_then(|builder| {
                builder.set_default("backup_folder_name", defaults.backup_folder_name)
            })
            .and_then(|builder| builder.set_default("log_file", defaults.log_file))
            .change_context_lazy(|| AppConfigError::Read(config_path.to_owned()))?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SHEET_MERGER"))
            .build()
            .change_context_lazy(|| AppConfigError::Read(config_path.to_owned()))?;

        config
            .try_deserialize::<AppConfig>()
            .change_context_lazy(|| AppConfigError::Deserialize(config_path.to_owned()))
            .attach_printable("Make sure every value in the configuration file is a string.")
    }
}
