use error_stack::ResultExt;
use google_sheets4::{api::ValueRange, Sheets};
use std::fmt::Debug;
use thiserror::Error;
use tracing::instrument;

use crate::domain::sheets::a1_notation::A1Notation;

use super::{auth::GoogleSession, http_client::HttpsConnector};

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

pub struct SpreadsheetManager {
    hub: Sheets<HttpsConnector>,
}

impl Debug for SpreadsheetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpreadsheetManager")
    }
}

#[derive(Error, Debug)]
pub enum SpreadsheetManagerError {
    #[error("Failed to fetch range")]
    FailedToFetchRange,
    #[error("Failed to write range")]
    FailedToWriteRange,
    #[error("Failed to append range")]
    FailedToAppendRange,
}

impl SpreadsheetManager {
    pub fn new(session: GoogleSession) -> Self {
        SpreadsheetManager {
            hub: Sheets::new(session.client, session.auth),
        }
    }

    #[instrument]
    pub async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> error_stack::Result<ValueRange, SpreadsheetManagerError> {
        let response = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .doit()
            .await
            .change_context(SpreadsheetManagerError::FailedToFetchRange)
            .attach_printable_lazy(|| {
                format!("Failed to fetch range {} of {}", range, spreadsheet_id)
            })?;

        Ok(response.1)
    }

    #[instrument(skip(value_range))]
    pub async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        value_range: ValueRange,
    ) -> error_stack::Result<(), SpreadsheetManagerError> {
        self.hub
            .spreadsheets()
            .values_update(value_range, spreadsheet_id, range.as_ref())
            .value_input_option(VALUE_INPUT_OPTION)
            .doit()
            .await
            .map(|_| ())
            .change_context(SpreadsheetManagerError::FailedToWriteRange)
            .attach_printable_lazy(|| {
                format!("Failed to write to range {} of {}", range, spreadsheet_id)
            })
    }

    #[instrument(skip(value_range))]
    pub async fn append_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        value_range: ValueRange,
    ) -> error_stack::Result<(), SpreadsheetManagerError> {
        self.hub
            .spreadsheets()
            .values_append(value_range, spreadsheet_id, range.as_ref())
            .value_input_option(VALUE_INPUT_OPTION)
            .doit()
            .await
            .map(|_| ())
            .change_context(SpreadsheetManagerError::FailedToAppendRange)
            .attach_printable_lazy(|| {
                format!("Failed to append to range {} of {}", range, spreadsheet_id)
            })
    }
}
