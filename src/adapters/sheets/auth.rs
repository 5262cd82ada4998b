use error_stack::ResultExt;
use google_sheets4::hyper;
use google_sheets4::oauth2::{self, authenticator::Authenticator};
use thiserror::Error;
use tracing::instrument;

use super::http_client::{self, HttpsConnector};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("could not build the HTTPS client")]
    BuildHttpClient,
    #[error("could not read service account private key at '{0}'")]
    ReadServiceAccountKey(String),
    #[error("could not create an authenticator")]
    BuildAuthenticator,
}

/// HTTP client and service account authenticator, built once and handed to
/// every Google hub.
#[derive(Clone)]
pub struct GoogleSession {
    pub client: hyper::Client<HttpsConnector>,
    pub auth: Authenticator<HttpsConnector>,
}

impl std::fmt::Debug for GoogleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleSession")
    }
}

#[instrument]
pub async fn read_service_account_key(
    credential_path: &str,
) -> error_stack::Result<oauth2::ServiceAccountKey, AuthError> {
    oauth2::read_service_account_key(credential_path)
        .await
        .change_context_lazy(|| AuthError::ReadServiceAccountKey(credential_path.to_owned()))
        .attach_printable("Please provide a valid service account private key to enable Google Sheets and Drive access.")
}

#[instrument(skip(secret, client))]
pub async fn auth(
    secret: oauth2::ServiceAccountKey,
    client: hyper::Client<HttpsConnector>,
) -> error_stack::Result<Authenticator<HttpsConnector>, AuthError> {
    oauth2::ServiceAccountAuthenticator::with_client(secret, client)
        .build()
        .await
        .change_context(AuthError::BuildAuthenticator)
}

#[instrument(name = "auth::session")]
pub async fn session(credential_path: &str) -> error_stack::Result<GoogleSession, AuthError> {
    let secret = read_service_account_key(credential_path).await?;
    let client = http_client::http_client().change_context(AuthError::BuildHttpClient)?;
    let auth = auth(secret, client.clone()).await?;
    Ok(GoogleSession { client, auth })
}
