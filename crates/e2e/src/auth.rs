use tracing::debug;

use decl_e2e_client::App;
use decl_e2e_core::{AuthEntry, GlobalConfig, is_truthy};

use crate::processor::ProcessError;

/// Exchange an auth entry for the value of the `Authorization` header.
///
/// Tokens are used as-is. Credentials are posted as JSON to `auth.url`; a
/// truthy `error` field in the response body fails with its raw value,
/// otherwise the token is read from `auth.token_field`.
pub async fn authenticate(
    app: &App,
    entry: &AuthEntry,
    config: &GlobalConfig,
) -> Result<String, ProcessError> {
    let credentials = match entry {
        AuthEntry::Token(token) => {
            debug!("auth token provided, skipping login request");
            return Ok(token.clone());
        }
        AuthEntry::Credentials(credentials) => credentials,
    };

    let url = config
        .auth
        .url
        .as_deref()
        .ok_or(ProcessError::MissingLoginUrl)?;
    debug!(%url, "sending login request");

    let response = app
        .post(url)
        .set("Accept", "application/json")
        .set("Content-Type", "application/json")
        .send(credentials)
        .end()
        .await?;

    let error = &response.body["error"];
    if is_truthy(error) {
        debug!(%url, status = response.status, "login request failed");
        return Err(ProcessError::Authentication(error.clone()));
    }

    let field = config.auth.token_field.as_str();
    match &response.body[field] {
        serde_json::Value::String(token) => {
            debug!("login request succeeded");
            Ok(token.clone())
        }
        serde_json::Value::Number(token) => {
            debug!("login request succeeded");
            Ok(token.to_string())
        }
        _ => Err(ProcessError::MissingToken {
            field: field.to_string(),
        }),
    }
}
