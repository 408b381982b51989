use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response,
};
use shared::{
    domain::TransactionId,
    error::{ApiError, ApiException},
    protocol::LedgerResponse,
};
use tracing::debug;
use url::Url;

use crate::{config::Session, import::ImportFile};

/// Boundary to the remote ledger API.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// `GET /transactions`: balance and transaction list from one response.
    async fn fetch_ledger(&self) -> Result<LedgerResponse>;
    /// `DELETE /transactions/{id}`.
    async fn delete_transaction(&self, id: &TransactionId) -> Result<()>;
    /// `POST /transactions/import` with a single-file multipart body.
    /// Returns how many transactions the service reports as created.
    async fn import_file(&self, file: ImportFile) -> Result<usize>;
}

pub struct HttpTransactionService {
    http: Client,
    session: Session,
}

impl HttpTransactionService {
    pub fn new(session: Session, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Appends `segments` to the api url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(self.session.api_url())?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("api url '{}' cannot be a base", self.session.api_url()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        Ok(match self.session.auth_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }
}

/// Turns a non-success response into an [`ApiException`], keeping the
/// service's own message when the body carries one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = ApiError::from_body(&body)
        .map(|api_error| api_error.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    Err(ApiException::new(status.as_u16(), message).into())
}

/// An import reply with no body, `null` or `false` means nothing was accepted.
fn is_empty_reply(body: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Null | serde_json::Value::Bool(false)) => true,
        Ok(_) => false,
        Err(_) => body.iter().all(u8::is_ascii_whitespace),
    }
}

fn imported_count(body: &[u8]) -> usize {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(created)) => created.len(),
        _ => 0,
    }
}

#[async_trait]
impl TransactionService for HttpTransactionService {
    async fn fetch_ledger(&self) -> Result<LedgerResponse> {
        let response = self.request(Method::GET, &["transactions"])?.send().await?;
        let ledger: LedgerResponse = check_status(response)
            .await?
            .json()
            .await
            .context("malformed ledger payload")?;
        debug!(
            transactions = ledger.transactions.len(),
            "fetched ledger from service"
        );
        Ok(ledger)
    }

    async fn delete_transaction(&self, id: &TransactionId) -> Result<()> {
        let response = self
            .request(Method::DELETE, &["transactions", id.as_str()])?
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn import_file(&self, file: ImportFile) -> Result<usize> {
        let mime = mime_guess::from_path(&file.name).first_or_octet_stream();
        let part = Part::bytes(file.bytes)
            .file_name(file.name.clone())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part("file", part);

        let response = self
            .request(Method::POST, &["transactions", "import"])?
            .multipart(form)
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        if is_empty_reply(&body) {
            return Err(anyhow!("service returned an empty reply for {}", file.name));
        }
        let imported = imported_count(&body);
        debug!(file = %file.name, imported, "service accepted import file");
        Ok(imported)
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
