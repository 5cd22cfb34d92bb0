//! HTTP extractor for paginated remote queries
//!
//! One extractor call is exactly one network round trip: the extractor
//! never loops across pages internally. Looping is the pipeline runner's
//! job, which keeps a single call idempotent and resumable at page
//! granularity. The remote connection (url, credential) comes from the
//! per-stage [`Context`], so one extractor instance serves every migration.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::errors::{ExtractError, ExtractResult};
use crate::pipeline::Context;
use crate::query::{Page, PagedQuery};

/// Default per-request timeout for remote queries
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues paginated queries against migration source instances
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: reqwest::Client,
    page_size: u32,
}

impl HttpExtractor {
    pub fn new(page_size: u32) -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExtractError::fatal(format!("failed to build http client: {e}")))?;

        Ok(Self { client, page_size })
    }

    /// Fetch one page of records for the given query at the context's cursor
    ///
    /// The cursor must be empty (first call) or a token previously returned
    /// by this same query; the remote side rejects foreign tokens, which
    /// surfaces here as a fatal schema or 4xx failure rather than wrong
    /// data. The scheme allow-list is checked before any network traffic.
    pub async fn extract(&self, query: &PagedQuery, ctx: &Context) -> ExtractResult<Page> {
        ctx.source.validate_scheme()?;

        let body = query.render_body(
            &ctx.entity.source_path,
            ctx.cursor.as_deref(),
            self.page_size,
        );
        debug!(
            "Requesting page from {} for '{}' at cursor {}",
            ctx.source.url(),
            ctx.entity.source_path,
            ctx.cursor.as_deref().unwrap_or("<first page>")
        );

        let mut request = self
            .client
            .post(ctx.source.url())
            .header("Content-Type", "application/json")
            .body(body);

        if let Some(credential) = ctx.source.credential() {
            request = request.bearer_auth(credential);
        }

        let response = request.send().await.map_err(ExtractError::from_http)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ExtractError::retryable(format!(
                "source returned {status} for {}",
                ctx.source.url()
            )));
        }
        if !status.is_success() {
            return Err(ExtractError::fatal(format!(
                "source returned {status} for {}",
                ctx.source.url()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::fatal(format!("response was not valid json: {e}")))?;

        query.parse_response(&payload)
    }
}
