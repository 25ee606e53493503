//! site_fetch tool implementation.
//!
//! Sends a page request through the registration, so it is answered by the
//! controlling worker (cache, network or offline fallback).

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use folio_client::fetch::{Method, resolve};
use folio_client::{Request, ResponseSource};
use folio_core::Error;

use super::json_result;
use crate::site::Site;

/// Bodies longer than this are cut in the tool output.
const MAX_BODY_CHARS: usize = 4096;

/// Input parameters for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Path relative to the site origin (e.g. "/comp 2.webp") or an absolute URL.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional Accept header. Include "text/html" to request a document.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    /// "basic" for same-origin, "cors" for cross-origin.
    pub response_type: String,
    /// "network", "cache" or "fallback".
    pub source: String,
    pub content_type: Option<String>,
    pub bytes: usize,
    /// Body as text, truncated.
    pub body: String,
    pub truncated: bool,
}

fn source_name(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
        ResponseSource::Fallback => "fallback",
    }
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(site: &Site, params: SiteFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(site.origin(), &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let method: Method = params
        .method
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;

    let mut request = Request::get(url);
    request.method = method;
    if let Some(accept) = params.accept.as_deref() {
        request = request.accept(accept);
    }

    let response = site.registration().fetch(request.clone()).await?;

    let text = String::from_utf8_lossy(&response.body);
    let truncated = text.chars().count() > MAX_BODY_CHARS;
    let body = if truncated { text.chars().take(MAX_BODY_CHARS).collect() } else { text.into_owned() };

    let output = SiteFetchOutput {
        url: request.url.to_string(),
        status: response.status.as_u16(),
        response_type: response.response_type.to_string(),
        source: source_name(response.source).to_string(),
        content_type: response.content_type().map(str::to_string),
        bytes: response.body.len(),
        body,
        truncated,
    };
    Ok(json_result(&output)?)
}
