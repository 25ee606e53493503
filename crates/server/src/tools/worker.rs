//! Worker lifecycle tools: worker_status, worker_update, worker_clear_cache.

use std::time::Duration;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use folio_client::RegistrationStatus;

use super::json_result;
use crate::site::Site;

/// Updates show the loading indicator for at least this long.
const UPDATE_MIN_DURATION: Duration = Duration::from_millis(500);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusOutput {
    #[serde(flatten)]
    pub registration: RegistrationStatus,
    pub active_section: String,
    /// Section boundaries with a live visibility observer.
    pub observed_sections: usize,
    pub is_loading: bool,
    pub is_initial_load: bool,
}

/// Output from the worker_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerUpdateOutput {
    /// Whether a waiting worker was promoted.
    pub updated: bool,
}

/// Output from the worker_clear_cache tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerClearCacheOutput {
    /// Number of cache generations deleted.
    pub deleted: u64,
}

pub async fn status_impl(site: &Site) -> Result<CallToolResult, McpError> {
    let registration = site.registration().status().await?;
    let loading = site.page().loading()?;
    let output = WorkerStatusOutput {
        registration,
        active_section: site.page().active_section()?.get().to_string(),
        observed_sections: site.observing(),
        is_loading: loading.is_loading(),
        is_initial_load: loading.is_initial_load(),
    };
    Ok(json_result(&output)?)
}

pub async fn update_impl(site: &Site) -> Result<CallToolResult, McpError> {
    let loading = site.page().loading()?;
    let updated = loading
        .execute_with_loading(site.registration().update(), UPDATE_MIN_DURATION, UPDATE_TIMEOUT)
        .await?;
    Ok(json_result(&WorkerUpdateOutput { updated })?)
}

pub async fn clear_cache_impl(site: &Site) -> Result<CallToolResult, McpError> {
    let deleted = site.registration().clear_cache().await?;
    Ok(json_result(&WorkerClearCacheOutput { deleted })?)
}
