//! MCP tool implementations.
//!
//! This module contains all tools exposed by the folio-site server.

pub mod nav;
pub mod section;
pub mod site_fetch;
pub mod worker;

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use folio_core::Error;

pub use nav::{NavClickParams, NavHighlightParams};
pub use section::SectionScrollParams;
pub use site_fetch::SiteFetchParams;

/// Wrap a tool output as pretty-printed JSON text content.
fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let text = result.content[0].as_text().expect("text content");
    serde_json::from_str(&text.text).expect("json output")
}
