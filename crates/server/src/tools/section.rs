//! section_scroll tool implementation.
//!
//! Feeds one frame of page geometry through the visibility service. Section
//! boundaries that cross their threshold write the active section.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use folio_core::Error;
use folio_core::section::{Rect, SectionLayout};

use super::json_result;
use crate::site::Site;

/// Input parameters for the section_scroll tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionScrollParams {
    /// The visible viewport in page coordinates.
    pub viewport: Rect,

    /// Current boxes of the page sections. Sections left out count as
    /// not intersecting.
    pub sections: Vec<SectionLayout>,
}

/// Output from the section_scroll tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionScrollOutput {
    /// Number of in-view transitions delivered to boundaries.
    pub transitions: usize,
    pub active_section: String,
}

pub async fn scroll_impl(site: &Site, params: SectionScrollParams) -> Result<CallToolResult, McpError> {
    if params.viewport.width <= 0.0 || params.viewport.height <= 0.0 {
        return Err(Error::InvalidInput("viewport must have a positive size".into()).into());
    }

    let transitions = site.visibility().process(params.viewport, &params.sections);
    let active_section = site.page().active_section()?.get().to_string();
    tracing::debug!(transitions, %active_section, "processed scroll frame");

    Ok(json_result(&SectionScrollOutput { transitions, active_section })?)
}
