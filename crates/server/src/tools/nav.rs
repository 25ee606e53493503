//! Navigation bar tools: nav_highlight and nav_click.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use folio_core::Error;
use folio_core::section::{Indicator, TabBox};

use super::json_result;
use crate::site::Site;

/// Input parameters for the nav_highlight tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavHighlightParams {
    /// Rendered boxes of the tabs, in nav item order.
    pub tabs: Vec<TabBox>,

    /// Index of a hovered tab. The indicator follows it instead of the
    /// active section.
    #[serde(default)]
    pub hover: Option<usize>,
}

/// Output from the nav_highlight tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavHighlightOutput {
    pub active_section: String,
    /// Index of the tab matching the active section.
    pub selected: Option<usize>,
    pub indicator: Indicator,
}

/// Input parameters for the nav_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavClickParams {
    /// Index of the clicked tab.
    pub index: usize,
}

/// Output from the nav_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavClickOutput {
    /// Section to scroll into view.
    pub scroll_to: String,
    pub active_section: String,
}

pub async fn highlight_impl(site: &Site, params: NavHighlightParams) -> Result<CallToolResult, McpError> {
    let mut nav = site.nav().lock().await;
    let indicator = match params.hover {
        Some(index) => nav.hover(index, &params.tabs),
        None => nav.leave(&params.tabs),
    };

    let output = NavHighlightOutput {
        active_section: site.page().active_section()?.get().to_string(),
        selected: nav.selected(),
        indicator,
    };
    Ok(json_result(&output)?)
}

pub async fn click_impl(site: &Site, params: NavClickParams) -> Result<CallToolResult, McpError> {
    let mut nav = site.nav().lock().await;
    let section = nav
        .click(params.index)
        .ok_or_else(|| Error::InvalidInput(format!("no nav item at index {}", params.index)))?;

    let output = NavClickOutput {
        scroll_to: section.to_string(),
        active_section: site.page().active_section()?.get().to_string(),
    };
    Ok(json_result(&output)?)
}
