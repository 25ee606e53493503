//! Navigation bar highlight that follows the active section.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{ActiveSection, SectionId};
use crate::{Error, PageContext};

/// One tab of the navigation bar, linking to `#<section>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NavItem {
    pub name: String,
    pub href: String,
}

impl NavItem {
    pub fn new(name: impl Into<String>, href: impl Into<String>) -> Self {
        Self { name: name.into(), href: href.into() }
    }

    /// Section this tab scrolls to.
    pub fn section_id(&self) -> SectionId {
        SectionId::new(self.href.trim_start_matches('#'))
    }

    /// Home, About, Works, Pricing, Contact.
    pub fn defaults() -> Vec<NavItem> {
        [("Home", "#home"), ("About", "#about"), ("Works", "#works"), ("Pricing", "#pricing"), ("Contact", "#contact")]
            .into_iter()
            .map(|(name, href)| NavItem::new(name, href))
            .collect()
    }
}

/// Horizontal layout box of a rendered tab, relative to the bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TabBox {
    pub left: f64,
    pub width: f64,
}

/// Sliding highlight drawn under the selected tab.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Indicator {
    pub left: f64,
    pub width: f64,
    pub opacity: f64,
}

impl From<TabBox> for Indicator {
    fn from(tab: TabBox) -> Self {
        Self { left: tab.left, width: tab.width, opacity: 1.0 }
    }
}

/// Navigation bar state. Reads the tracker on every render.
#[derive(Debug)]
pub struct NavBar {
    items: Vec<NavItem>,
    active: ActiveSection,
    changes: watch::Receiver<SectionId>,
    indicator: Indicator,
}

impl NavBar {
    /// # Errors
    ///
    /// Returns `Error::Scope` when the page context has no tracker.
    pub fn new(ctx: &PageContext, items: Vec<NavItem>) -> Result<Self, Error> {
        let active = ctx.active_section()?.clone();
        let changes = active.subscribe();
        Ok(Self { items, active, changes, indicator: Indicator::default() })
    }

    pub fn items(&self) -> &[NavItem] {
        &self.items
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    /// Index of the tab matching the active section, if any.
    pub fn selected(&self) -> Option<usize> {
        let active = self.active.get();
        self.items.iter().position(|item| item.section_id() == active)
    }

    /// Whether the active section changed since the last render.
    pub fn needs_render(&self) -> bool {
        self.changes.has_changed().unwrap_or(false)
    }

    /// Wait for the next active-section change.
    pub async fn changed(&mut self) {
        // The sender lives as long as any tracker handle, including ours.
        let _ = self.changes.changed().await;
    }

    /// Position the indicator under the tab for the active section.
    ///
    /// When no tab matches, or the matching tab has no layout box yet, the
    /// indicator keeps its last position.
    pub fn render(&mut self, layout: &[TabBox]) -> Indicator {
        let _ = self.changes.borrow_and_update();
        if let Some(tab) = self.selected().and_then(|i| layout.get(i)) {
            self.indicator = Indicator::from(*tab);
        }
        self.indicator
    }

    /// Slide the indicator under a hovered tab.
    pub fn hover(&mut self, index: usize, layout: &[TabBox]) -> Indicator {
        if let Some(tab) = layout.get(index) {
            self.indicator = Indicator::from(*tab);
        }
        self.indicator
    }

    /// Pointer left the bar: return to the selected tab.
    pub fn leave(&mut self, layout: &[TabBox]) -> Indicator {
        self.render(layout)
    }

    /// Select a tab. Writes its section into the tracker and returns the
    /// section to scroll to.
    pub fn click(&mut self, index: usize) -> Option<SectionId> {
        let section = self.items.get(index)?.section_id();
        self.active.set(section.clone());
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabs() -> Vec<TabBox> {
        vec![
            TabBox { left: 4.0, width: 80.0 },
            TabBox { left: 84.0, width: 90.0 },
            TabBox { left: 174.0, width: 90.0 },
            TabBox { left: 264.0, width: 100.0 },
            TabBox { left: 364.0, width: 110.0 },
        ]
    }

    fn nav() -> (PageContext, NavBar) {
        let ctx = PageContext::new().with_active_section("home");
        let nav = NavBar::new(&ctx, NavItem::defaults()).unwrap();
        (ctx, nav)
    }

    #[test]
    fn test_requires_tracker() {
        let result = NavBar::new(&PageContext::new(), NavItem::defaults());
        assert!(matches!(result, Err(Error::Scope(_))));
    }

    #[test]
    fn test_section_id_from_href() {
        assert_eq!(NavItem::new("Works", "#works").section_id(), "works");
    }

    #[test]
    fn test_render_follows_active_section() {
        let (ctx, mut nav) = nav();
        assert_eq!(nav.render(&tabs()), Indicator { left: 4.0, width: 80.0, opacity: 1.0 });

        ctx.active_section().unwrap().set("works");
        assert!(nav.needs_render());
        assert_eq!(nav.render(&tabs()), Indicator { left: 174.0, width: 90.0, opacity: 1.0 });
        assert!(!nav.needs_render());
    }

    #[test]
    fn test_unmatched_section_keeps_last_position() {
        let (ctx, mut nav) = nav();
        ctx.active_section().unwrap().set("about");
        let before = nav.render(&tabs());

        ctx.active_section().unwrap().set("skills");
        assert_eq!(nav.selected(), None);
        assert_eq!(nav.render(&tabs()), before);
    }

    #[test]
    fn test_missing_layout_keeps_last_position() {
        let (_ctx, mut nav) = nav();
        assert_eq!(nav.render(&[]), Indicator::default());
    }

    #[test]
    fn test_hover_and_leave() {
        let (_ctx, mut nav) = nav();
        nav.render(&tabs());

        assert_eq!(nav.hover(3, &tabs()).left, 264.0);
        assert_eq!(nav.leave(&tabs()).left, 4.0);
    }

    #[test]
    fn test_click_selects_section() {
        let (ctx, mut nav) = nav();
        assert_eq!(nav.click(4), Some(SectionId::from("contact")));
        assert_eq!(ctx.active_section().unwrap().get(), "contact");
        assert_eq!(nav.click(9), None);
    }

    #[tokio::test]
    async fn test_changed_wakes_on_write() {
        let (ctx, mut nav) = nav();
        let active = ctx.active_section().unwrap().clone();
        tokio::spawn(async move {
            active.set("pricing");
        });
        nav.changed().await;
        assert_eq!(nav.selected(), Some(3));
    }
}
