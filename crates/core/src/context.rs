//! Page-level context handed to components at construction.
//!
//! Providers are established once, at the root of the page, before any
//! section or navigation component is built. Components look them up here
//! and fail with `Error::Scope` if the root never established them.

use crate::loading::LoadingState;
use crate::section::{ActiveSection, SectionId};
use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct PageContext {
    active_section: Option<ActiveSection>,
    loading: Option<LoadingState>,
}

impl PageContext {
    /// Empty context: no providers established yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish the active-section tracker with its initial section.
    pub fn with_active_section(mut self, initial: impl Into<SectionId>) -> Self {
        self.active_section = Some(ActiveSection::new(initial));
        self
    }

    /// Establish the loading provider.
    pub fn with_loading(mut self, loading: LoadingState) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn active_section(&self) -> Result<&ActiveSection, Error> {
        self.active_section
            .as_ref()
            .ok_or_else(|| Error::Scope("active section must be used within an active-section provider".into()))
    }

    pub fn loading(&self) -> Result<&LoadingState, Error> {
        self.loading
            .as_ref()
            .ok_or_else(|| Error::Scope("loading state must be used within a loading provider".into()))
    }
}
