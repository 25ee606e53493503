//! Section boundaries: the only link between page sections and the tracker.

use super::visibility::{Observation, ViewportMargin, VisibilityService};
use super::SectionId;
use crate::{Error, PageContext};

/// Default fraction of a section's box that must be visible.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Visibility boundary wrapped around one page section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionBoundary {
    section_id: SectionId,
    threshold: f64,
    margin: ViewportMargin,
}

impl SectionBoundary {
    pub fn new(section_id: impl Into<SectionId>) -> Self {
        Self { section_id: section_id.into(), threshold: DEFAULT_THRESHOLD, margin: ViewportMargin::default() }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_margin(mut self, margin: ViewportMargin) -> Self {
        self.margin = margin;
        self
    }

    pub fn section_id(&self) -> &SectionId {
        &self.section_id
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn margin(&self) -> ViewportMargin {
        self.margin
    }

    /// Start reporting this section to the page's active-section tracker.
    ///
    /// Entering view writes the section id; leaving view writes nothing, so
    /// the last section that came into view stays active.
    ///
    /// # Errors
    ///
    /// Returns `Error::Scope` when the page context has no tracker, and
    /// `Error::InvalidInput` for a threshold outside `[0,1]`. A missing
    /// visibility primitive is not an error: the boundary mounts without
    /// observing and the tracker keeps its value.
    pub fn mount(self, ctx: &PageContext, service: &VisibilityService) -> Result<MountedBoundary, Error> {
        let tracker = ctx.active_section()?.clone();
        let id = self.section_id.clone();

        let observation = match service.observe(self.section_id.clone(), self.threshold, self.margin, move |entry| {
            if entry.in_view {
                tracker.set(id.clone());
            }
        }) {
            Ok(observation) => Some(observation),
            Err(Error::ObserverSetup(reason)) => {
                tracing::warn!(section = %self.section_id, "section will not report visibility: {reason}");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(MountedBoundary { boundary: self, observation })
    }
}

/// A boundary that is currently mounted. Dropping it tears down its observer.
#[derive(Debug)]
pub struct MountedBoundary {
    boundary: SectionBoundary,
    observation: Option<Observation>,
}

impl MountedBoundary {
    pub fn boundary(&self) -> &SectionBoundary {
        &self.boundary
    }

    pub fn is_observing(&self) -> bool {
        self.observation.is_some()
    }

    /// Unmount explicitly; equivalent to dropping.
    pub fn unmount(self) -> SectionBoundary {
        self.boundary
    }
}
