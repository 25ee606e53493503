//! Active-section tracking.
//!
//! Page sections wrap themselves in a [`SectionBoundary`]; boundaries feed
//! viewport crossings from a [`VisibilityService`] into the page's
//! [`ActiveSection`], and the [`NavBar`] reads it back to place its
//! highlight indicator.

pub mod boundary;
pub mod nav;
pub mod tracker;
pub mod visibility;

pub use boundary::{MountedBoundary, SectionBoundary};
pub use nav::{Indicator, NavBar, NavItem, TabBox};
pub use tracker::{ActiveSection, SectionId};
pub use visibility::{
    IntersectionEntry, MarginValue, Observation, Rect, SectionLayout, ViewportMargin, VisibilityService,
};
