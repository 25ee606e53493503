//! Viewport intersection tracking for page sections.
//!
//! A [`VisibilityService`] plays the part of the host's intersection
//! observer: observers register a target, a threshold and a viewport
//! margin, and the service calls them back whenever the target's in-view
//! state flips during [`VisibilityService::process`]. Callbacks are
//! delivered in registration order, outside the registry lock, so a
//! callback may register or drop observers.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::SectionId;
use crate::Error;

/// Axis-aligned box in CSS pixels, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlap of two boxes. Boxes that only touch produce a zero-area overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// One side of a viewport margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginValue {
    Px(f64),
    /// Percentage of the viewport extent along the same axis.
    Percent(f64),
}

impl MarginValue {
    fn resolve(self, extent: f64) -> f64 {
        match self {
            MarginValue::Px(px) => px,
            MarginValue::Percent(pct) => extent * pct / 100.0,
        }
    }
}

impl FromStr for MarginValue {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("invalid margin value {token:?}: expected px or %"));
        if let Some(px) = token.strip_suffix("px") {
            return px.parse().map(MarginValue::Px).map_err(|_| invalid());
        }
        if let Some(pct) = token.strip_suffix('%') {
            return pct.parse().map(MarginValue::Percent).map_err(|_| invalid());
        }
        if token == "0" {
            return Ok(MarginValue::Px(0.0));
        }
        Err(invalid())
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginValue::Px(px) => write!(f, "{px}px"),
            MarginValue::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Four-sided inset applied to the viewport before intersection tests.
///
/// Negative values shrink the effective viewport, positive values grow it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMargin {
    pub top: MarginValue,
    pub right: MarginValue,
    pub bottom: MarginValue,
    pub left: MarginValue,
}

impl ViewportMargin {
    pub const ZERO: ViewportMargin = ViewportMargin {
        top: MarginValue::Px(0.0),
        right: MarginValue::Px(0.0),
        bottom: MarginValue::Px(0.0),
        left: MarginValue::Px(0.0),
    };

    /// Parse CSS margin shorthand with one to four values.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let values = input
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<MarginValue>, _>>()?;

        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "viewport margin {input:?} must have one to four values"
                )));
            }
        };

        Ok(Self { top, right, bottom, left })
    }

    /// Effective root box for intersection tests.
    pub fn apply(&self, viewport: Rect) -> Rect {
        let top = self.top.resolve(viewport.height);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        let right = self.right.resolve(viewport.width);
        Rect::new(
            viewport.x - left,
            viewport.y - top,
            viewport.width + left + right,
            viewport.height + top + bottom,
        )
    }
}

impl Default for ViewportMargin {
    fn default() -> Self {
        Self {
            top: MarginValue::Px(-100.0),
            right: MarginValue::Px(0.0),
            bottom: MarginValue::Px(-100.0),
            left: MarginValue::Px(0.0),
        }
    }
}

impl FromStr for ViewportMargin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ViewportMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

/// Where a section currently sits in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionLayout {
    pub section: SectionId,
    pub rect: Rect,
}

/// Result of one intersection test, handed to observer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub target: SectionId,
    pub is_intersecting: bool,
    /// Visible fraction of the target's area.
    pub ratio: f64,
    /// `is_intersecting && ratio >= threshold`.
    pub in_view: bool,
}

/// Visible fraction of `target` inside `root`, and whether they intersect at all.
pub fn intersection_ratio(target: Rect, root: Rect) -> (bool, f64) {
    match target.intersection(&root) {
        None => (false, 0.0),
        Some(overlap) => {
            let area = target.area();
            let ratio = if area > 0.0 { (overlap.area() / area).min(1.0) } else { 1.0 };
            (true, ratio)
        }
    }
}

type Callback = Arc<dyn Fn(&IntersectionEntry) + Send + Sync>;

struct Observer {
    id: u64,
    target: SectionId,
    threshold: f64,
    margin: ViewportMargin,
    in_view: bool,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: Vec<Observer>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Callback-based visibility detection.
#[derive(Clone)]
pub struct VisibilityService {
    registry: Option<Arc<Mutex<Registry>>>,
}

impl VisibilityService {
    pub fn new() -> Self {
        Self { registry: Some(Arc::new(Mutex::new(Registry::default()))) }
    }

    /// A service for an environment without an intersection primitive.
    /// Every `observe` call fails with `Error::ObserverSetup`.
    pub fn unavailable() -> Self {
        Self { registry: None }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_some()
    }

    /// Register a callback for in-view transitions of `target`.
    ///
    /// The target starts out of view. Dropping the returned [`Observation`]
    /// unsubscribes.
    pub fn observe<F>(
        &self, target: SectionId, threshold: f64, margin: ViewportMargin, callback: F,
    ) -> Result<Observation, Error>
    where
        F: Fn(&IntersectionEntry) + Send + Sync + 'static,
    {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| Error::ObserverSetup("intersection observation is not supported here".into()))?;

        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidInput(format!("threshold {threshold} must be within [0, 1]")));
        }

        let mut guard = lock(registry);
        let id = guard.next_id;
        guard.next_id += 1;
        guard.observers.push(Observer {
            id,
            target: target.clone(),
            threshold,
            margin,
            in_view: false,
            callback: Arc::new(callback),
        });
        tracing::trace!(%target, id, threshold, %margin, "observing section");

        Ok(Observation { id, registry: Arc::downgrade(registry) })
    }

    /// Run intersection tests for every observer against the given viewport
    /// and layout, calling back observers whose in-view state flipped.
    ///
    /// Returns the number of callbacks delivered.
    pub fn process(&self, viewport: Rect, layout: &[SectionLayout]) -> usize {
        let Some(registry) = &self.registry else {
            return 0;
        };

        let pending: Vec<(Callback, IntersectionEntry)> = {
            let mut guard = lock(registry);
            guard
                .observers
                .iter_mut()
                .filter_map(|observer| {
                    let (is_intersecting, ratio) = layout
                        .iter()
                        .find(|l| l.section == observer.target)
                        .map(|l| intersection_ratio(l.rect, observer.margin.apply(viewport)))
                        .unwrap_or((false, 0.0));
                    let in_view = is_intersecting && ratio >= observer.threshold;
                    if in_view == observer.in_view {
                        return None;
                    }
                    observer.in_view = in_view;
                    let entry = IntersectionEntry { target: observer.target.clone(), is_intersecting, ratio, in_view };
                    Some((Arc::clone(&observer.callback), entry))
                })
                .collect()
        };

        for (callback, entry) in &pending {
            callback(entry);
        }
        pending.len()
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.registry.as_ref().map(|r| lock(r).observers.len()).unwrap_or(0)
    }
}

impl Default for VisibilityService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VisibilityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityService")
            .field("available", &self.is_available())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Live subscription; unsubscribes on drop.
#[derive(Debug)]
pub struct Observation {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Observation {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).observers.retain(|o| o.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn viewport_at(scroll_y: f64) -> Rect {
        Rect::new(0.0, scroll_y, 1280.0, 800.0)
    }

    fn layout(id: &str, top: f64, height: f64) -> SectionLayout {
        SectionLayout { section: id.into(), rect: Rect::new(0.0, top, 1280.0, height) }
    }

    #[test]
    fn test_parse_four_values() {
        let margin = ViewportMargin::parse("-100px 0px -100px 0px").unwrap();
        assert_eq!(margin, ViewportMargin::default());
    }

    #[test]
    fn test_parse_shorthand() {
        let margin = ViewportMargin::parse("10% 20px").unwrap();
        assert_eq!(margin.top, MarginValue::Percent(10.0));
        assert_eq!(margin.bottom, MarginValue::Percent(10.0));
        assert_eq!(margin.left, MarginValue::Px(20.0));
        assert_eq!(ViewportMargin::parse("0").unwrap(), ViewportMargin::ZERO);
    }

    #[test]
    fn test_parse_rejects_unitless_and_too_many() {
        assert!(ViewportMargin::parse("-100 0px").is_err());
        assert!(ViewportMargin::parse("1px 1px 1px 1px 1px").is_err());
        assert!(ViewportMargin::parse("").is_err());
    }

    #[test]
    fn test_margin_display_round_trips() {
        let margin = ViewportMargin::default();
        assert_eq!(margin.to_string().parse::<ViewportMargin>().unwrap(), margin);
    }

    #[test]
    fn test_apply_shrinks_viewport() {
        let root = ViewportMargin::default().apply(viewport_at(0.0));
        assert_eq!(root, Rect::new(0.0, 100.0, 1280.0, 600.0));

        let root = ViewportMargin::parse("10%").unwrap().apply(Rect::new(0.0, 0.0, 1000.0, 500.0));
        assert_eq!(root, Rect::new(-100.0, -50.0, 1200.0, 600.0));
    }

    #[test]
    fn test_intersection_ratio() {
        let root = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(intersection_ratio(Rect::new(0.0, 50.0, 100.0, 100.0), root), (true, 0.5));
        assert_eq!(intersection_ratio(Rect::new(0.0, 200.0, 100.0, 100.0), root), (false, 0.0));
        assert_eq!(intersection_ratio(Rect::new(0.0, 100.0, 100.0, 100.0), root), (true, 0.0));
    }

    #[test]
    fn test_callback_only_on_transitions() {
        let service = VisibilityService::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _obs = service
            .observe("about".into(), 0.3, ViewportMargin::ZERO, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let sections = [layout("about", 1000.0, 1000.0)];
        assert_eq!(service.process(viewport_at(0.0), &sections), 0);
        assert_eq!(service.process(viewport_at(500.0), &sections), 1);
        assert_eq!(service.process(viewport_at(600.0), &sections), 0);
        assert_eq!(service.process(viewport_at(3000.0), &sections), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_threshold_respected() {
        let service = VisibilityService::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _obs = service
            .observe("works".into(), 0.5, ViewportMargin::ZERO, move |entry| {
                sink.lock().unwrap().push((entry.in_view, entry.ratio));
            })
            .unwrap();

        let sections = [layout("works", 600.0, 1000.0)];
        // 200px of 1000 visible: intersecting but under threshold.
        service.process(viewport_at(0.0), &sections);
        assert!(seen.lock().unwrap().is_empty());

        service.process(viewport_at(400.0), &sections);
        assert_eq!(*seen.lock().unwrap(), vec![(true, 0.6)]);
    }

    #[test]
    fn test_missing_layout_is_out_of_view() {
        let service = VisibilityService::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _obs = service
            .observe("home".into(), 0.3, ViewportMargin::ZERO, move |entry| {
                sink.lock().unwrap().push(entry.in_view);
            })
            .unwrap();

        service.process(viewport_at(0.0), &[layout("home", 0.0, 800.0)]);
        service.process(viewport_at(0.0), &[]);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let service = VisibilityService::new();
        let obs = service.observe("home".into(), 0.3, ViewportMargin::ZERO, |_| {}).unwrap();
        assert_eq!(service.observer_count(), 1);
        drop(obs);
        assert_eq!(service.observer_count(), 0);
        assert_eq!(service.process(viewport_at(0.0), &[layout("home", 0.0, 800.0)]), 0);
    }

    #[test]
    fn test_unavailable_service() {
        let service = VisibilityService::unavailable();
        let result = service.observe("home".into(), 0.3, ViewportMargin::ZERO, |_| {});
        assert!(matches!(result, Err(Error::ObserverSetup(_))));
        assert_eq!(service.process(viewport_at(0.0), &[]), 0);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let service = VisibilityService::new();
        let result = service.observe("home".into(), 1.2, ViewportMargin::ZERO, |_| {});
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
