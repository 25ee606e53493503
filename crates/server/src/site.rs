//! The running site: one page context, its section boundaries and nav bar,
//! and the worker registration every page request goes through.

use std::sync::Arc;

use folio_client::fetch::parse_origin;
use folio_client::{CacheWorker, FetchConfig, HttpNetwork, Network, Registration, WorkerConfig};
use folio_core::section::{MountedBoundary, NavBar, NavItem, SectionBoundary, ViewportMargin, VisibilityService};
use folio_core::{AppConfig, CacheDb, Error, LoadingState, PageContext};
use tokio::sync::Mutex;
use url::Url;

pub struct Site {
    config: AppConfig,
    origin: Url,
    registration: Registration,
    page: PageContext,
    visibility: VisibilityService,
    boundaries: Vec<MountedBoundary>,
    nav: Mutex<NavBar>,
}

impl Site {
    /// Open storage, register the current cache generation and mount the page.
    pub async fn start(config: AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(FetchConfig::from(&config), origin)?);
        let loading = LoadingState::start(&db, &config.app_name, config.splash()).await;

        let site = Self::new(config, db.clone(), network.clone(), loading)?;

        let worker = CacheWorker::new(WorkerConfig::from_app_config(&site.config)?, db, network);
        let report = site.registration.register(worker).await?;
        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "site ready");

        Ok(site)
    }

    /// Mount the page without registering a worker.
    pub fn new(config: AppConfig, db: CacheDb, network: Arc<dyn Network>, loading: LoadingState) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let margin = ViewportMargin::parse(&config.viewport_margin)?;
        let page = PageContext::new()
            .with_active_section(config.default_section.as_str())
            .with_loading(loading);
        let visibility = VisibilityService::new();

        let items = NavItem::defaults();
        let boundaries = items
            .iter()
            .map(|item| {
                SectionBoundary::new(item.section_id())
                    .with_threshold(config.visibility_threshold)
                    .with_margin(margin)
                    .mount(&page, &visibility)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let nav = NavBar::new(&page, items)?;

        tracing::debug!(sections = boundaries.len(), "page mounted");
        Ok(Self {
            config,
            origin,
            registration: Registration::new(db, network),
            page,
            visibility,
            boundaries,
            nav: Mutex::new(nav),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn visibility(&self) -> &VisibilityService {
        &self.visibility
    }

    pub fn observing(&self) -> usize {
        self.boundaries.iter().filter(|b| b.is_observing()).count()
    }

    pub fn nav(&self) -> &Mutex<NavBar> {
        &self.nav
    }
}
