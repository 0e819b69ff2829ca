//! Review session controller.
//!
//! Each session tracks one storage location: the asset list, the selected
//! asset's page container, the current page raster, the cached analysis
//! result, and the overlays drawn on top. The page/asset lifecycle is an
//! explicit state machine; asynchronous completions are guarded by a render
//! generation so a stale load or fetch can never clobber a newer selection.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisEnvelope, AnalysisReader, ModelInfo};
use crate::asset::{Asset, assets_from_listing};
use crate::config::{FieldPalette, ReviewConfig, StaticConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::overlay::{Extent, FieldOverlay, apply_highlight, build_overlays};
use crate::page_source::PageSource;
use crate::raster::Raster;
use crate::storage::{LocalStorageProvider, StorageProvider};

/// Lifecycle of the selected asset within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    NoAsset,
    LoadingRaster,
    RasterReady,
    FetchingResult,
    ResultReady,
}

/// Page navigation direction
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDirection {
    Next,
    Previous,
}

/// One review session's state. Mutated only behind the session mutex.
pub struct ReviewSession {
    id: String,
    folder: String,
    storage: Arc<dyn StorageProvider>,
    reader: AnalysisReader,
    assets: Vec<Asset>,
    phase: ReviewPhase,
    selected: Option<Asset>,
    current_page: u32,
    page_count: u32,
    source: Option<PageSource>,
    raster: Option<Raster>,
    analysis: Option<AnalysisEnvelope>,
    overlays: Vec<FieldOverlay>,
    highlighted_field: String,
    predict_run: bool,
    /// Bumped on every asset selection; async completions carry the value
    /// they were dispatched with and are discarded on mismatch.
    generation: u64,
}

impl ReviewSession {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            folder: self.folder.clone(),
            phase: self.phase,
            asset_count: self.assets.len(),
            selected_asset: self.selected.clone(),
            current_page: self.current_page,
            page_count: self.page_count,
            predict_run: self.predict_run,
            highlighted_field: self.highlighted_field.clone(),
        }
    }
}

/// Serializable view of a session's top-level state
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub folder: String,
    pub phase: ReviewPhase,
    pub asset_count: usize,
    pub selected_asset: Option<Asset>,
    pub current_page: u32,
    pub page_count: u32,
    pub predict_run: bool,
    pub highlighted_field: String,
}

/// Everything a client needs to draw the current page
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub current_page: u32,
    pub page_count: u32,
    pub predict_run: bool,
    pub highlighted_field: String,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub image_uri: Option<String>,
    pub model: Option<ModelInfo>,
    pub overlays: Vec<OverlayDto>,
    pub predictions: Vec<Prediction>,
}

/// Overlay with its render stroke width resolved
#[derive(Debug, Clone, Serialize)]
pub struct OverlayDto {
    pub field_name: String,
    pub polygon: Vec<[i32; 2]>,
    pub color: String,
    pub highlighted: bool,
    pub stroke_width: u32,
}

impl From<&FieldOverlay> for OverlayDto {
    fn from(overlay: &FieldOverlay) -> Self {
        Self {
            field_name: overlay.field_name.clone(),
            polygon: overlay.polygon.clone(),
            color: overlay.color.clone(),
            highlighted: overlay.highlighted,
            stroke_width: overlay.stroke_width(),
        }
    }
}

/// One extracted field for the prediction list
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub field_name: String,
    pub text: Option<String>,
    pub page: Option<u32>,
    pub confidence: Option<f64>,
    pub color: String,
}

/// The review service: all live sessions plus shared configuration
pub struct ReviewService {
    sessions: DashMap<String, Arc<Mutex<ReviewSession>>>,
    palette: FieldPalette,
    review: ReviewConfig,
}

impl ReviewService {
    pub fn new(config: &StaticConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            palette: config.palette.clone(),
            review: config.review.clone(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Submit a storage location: open the location, list its assets, and
    /// create a session. Listing failures surface to the caller.
    pub async fn submit_location(
        &self,
        root_path: &str,
        folder_path: &str,
    ) -> ServiceResult<SessionSnapshot> {
        let storage = Arc::new(LocalStorageProvider::new(root_path));
        self.open_session(storage, folder_path).await
    }

    pub(crate) async fn open_session(
        &self,
        storage: Arc<dyn StorageProvider>,
        folder: &str,
    ) -> ServiceResult<SessionSnapshot> {
        let entries = storage.list_files(folder).await?;
        let assets = assets_from_listing(entries, folder);

        let session = ReviewSession {
            id: Uuid::new_v4().to_string(),
            folder: folder.to_string(),
            reader: AnalysisReader::new(storage.clone()),
            storage,
            assets,
            phase: ReviewPhase::NoAsset,
            selected: None,
            current_page: 1,
            page_count: 1,
            source: None,
            raster: None,
            analysis: None,
            overlays: Vec::new(),
            highlighted_field: String::new(),
            predict_run: false,
            generation: 0,
        };

        info!(
            session_id = %session.id,
            folder = %session.folder,
            assets = session.assets.len(),
            "Review session opened"
        );
        counter!("docreview_sessions_opened_total").increment(1);

        let snapshot = session.snapshot();
        self.sessions
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(snapshot)
    }

    fn session(&self, session_id: &str) -> ServiceResult<Arc<Mutex<ReviewSession>>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn snapshot(&self, session_id: &str) -> ServiceResult<SessionSnapshot> {
        let session = self.session(session_id)?;
        let guard = session.lock().await;
        Ok(guard.snapshot())
    }

    pub async fn assets(&self, session_id: &str) -> ServiceResult<Vec<Asset>> {
        let session = self.session(session_id)?;
        let guard = session.lock().await;
        Ok(guard.assets.clone())
    }

    /// The current page's encoded raster.
    pub async fn raster(&self, session_id: &str) -> ServiceResult<Raster> {
        let session = self.session(session_id)?;
        let guard = session.lock().await;
        guard.raster.clone().ok_or(ServiceError::RasterNotReady)
    }

    /// Assemble the full view of the current page: raster, overlays, and
    /// the prediction list.
    pub async fn review_view(&self, session_id: &str) -> ServiceResult<ReviewView> {
        let session = self.session(session_id)?;
        let guard = session.lock().await;
        let s = &*guard;

        let predictions = s
            .analysis
            .as_ref()
            .and_then(|envelope| envelope.fields())
            .into_iter()
            .flatten()
            .map(|(field_name, prediction)| Prediction {
                field_name: field_name.clone(),
                text: prediction.text.clone(),
                page: prediction.page,
                confidence: prediction.confidence,
                color: self.palette.color_for(field_name).to_string(),
            })
            .collect();

        Ok(ReviewView {
            current_page: s.current_page,
            page_count: s.page_count,
            predict_run: s.predict_run,
            highlighted_field: s.highlighted_field.clone(),
            image_width: s.raster.as_ref().map(|r| r.width),
            image_height: s.raster.as_ref().map(|r| r.height),
            image_uri: s.raster.as_ref().map(Raster::to_data_uri),
            model: s.analysis.as_ref().and_then(AnalysisEnvelope::model_info),
            overlays: s.overlays.iter().map(OverlayDto::from).collect(),
            predictions,
        })
    }

    /// Select an asset: reset page state, load and render page 1, then kick
    /// off the analysis result fetch in the background.
    pub async fn select_asset(
        self: &Arc<Self>,
        session_id: &str,
        asset_id: &str,
    ) -> ServiceResult<SessionSnapshot> {
        let session = self.session(session_id)?;

        let (storage, asset, generation) = {
            let mut guard = session.lock().await;
            let s = &mut *guard;
            let asset = s
                .assets
                .iter()
                .find(|a| a.id == asset_id)
                .cloned()
                .ok_or_else(|| ServiceError::AssetNotFound {
                    asset_id: asset_id.to_string(),
                })?;

            // Nothing to do when the same asset is already selected.
            if s.selected.as_ref().is_some_and(|current| current.id == asset.id) {
                return Ok(s.snapshot());
            }

            s.generation += 1;
            s.phase = ReviewPhase::LoadingRaster;
            s.selected = Some(asset.clone());
            s.current_page = 1;
            s.page_count = 1;
            s.source = None;
            s.raster = None;
            s.analysis = None;
            s.overlays.clear();
            s.highlighted_field.clear();
            s.predict_run = false;
            (s.storage.clone(), asset, s.generation)
        };

        info!(asset = %asset.name, kind = ?asset.kind, "Loading asset");

        // Read and open outside the lock so a newer selection can supersede
        // this one while the open is in flight.
        let loaded = async {
            let bytes = storage.read_bytes(&asset.path).await?;
            let source = PageSource::open(asset.kind, bytes)?;
            let raster = source.render(1, self.review.pdf_render_scale)?;
            Ok::<_, ServiceError>((source, raster))
        }
        .await;

        let snapshot = {
            let mut guard = session.lock().await;
            let s = &mut *guard;
            if s.generation != generation {
                debug!(asset = %asset.name, "Discarding superseded asset load");
                return Ok(s.snapshot());
            }

            match loaded {
                Ok((source, raster)) => {
                    s.page_count = source.page_count();
                    s.source = Some(source);
                    s.raster = Some(raster);
                    s.phase = ReviewPhase::RasterReady;
                    counter!("docreview_rasters_rendered_total").increment(1);
                    s.snapshot()
                }
                Err(e) => {
                    error!(asset = %asset.name, error = %e, "Failed to load asset raster");
                    s.selected = None;
                    s.phase = ReviewPhase::NoAsset;
                    return Err(e);
                }
            }
        };

        self.spawn_result_fetch(session, asset, generation);

        Ok(snapshot)
    }

    /// Fetch the analysis result in the background and apply it if the
    /// session still shows the asset it was fetched for.
    fn spawn_result_fetch(
        self: &Arc<Self>,
        session: Arc<Mutex<ReviewSession>>,
        asset: Asset,
        generation: u64,
    ) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let reader = {
                let mut guard = session.lock().await;
                if guard.generation != generation {
                    return;
                }
                guard.phase = ReviewPhase::FetchingResult;
                guard.reader.clone()
            };

            let fetched = reader.get_recognized_text(&asset.path, &asset.name).await;

            let mut guard = session.lock().await;
            let s = &mut *guard;
            if s.generation != generation {
                debug!(asset = %asset.name, "Discarding stale analysis result");
                return;
            }

            match fetched {
                Ok(envelope) => {
                    s.analysis = envelope;
                    s.predict_run = true;
                    s.phase = ReviewPhase::ResultReady;
                    service.redraw_overlays(s);
                    counter!("docreview_results_fetched_total").increment(1);
                }
                Err(e) => {
                    // Contained: the raster stays usable without overlays and
                    // other assets remain browsable.
                    warn!(asset = %asset.name, error = %e, "Failed to fetch analysis result");
                    s.phase = ReviewPhase::RasterReady;
                }
            }
        });
    }

    /// Navigate pages within the selected asset. The page index clamps to
    /// `[1, page_count]`; pages re-render from the already-open container.
    pub async fn navigate_page(
        &self,
        session_id: &str,
        direction: PageDirection,
    ) -> ServiceResult<SessionSnapshot> {
        let session = self.session(session_id)?;
        let mut guard = session.lock().await;
        let s = &mut *guard;

        if s.source.is_none() {
            return Err(ServiceError::InvalidRequest {
                message: "no asset selected".to_string(),
            });
        }

        let target = match direction {
            PageDirection::Next => (s.current_page + 1).min(s.page_count),
            PageDirection::Previous => s.current_page.saturating_sub(1).max(1),
        };
        if target == s.current_page {
            return Ok(s.snapshot());
        }

        s.phase = ReviewPhase::LoadingRaster;
        if let Err(e) = self.rerender_page(s, target) {
            error!(page = target, error = %e, "Failed to render page");
            s.phase = ready_phase(s.predict_run);
            return Err(e);
        }

        s.phase = ready_phase(s.predict_run);
        self.redraw_overlays(s);
        Ok(s.snapshot())
    }

    /// Set the highlighted field (hover or click). A click on a prediction
    /// recorded on another page navigates there first.
    pub async fn set_highlight(
        &self,
        session_id: &str,
        field_name: &str,
        navigate: bool,
    ) -> ServiceResult<SessionSnapshot> {
        let session = self.session(session_id)?;
        let mut guard = session.lock().await;
        let s = &mut *guard;

        if navigate {
            let target = s
                .analysis
                .as_ref()
                .and_then(|envelope| envelope.field(field_name))
                .and_then(|prediction| prediction.page);
            if let Some(target) = target {
                if target != s.current_page && (1..=s.page_count).contains(&target) {
                    self.rerender_page(s, target)?;
                    self.redraw_overlays(s);
                }
            }
        }

        s.highlighted_field = field_name.to_string();
        apply_highlight(&mut s.overlays, &s.highlighted_field);
        Ok(s.snapshot())
    }

    pub async fn clear_highlight(&self, session_id: &str) -> ServiceResult<SessionSnapshot> {
        let session = self.session(session_id)?;
        let mut guard = session.lock().await;
        let s = &mut *guard;

        s.highlighted_field.clear();
        apply_highlight(&mut s.overlays, "");
        Ok(s.snapshot())
    }

    fn rerender_page(&self, s: &mut ReviewSession, page: u32) -> ServiceResult<()> {
        let source = s.source.as_ref().ok_or(ServiceError::RasterNotReady)?;
        let raster = source.render(page, self.review.pdf_render_scale)?;
        s.current_page = page;
        s.raster = Some(raster);
        counter!("docreview_rasters_rendered_total").increment(1);
        Ok(())
    }

    /// Recompute overlays for the current page. The source extent comes from
    /// the analysis result's per-page dimensions, so this runs on every page
    /// change as well as on result arrival.
    fn redraw_overlays(&self, s: &mut ReviewSession) {
        s.overlays.clear();
        let (Some(raster), Some(envelope)) = (&s.raster, &s.analysis) else {
            return;
        };
        let Some(read_result) = envelope.read_result_for_page(s.current_page) else {
            debug!(
                page = s.current_page,
                "Analysis result has no dimensions for page"
            );
            return;
        };

        let image_extent = Extent::of_size(raster.width as f64, raster.height as f64);
        let source_extent = Extent::of_size(read_result.width, read_result.height);
        s.overlays = build_overlays(
            envelope,
            s.current_page,
            &image_extent,
            &source_extent,
            &self.palette,
            &s.highlighted_field,
        );
    }
}

fn ready_phase(predict_run: bool) -> ReviewPhase {
    if predict_run {
        ReviewPhase::ResultReady
    } else {
        ReviewPhase::RasterReady
    }
}
