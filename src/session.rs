//! The editing session: everything render and edit operations act on.
//!
//! A [`Session`] owns the photo set, the active banners, the committed edit
//! set, the single editor draft and the shadow cache. There is no ambient
//! state; every operation goes through a session value.
//!
//! ## Draft lifecycle
//!
//! ```text
//! open_editor(i)   draft = effective record of photo i, base scale refreshed
//! update_draft(f)  draft = f(draft)            (store untouched)
//! save_draft()     store[id] = draft, committed; editor closes
//! close_editor()   draft discarded; store untouched
//! next/prev        editor reopens on the neighbour (wraps around)
//! ```
//!
//! Rendering for export reads only [`Session::effective_record`], which
//! never looks at the draft. Export takes `&Session`, so editor mutation
//! cannot interleave with it.

use crate::edits::{EditRecord, EditStore};
use crate::imaging::{
    Compositor, OutputGeometry, RenderOptions, ShadowCache, analyze_exposure,
};
use crate::overlay::{Overlay, OverlaySlot};
use crate::types::{Photo, PhotoId};
use image::RgbaImage;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("No photos loaded")]
    NoPhotos,
    #[error("Photo index {0} out of range")]
    IndexOutOfRange(usize),
    #[error("Unknown photo: {0}")]
    UnknownPhoto(String),
    #[error("Editor is not open")]
    EditorClosed,
}

/// The in-progress edit for the photo open in the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub photo: PhotoId,
    pub record: EditRecord,
}

#[derive(Debug)]
pub struct Session {
    options: RenderOptions,
    header: Option<Overlay>,
    footer: Option<Overlay>,
    photos: Vec<Photo>,
    /// Bumped on every photo-set replacement; part of shadow cache keys.
    generation: u64,
    store: EditStore,
    draft: Option<Draft>,
    cache: ShadowCache,
    /// Photo shown in the main preview.
    current: usize,
}

impl Session {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            header: None,
            footer: None,
            photos: Vec::new(),
            generation: 0,
            store: EditStore::new(),
            draft: None,
            cache: ShadowCache::new(),
            current: 0,
        }
    }

    // =========================================================================
    // Output configuration
    // =========================================================================

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Change render options. Base scales follow the new geometry.
    pub fn set_options(&mut self, options: RenderOptions) {
        self.options = options;
        self.refresh_base_scales();
    }

    pub fn overlay(&self, slot: OverlaySlot) -> Option<&Overlay> {
        match slot {
            OverlaySlot::Header => self.header.as_ref(),
            OverlaySlot::Footer => self.footer.as_ref(),
        }
    }

    /// Set or remove a banner. Base scales follow the new geometry.
    pub fn set_overlay(&mut self, slot: OverlaySlot, overlay: Option<Overlay>) {
        match slot {
            OverlaySlot::Header => self.header = overlay,
            OverlaySlot::Footer => self.footer = overlay,
        }
        self.refresh_base_scales();
    }

    pub fn geometry(&self) -> OutputGeometry {
        self.compositor().geometry()
    }

    /// A compositor bound to this session's options, banners and cache.
    pub fn compositor(&self) -> Compositor<'_> {
        Compositor {
            options: self.options,
            header: self.header.as_ref().map(|o| &o.bitmap),
            footer: self.footer.as_ref().map(|o| &o.bitmap),
            cache: &self.cache,
            generation: self.generation,
        }
    }

    fn base_scale_for(&self, photo: &Photo) -> f64 {
        self.geometry().base_scale(photo.width(), photo.height())
    }

    fn refresh_base_scales(&mut self) {
        let geometry = self.geometry();
        let scales: HashMap<&PhotoId, f64> = self
            .photos
            .iter()
            .map(|p| (&p.id, geometry.base_scale(p.width(), p.height())))
            .collect();
        self.store.rescale(|id| scales.get(id).copied());
        if let Some(draft) = self.draft.as_mut()
            && let Some(scale) = scales.get(&draft.photo)
        {
            draft.record = draft.record.with_base_scale(*scale);
        }
    }

    // =========================================================================
    // Photo set
    // =========================================================================

    /// Replace the photo set wholesale.
    ///
    /// Discards the draft, the edit set and every cached shadow proxy, then
    /// synthesizes an uncommitted default record for each photo.
    pub fn load_photos(&mut self, photos: Vec<Photo>) {
        self.generation += 1;
        self.draft = None;
        self.cache.clear();
        self.store.clear();
        self.current = 0;
        self.photos = photos;
        for (index, photo) in self.photos.iter_mut().enumerate() {
            photo.index = index;
        }
        let geometry = self.geometry();
        for photo in &self.photos {
            let scale = geometry.base_scale(photo.width(), photo.height());
            self.store
                .insert(photo.id.clone(), EditRecord::default_for(scale));
        }
        tracing::debug!(
            generation = self.generation,
            count = self.photos.len(),
            "photo set replaced"
        );
    }

    /// Bring in committed records saved by an earlier run. Records for
    /// photos not in the current set are ignored. Returns how many applied.
    pub fn import_edits(&mut self, saved: &EditStore) -> usize {
        let geometry = self.geometry();
        let mut applied = 0;
        for photo in &self.photos {
            if let Some(record) = saved.get(&photo.id).filter(|r| r.is_committed()) {
                let scale = geometry.base_scale(photo.width(), photo.height());
                self.store
                    .insert(photo.id.clone(), record.with_base_scale(scale));
                applied += 1;
            }
        }
        applied
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn photo(&self, index: usize) -> Result<&Photo, SessionError> {
        if self.photos.is_empty() {
            return Err(SessionError::NoPhotos);
        }
        self.photos
            .get(index)
            .ok_or(SessionError::IndexOutOfRange(index))
    }

    /// Position of the photo with the given file name.
    pub fn find_by_name(&self, name: &str) -> Result<usize, SessionError> {
        self.photos
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SessionError::UnknownPhoto(name.to_string()))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn edits(&self) -> &EditStore {
        &self.store
    }

    pub fn shadow_cache(&self) -> &ShadowCache {
        &self.cache
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_current(&mut self, index: usize) -> Result<(), SessionError> {
        self.photo(index)?;
        self.current = index;
        Ok(())
    }

    // =========================================================================
    // Records and rendering
    // =========================================================================

    /// The untouched record for a photo under the current geometry.
    pub fn default_record(&self, photo: &Photo) -> EditRecord {
        EditRecord::default_for(self.base_scale_for(photo))
    }

    /// Committed record, or a freshly synthesized default. Never the draft.
    pub fn effective_record(&self, photo: &Photo) -> EditRecord {
        self.store
            .get(&photo.id)
            .copied()
            .unwrap_or_else(|| self.default_record(photo))
    }

    /// Render a photo with its effective record.
    pub fn render(&self, photo: &Photo) -> RgbaImage {
        self.compositor().render(photo, &self.effective_record(photo))
    }

    /// Main preview of the current photo. Shows the draft only when the
    /// editor is open on this same photo.
    pub fn render_preview(&self) -> Result<RgbaImage, SessionError> {
        let photo = self.photo(self.current)?;
        let record = match &self.draft {
            Some(draft) if draft.photo == photo.id => draft.record,
            _ => self.effective_record(photo),
        };
        Ok(self.compositor().render(photo, &record))
    }

    // =========================================================================
    // Editor
    // =========================================================================

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Open the editor on a photo, replacing any existing draft.
    pub fn open_editor(&mut self, index: usize) -> Result<EditRecord, SessionError> {
        let photo = self.photo(index)?;
        let id = photo.id.clone();
        let record = self
            .effective_record(photo)
            .with_base_scale(self.base_scale_for(photo));
        self.draft = Some(Draft { photo: id, record });
        self.current = index;
        Ok(record)
    }

    fn draft_photo(&self) -> Result<(&Draft, &Photo), SessionError> {
        let draft = self.draft.as_ref().ok_or(SessionError::EditorClosed)?;
        let photo = self
            .photos
            .iter()
            .find(|p| p.id == draft.photo)
            .ok_or_else(|| SessionError::UnknownPhoto(draft.photo.to_string()))?;
        Ok((draft, photo))
    }

    /// Apply an edit to the draft only.
    pub fn update_draft(
        &mut self,
        edit: impl FnOnce(EditRecord) -> EditRecord,
    ) -> Result<EditRecord, SessionError> {
        let draft = self.draft.as_mut().ok_or(SessionError::EditorClosed)?;
        draft.record = edit(draft.record);
        Ok(draft.record)
    }

    /// Put the default record back into the draft.
    pub fn reset_draft(&mut self) -> Result<EditRecord, SessionError> {
        let (_, photo) = self.draft_photo()?;
        let record = self.default_record(photo);
        self.update_draft(|_| record)
    }

    /// Run exposure analysis on the draft's photo and apply the result.
    pub fn auto_adjust_draft(&mut self) -> Result<EditRecord, SessionError> {
        let (_, photo) = self.draft_photo()?;
        let adjustment = analyze_exposure(&photo.bitmap);
        self.update_draft(|r| r.with_exposure(adjustment))
    }

    /// Editor view: the draft rendered with the photo-area frame.
    pub fn render_editor(&self) -> Result<RgbaImage, SessionError> {
        let (draft, photo) = self.draft_photo()?;
        Ok(self.compositor().render_editor(photo, &draft.record))
    }

    /// Commit the draft and close the editor.
    pub fn save_draft(&mut self) -> Result<PhotoId, SessionError> {
        let draft = self.draft.take().ok_or(SessionError::EditorClosed)?;
        self.store
            .insert(draft.photo.clone(), draft.record.committed());
        Ok(draft.photo)
    }

    /// Close the editor without saving.
    pub fn close_editor(&mut self) {
        self.draft = None;
    }

    /// Move to the next photo, wrapping around. Reopens the editor there
    /// when it is open.
    pub fn next_photo(&mut self) -> Result<usize, SessionError> {
        self.step(1)
    }

    /// Move to the previous photo, wrapping around.
    pub fn prev_photo(&mut self) -> Result<usize, SessionError> {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> Result<usize, SessionError> {
        let n = self.photos.len();
        if n == 0 {
            return Err(SessionError::NoPhotos);
        }
        let index = (self.current as isize + delta).rem_euclid(n as isize) as usize;
        if self.is_editing() {
            self.open_editor(index)?;
        } else {
            self.current = index;
        }
        Ok(index)
    }
}
