/// Zoom is tracked in tenths so repeated steps never drift.
const ZOOM_DEFAULT_TENTHS: u8 = 12;
const ZOOM_MIN_TENTHS: u8 = 6;
const ZOOM_MAX_TENTHS: u8 = 30;
const ZOOM_STEP_TENTHS: u8 = 2;

/// Transient view state of an unlocked preview. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView {
    page: u32,
    page_count: u32,
    zoom_tenths: u8,
    fullscreen: bool,
}

impl Default for PageView {
    fn default() -> Self {
        Self { page: 1, page_count: 0, zoom_tenths: ZOOM_DEFAULT_TENTHS, fullscreen: false }
    }
}

impl PageView {
    pub fn with_page_count(page_count: u32) -> Self {
        Self { page_count, ..Self::default() }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn page_index(&self) -> u32 {
        self.page.saturating_sub(1)
    }

    pub fn is_last_page(&self) -> bool {
        self.page >= self.page_count
    }

    pub fn zoom(&self) -> f32 {
        f32::from(self.zoom_tenths) / 10.0
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_sub(1))
    }

    /// Moves to `page` clamped to `[1, page_count]`; returns whether the page changed.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let target = page.clamp(1, self.page_count.max(1));
        let changed = target != self.page;
        self.page = target;
        changed
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom_tenths(self.zoom_tenths.saturating_add(ZOOM_STEP_TENTHS))
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom_tenths(self.zoom_tenths.saturating_sub(ZOOM_STEP_TENTHS))
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.set_zoom_tenths(ZOOM_DEFAULT_TENTHS)
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }

    fn set_zoom_tenths(&mut self, tenths: u8) -> bool {
        let target = tenths.clamp(ZOOM_MIN_TENTHS, ZOOM_MAX_TENTHS);
        let changed = target != self.zoom_tenths;
        self.zoom_tenths = target;
        changed
    }
}
