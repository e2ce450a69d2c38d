pub mod surface;
pub mod virtual_list;

pub use surface::{
    HeadlessSurface, LiveRegionRole, RenderError, RenderFrame, RenderItem, Surface,
};
pub use virtual_list::VirtualList;

use crate::constants::*;
use ember_notifications_config::Anchor;
use tracing::warn;

/// Owns the surface and decides how much of the notification list actually
/// gets elements.
///
/// Below the virtualization threshold every card is rendered directly (the
/// default, cheap path). Past it, only the visible window of the virtual
/// list is materialized and positioned with an offset transform.
pub struct Renderer {
    surface: Box<dyn Surface>,
    list: VirtualList,
    render_count: u64,
    mounted: bool,
}

impl Renderer {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        let viewport = match surface.viewport_height() {
            h if h > 0.0 => h,
            _ => DEFAULT_VIEWPORT_HEIGHT,
        };
        Self {
            surface,
            list: VirtualList::new(ITEM_HEIGHT, viewport, VIRTUAL_BUFFER_ITEMS),
            render_count: 0,
            mounted: false,
        }
    }

    pub fn mount(&mut self) -> Result<(), RenderError> {
        self.surface.mount()?;
        self.mounted = true;
        Ok(())
    }

    pub fn unmount(&mut self) {
        self.surface.unmount();
        self.mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn prefers_reduced_motion(&self) -> bool {
        self.surface.prefers_reduced_motion()
    }

    pub fn is_virtualized(&self) -> bool {
        self.list.count() > VIRTUALIZATION_THRESHOLD
    }

    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.list.set_scroll_offset(offset);
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.list.set_viewport_height(height);
    }

    /// Render the ordered item list, newest first.
    ///
    /// `head_inserted` scrolls back to the top so a brand new notification
    /// is always surfaced. A surface that fails to build the full cards is
    /// retried once with minimal fallback elements so one malformed card
    /// cannot blank the whole stack.
    pub fn render(&mut self, items: Vec<RenderItem>, anchor: Anchor, head_inserted: bool) {
        if !self.mounted {
            return;
        }

        self.list.set_count(items.len());
        if head_inserted {
            self.list.scroll_to_top();
        }

        let frame = if self.is_virtualized() {
            let range = self.list.visible_range();
            RenderFrame {
                offset_y: self.list.slice_offset(),
                total_height: self.list.total_height(),
                items: items[range].to_vec(),
                anchor,
            }
        } else {
            RenderFrame {
                offset_y: 0.0,
                total_height: self.list.total_height(),
                items,
                anchor,
            }
        };

        self.render_count += 1;
        if let Err(err) = self.surface.render(frame.clone()) {
            warn!("surface render failed, retrying with fallback elements: {err}");
            let fallback = RenderFrame {
                items: frame
                    .items
                    .into_iter()
                    .map(|item| RenderItem::fallback(item.id, item.severity, item.message))
                    .collect(),
                ..frame
            };
            if let Err(err) = self.surface.render(fallback) {
                warn!("fallback render failed as well: {err}");
            }
        }
    }
}
