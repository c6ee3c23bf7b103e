//! 2D content surfaces rendered onto annotation billboards

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Pixel bounds of a content surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBounds {
    pub width: f32,
    pub height: f32,
}

/// Bitmap snapshot of a content surface
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8
    pub rgba: Arc<[u8]>,
    /// Increments every time the source content changes
    pub revision: u64,
}

/// Externally supplied 2D content. Treated as an opaque bitmap source that is
/// only re-rendered at construction or when the owner reports a change.
pub trait ContentSurface: Send + Sync {
    fn bounds(&self) -> ContentBounds;

    fn render(&self) -> RenderedContent;
}

struct Bitmap {
    width: u32,
    height: u32,
    rgba: Arc<[u8]>,
}

/// In-memory bitmap content
pub struct StaticContent {
    bitmap: RwLock<Bitmap>,
    revision: AtomicU64,
}

impl StaticContent {
    /// Content filled with one color
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba: Vec<u8> = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            bitmap: RwLock::new(Bitmap {
                width,
                height,
                rgba: rgba.into(),
            }),
            revision: AtomicU64::new(0),
        }
    }

    /// Content from raw RGBA8 pixels; `None` if the buffer size does not match
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            bitmap: RwLock::new(Bitmap {
                width,
                height,
                rgba: rgba.into(),
            }),
            revision: AtomicU64::new(0),
        })
    }

    /// Swap in new pixels. Annotation nodes pick this up on `content_did_change`.
    pub fn replace(&self, width: u32, height: u32, rgba: Vec<u8>) -> bool {
        if rgba.len() != width as usize * height as usize * 4 {
            return false;
        }
        *self.bitmap.write() = Bitmap {
            width,
            height,
            rgba: rgba.into(),
        };
        self.revision.fetch_add(1, Ordering::SeqCst);
        true
    }
}

impl ContentSurface for StaticContent {
    fn bounds(&self) -> ContentBounds {
        let bitmap = self.bitmap.read();
        ContentBounds {
            width: bitmap.width as f32,
            height: bitmap.height as f32,
        }
    }

    fn render(&self) -> RenderedContent {
        let bitmap = self.bitmap.read();
        RenderedContent {
            width: bitmap.width,
            height: bitmap.height,
            rgba: bitmap.rgba.clone(),
            revision: self.revision.load(Ordering::SeqCst),
        }
    }
}
