use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a host-owned rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Layout slots the host provides for video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    Local,
    Remote,
}

/// View operations implemented by the native UI shell.
///
/// Every method is called on the UI thread.
pub trait SurfaceHost: Send {
    fn create_surface(&mut self, surface: SurfaceId);
    fn add_to_container(&mut self, container: VideoContainer, surface: SurfaceId);
    fn remove_from_container(&mut self, container: VideoContainer, surface: SurfaceId);
    /// Render this surface above the default overlay layer.
    fn set_media_overlay(&mut self, surface: SurfaceId, overlay: bool);
    /// Short, non-blocking notice (a toast on Android).
    fn show_notice(&mut self, message: &str);
}

/// Hands out surface ids. Ids are never reused within a process.
#[derive(Debug)]
pub struct SurfaceAllocator {
    next: AtomicU64,
}

impl SurfaceAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn allocate(&self) -> SurfaceId {
        SurfaceId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SurfaceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
