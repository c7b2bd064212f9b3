use ash::vk;
use serde::{Deserialize, Serialize};

use crate::{format::ImageFormat, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Found,
    /// The channel exists but the client's cached metadata is stale.
    RequiresUpdate,
    NotFound,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ImageMetadata {
    pub fn new(width: u32, height: u32, format: ImageFormat) -> Self {
        Self { width, height, format }
    }
}

/// Graphics-API identifier of a local texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeHandle {
    Vulkan(vk::Image),
    OpenGl(u32),
}

/// Arguments of a single image copy across the process boundary.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    pub native: NativeHandle,
    pub src_layout: vk::ImageLayout,
    pub dst_layout: vk::ImageLayout,
    /// Null on backends without explicit GPU synchronization.
    pub fence: vk::Fence,
}

impl Transfer {
    pub fn new(
        native: NativeHandle,
        src_layout: vk::ImageLayout,
        dst_layout: vk::ImageLayout,
    ) -> Self {
        Self {
            native,
            src_layout,
            dst_layout,
            fence: vk::Fence::null(),
        }
    }

    pub fn with_fence(mut self, fence: vk::Fence) -> Self {
        self.fence = fence;
        self
    }
}

/// Narrow surface of the texture sharing library.
///
/// Channels are addressed by a process-wide name agreed between producer and
/// consumer. Implementations keep a cached copy of each channel's metadata;
/// `find_image` without `force_update` only reports whether that copy is
/// current.
pub trait TextureShareClient: Send {
    fn find_image(&mut self, name: &str, force_update: bool) -> LookupResult;

    fn image_metadata(&self, name: &str) -> Option<ImageMetadata>;

    fn init_image(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: ImageFormat,
        overwrite: bool,
    ) -> Result<()>;

    fn send_image(&mut self, name: &str, transfer: &Transfer) -> Result<()>;

    fn recv_image(&mut self, name: &str, transfer: &Transfer) -> Result<()>;
}
