pub mod binding;
pub mod client;
pub mod format;
pub mod local;
pub mod plugin;
pub mod receiver;
pub mod resolver;
pub mod sender;
pub mod vulkan;

use thiserror::Error;

pub use binding::{LocalTextureBinding, Texture2d, TextureAllocator};
pub use client::{ImageMetadata, LookupResult, NativeHandle, TextureShareClient, Transfer};
pub use format::ImageFormat;
pub use local::{LocalShareClient, LocalShareHub};
pub use plugin::{
    SharedTexture, SharedTextureSender, SyncMode, TextureShareClientHandle, TextureShareConfig,
    TextureSharePlugin,
};
pub use receiver::{SyncOutcome, TextureReceiver};
pub use resolver::{resolve, Resolution};
pub use sender::TextureSender;
pub use vulkan::{RenderDeviceAllocator, SharedGpuTexture, VulkanFence};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureShareError {
    #[error("Shared channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Shared channel error: {0}")]
    ChannelError(String),

    #[error("Unsupported texture format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Failed to allocate texture: {0}")]
    AllocationFailed(String),
}

pub type Result<T> = std::result::Result<T, TextureShareError>;
