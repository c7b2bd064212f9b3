use ash::vk;
use serde::{Deserialize, Serialize};
use wgpu::TextureFormat;

const GL_RGB: u32 = 0x1907;
const GL_RGBA: u32 = 0x1908;
const GL_BGR: u32 = 0x80E0;
const GL_BGRA: u32 = 0x80E1;

/// Pixel formats understood by the texture sharing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    R8G8B8A8,
    R8G8B8,
    B8G8R8A8,
    B8G8R8,
    #[default]
    Undefined,
}

impl ImageFormat {
    /// Maps a host texture format to the sharing library's format.
    ///
    /// Host formats without a counterpart yield [`ImageFormat::Undefined`].
    pub fn to_external(format: TextureFormat) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::R8G8B8A8,
            TextureFormat::Bgra8Unorm => Self::B8G8R8A8,
            _ => Self::Undefined,
        }
    }

    /// Picks the host format a local texture receiving this format is
    /// allocated with, or `None` when the format cannot be received.
    ///
    /// The 24-bit formats have no wgpu equivalent and are widened into an
    /// RGBA texture by the receiving blit.
    pub fn to_host(self) -> Option<TextureFormat> {
        match self {
            Self::R8G8B8A8 | Self::R8G8B8 | Self::B8G8R8 => Some(TextureFormat::Rgba8Unorm),
            Self::B8G8R8A8 => Some(TextureFormat::Bgra8Unorm),
            Self::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::R8G8B8A8 | Self::B8G8R8A8)
    }

    pub fn to_vk(self) -> vk::Format {
        match self {
            Self::R8G8B8A8 => vk::Format::R8G8B8A8_UNORM,
            Self::R8G8B8 => vk::Format::R8G8B8_UNORM,
            Self::B8G8R8A8 => vk::Format::B8G8R8A8_UNORM,
            Self::B8G8R8 => vk::Format::B8G8R8_UNORM,
            Self::Undefined => vk::Format::UNDEFINED,
        }
    }

    pub fn from_vk(format: vk::Format) -> Self {
        match format {
            vk::Format::R8G8B8A8_UNORM => Self::R8G8B8A8,
            vk::Format::R8G8B8_UNORM => Self::R8G8B8,
            vk::Format::B8G8R8A8_UNORM => Self::B8G8R8A8,
            vk::Format::B8G8R8_UNORM => Self::B8G8R8,
            _ => Self::Undefined,
        }
    }

    /// GL pixel format enum, `GL_NONE` (0) for undefined.
    pub fn to_gl(self) -> u32 {
        match self {
            Self::R8G8B8A8 => GL_RGBA,
            Self::R8G8B8 => GL_RGB,
            Self::B8G8R8A8 => GL_BGRA,
            Self::B8G8R8 => GL_BGR,
            Self::Undefined => 0,
        }
    }

    pub fn from_gl(format: u32) -> Self {
        match format {
            GL_RGBA => Self::R8G8B8A8,
            GL_RGB => Self::R8G8B8,
            GL_BGRA => Self::B8G8R8A8,
            GL_BGR => Self::B8G8R8,
            _ => Self::Undefined,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
