use wgpu::TextureFormat;

use crate::{
    client::{ImageMetadata, NativeHandle},
    Result,
};

/// Host rendering API used to create local textures.
///
/// Dropping an allocated texture releases it.
pub trait TextureAllocator {
    type Texture;

    fn allocate(&mut self, width: u32, height: u32, format: TextureFormat)
        -> Result<Self::Texture>;

    fn native_handle(&self, texture: &Self::Texture) -> Result<NativeHandle>;
}

/// Read-only view of a 2D texture.
pub trait Texture2d {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn has_alpha(&self) -> bool;
}

/// A local texture mirrored from a shared channel.
#[derive(Debug)]
pub struct LocalTextureBinding<T> {
    texture: T,
    native: NativeHandle,
    metadata: ImageMetadata,
    host_format: TextureFormat,
}

impl<T> LocalTextureBinding<T> {
    pub fn allocate<A>(
        allocator: &mut A,
        metadata: ImageMetadata,
        host_format: TextureFormat,
    ) -> Result<Self>
    where
        A: TextureAllocator<Texture = T> + ?Sized,
    {
        let texture = allocator.allocate(metadata.width, metadata.height, host_format)?;
        let native = allocator.native_handle(&texture)?;

        Ok(Self {
            texture,
            native,
            metadata,
            host_format,
        })
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }

    /// Metadata of the channel this binding was allocated for.
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn host_format(&self) -> TextureFormat {
        self.host_format
    }
}

impl<T> Texture2d for LocalTextureBinding<T> {
    fn width(&self) -> u32 {
        self.metadata.width
    }

    fn height(&self) -> u32 {
        self.metadata.height
    }

    /// Follows the shared image; a 24-bit channel is opaque even though the
    /// local texture is allocated with an alpha channel.
    fn has_alpha(&self) -> bool {
        self.metadata.format.has_alpha()
    }
}
