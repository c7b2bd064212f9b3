use ash::vk;
use log::debug;
use wgpu::TextureFormat;

use crate::{
    client::{ImageMetadata, NativeHandle, TextureShareClient, Transfer},
    format::ImageFormat,
    vulkan::VulkanFence,
    Result, TextureShareError,
};

/// Publishes a local texture on a named shared channel.
pub struct TextureSender {
    channel: String,
    registered: Option<ImageMetadata>,
    fence: Option<VulkanFence>,
}

impl TextureSender {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            registered: None,
            fence: None,
        }
    }

    pub fn with_fence(mut self, fence: VulkanFence) -> Self {
        self.fence = Some(fence);
        self
    }

    pub fn channel_name(&self) -> &str {
        &self.channel
    }

    /// Renaming forces the next send to register the new channel.
    pub fn set_channel_name(&mut self, channel: impl Into<String>) {
        let channel = channel.into();
        if channel != self.channel {
            self.channel = channel;
            self.registered = None;
        }
    }

    /// Metadata the channel was last registered with.
    pub fn registered(&self) -> Option<&ImageMetadata> {
        self.registered.as_ref()
    }

    /// Registers the channel for a texture of the given size and format,
    /// unless it already is.
    pub fn update_shared_texture<C>(
        &mut self,
        client: &mut C,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<()>
    where
        C: TextureShareClient + ?Sized,
    {
        let external = ImageFormat::to_external(format);
        if !external.is_defined() {
            return Err(TextureShareError::UnsupportedFormat(format!("{:?}", format)));
        }

        let metadata = ImageMetadata::new(width, height, external);
        if self.registered == Some(metadata) {
            return Ok(());
        }

        debug!("Registering {} as {}x{} {}", self.channel, width, height, external);
        client.init_image(&self.channel, width, height, external, true)?;
        self.registered = Some(metadata);
        Ok(())
    }

    pub fn send<C>(
        &mut self,
        client: &mut C,
        native: NativeHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<()>
    where
        C: TextureShareClient + ?Sized,
    {
        self.update_shared_texture(client, width, height, format)?;

        let fence = self.fence.as_ref().map_or(vk::Fence::null(), VulkanFence::handle);
        let transfer = Transfer::new(
            native,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .with_fence(fence);

        client.send_image(&self.channel, &transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalShareHub;

    const HANDLE: NativeHandle = NativeHandle::OpenGl(7);

    #[test]
    fn first_send_registers_channel() {
        let hub = LocalShareHub::new();
        let mut client = hub.client();
        let mut sender = TextureSender::new("demo");

        sender.send(&mut client, HANDLE, 64, 64, TextureFormat::Rgba8Unorm).unwrap();

        assert_eq!(hub.metadata("demo"), Some(ImageMetadata::new(64, 64, ImageFormat::R8G8B8A8)));
        assert_eq!(hub.frames_sent("demo"), 1);
    }

    #[test]
    fn resize_reregisters_channel() {
        let hub = LocalShareHub::new();
        let mut client = hub.client();
        let mut consumer = hub.client();
        let mut sender = TextureSender::new("demo");

        sender.send(&mut client, HANDLE, 64, 64, TextureFormat::Bgra8Unorm).unwrap();
        consumer.find_image("demo", true);
        sender.send(&mut client, HANDLE, 64, 64, TextureFormat::Bgra8Unorm).unwrap();
        assert_eq!(consumer.find_image("demo", false), crate::LookupResult::Found);

        sender.send(&mut client, HANDLE, 128, 32, TextureFormat::Bgra8Unorm).unwrap();
        assert_eq!(consumer.find_image("demo", false), crate::LookupResult::RequiresUpdate);
        assert_eq!(hub.metadata("demo"), Some(ImageMetadata::new(128, 32, ImageFormat::B8G8R8A8)));
    }

    #[test]
    fn unsupported_format_sends_nothing() {
        let hub = LocalShareHub::new();
        let mut client = hub.client();
        let mut sender = TextureSender::new("demo");

        let err = sender
            .send(&mut client, HANDLE, 64, 64, TextureFormat::Rgba16Float)
            .unwrap_err();
        assert!(matches!(err, TextureShareError::UnsupportedFormat(_)));
        assert_eq!(hub.metadata("demo"), None);
        assert!(sender.registered().is_none());
    }

    #[test]
    fn rename_registers_new_channel() {
        let hub = LocalShareHub::new();
        let mut client = hub.client();
        let mut sender = TextureSender::new("first");

        sender.send(&mut client, HANDLE, 16, 16, TextureFormat::Rgba8Unorm).unwrap();
        sender.set_channel_name("second");
        assert!(sender.registered().is_none());
        sender.send(&mut client, HANDLE, 16, 16, TextureFormat::Rgba8Unorm).unwrap();

        assert_eq!(hub.frames_sent("first"), 1);
        assert_eq!(hub.frames_sent("second"), 1);
    }
}
