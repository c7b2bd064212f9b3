use ash::vk;
use log::debug;

use crate::{
    binding::{LocalTextureBinding, Texture2d, TextureAllocator},
    client::{ImageMetadata, TextureShareClient, Transfer},
    resolver::{resolve, Resolution},
    vulkan::VulkanFence,
    Result, TextureShareError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Pixels were copied into the existing local texture.
    Transferred,
    /// The local texture was recreated for new channel metadata, then filled.
    Reallocated,
}

/// Keeps a local texture mirrored to a named shared channel.
pub struct TextureReceiver<T> {
    channel: String,
    binding: Option<LocalTextureBinding<T>>,
    fence: Option<VulkanFence>,
    discard_on_receive: bool,
}

impl<T> TextureReceiver<T> {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            binding: None,
            fence: None,
            discard_on_receive: true,
        }
    }

    pub fn with_fence(mut self, fence: VulkanFence) -> Self {
        self.fence = Some(fence);
        self
    }

    /// When set (the default), old texture contents are not preserved across
    /// a receive.
    pub fn with_discard_on_receive(mut self, discard: bool) -> Self {
        self.discard_on_receive = discard;
        self
    }

    pub fn channel_name(&self) -> &str {
        &self.channel
    }

    /// Points the receiver at another channel. The current texture stays
    /// visible until the next successful [`synchronize`](Self::synchronize).
    pub fn set_channel_name(&mut self, channel: impl Into<String>) {
        self.channel = channel.into();
    }

    pub fn binding(&self) -> Option<&LocalTextureBinding<T>> {
        self.binding.as_ref()
    }

    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.binding.as_ref().map(|binding| binding.metadata())
    }

    pub fn release(&mut self) {
        self.binding = None;
    }

    /// Resolves the channel, reallocates the local texture when the channel's
    /// metadata changed, and copies the channel's pixels into it.
    ///
    /// On error the previous binding is left untouched.
    pub fn synchronize<C, A>(&mut self, client: &mut C, allocator: &mut A) -> Result<SyncOutcome>
    where
        C: TextureShareClient + ?Sized,
        A: TextureAllocator<Texture = T> + ?Sized,
    {
        let cached = self.binding.as_ref().map(|binding| *binding.metadata());

        let candidate = match resolve(client, &self.channel, cached.as_ref())? {
            Resolution::NotFound => {
                return Err(TextureShareError::ChannelNotFound(self.channel.clone()));
            }
            Resolution::UpToDate => None,
            Resolution::Changed(metadata) => {
                let host_format = metadata.format.to_host().ok_or_else(|| {
                    TextureShareError::UnsupportedFormat(metadata.format.to_string())
                })?;
                Some(LocalTextureBinding::allocate(allocator, metadata, host_format)?)
            }
        };

        let target = candidate
            .as_ref()
            .or(self.binding.as_ref())
            .map(LocalTextureBinding::native_handle)
            .ok_or_else(|| {
                TextureShareError::ChannelError(format!("no local texture for {}", self.channel))
            })?;

        let src_layout = if self.discard_on_receive {
            vk::ImageLayout::UNDEFINED
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        };
        let fence = self.fence.as_ref().map_or(vk::Fence::null(), VulkanFence::handle);
        let transfer = Transfer::new(target, src_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .with_fence(fence);

        client.recv_image(&self.channel, &transfer)?;

        match candidate {
            Some(binding) => {
                debug!(
                    "Reallocated {} as {}x{} {:?}",
                    self.channel,
                    binding.width(),
                    binding.height(),
                    binding.host_format()
                );
                // Replacing drops, and thereby releases, the previous texture.
                self.binding = Some(binding);
                Ok(SyncOutcome::Reallocated)
            }
            None => Ok(SyncOutcome::Transferred),
        }
    }
}

impl<T> Texture2d for TextureReceiver<T> {
    fn width(&self) -> u32 {
        self.binding.as_ref().map_or(0, Texture2d::width)
    }

    fn height(&self) -> u32 {
        self.binding.as_ref().map_or(0, Texture2d::height)
    }

    fn has_alpha(&self) -> bool {
        self.binding.as_ref().is_some_and(Texture2d::has_alpha)
    }
}
