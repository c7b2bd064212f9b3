use ash::vk;
use bevy::render::{
    render_resource::{
        Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
        TextureView, TextureViewDescriptor,
    },
    renderer::RenderDevice,
};
use std::sync::Arc;
use wgpu_hal::api::Vulkan as VulkanApi;

use crate::{
    binding::TextureAllocator,
    client::NativeHandle,
    Result, TextureShareError,
};

/// Fence handed to the sharing library to order copies against prior GPU
/// work. Destroyed on drop.
pub struct VulkanFence {
    device: Arc<ash::Device>,
    fence: vk::Fence,
}

impl VulkanFence {
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        let create_info = vk::FenceCreateInfo::default();

        let fence = unsafe { device.create_fence(&create_info, None) }
            .map_err(|e| {
                TextureShareError::AllocationFailed(format!("Failed to create fence: {:?}", e))
            })?;

        Ok(Self { device, fence })
    }

    pub fn from_render_device(render_device: &RenderDevice) -> Result<Self> {
        Self::new(raw_device(render_device)?)
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Raw Vulkan device behind Bevy's render device.
pub fn raw_device(render_device: &RenderDevice) -> Result<Arc<ash::Device>> {
    let wgpu_device = render_device.wgpu_device();

    let device = unsafe {
        wgpu_device.as_hal::<VulkanApi, _, Option<ash::Device>>(|hal_device| {
            hal_device.map(|hal_device| hal_device.raw_device().clone())
        })
    };

    device
        .map(Arc::new)
        .ok_or_else(|| TextureShareError::UnsupportedBackend("Not using Vulkan backend".into()))
}

/// `VkImage` backing a wgpu texture.
pub fn native_handle(texture: &wgpu::Texture) -> Result<NativeHandle> {
    let image = unsafe {
        texture.as_hal::<VulkanApi, _, Option<vk::Image>>(|hal_texture| {
            hal_texture.map(|hal_texture| hal_texture.raw_handle())
        })
    };

    image
        .map(NativeHandle::Vulkan)
        .ok_or_else(|| {
            TextureShareError::UnsupportedBackend("Texture is not a Vulkan image".into())
        })
}

#[derive(Clone)]
pub struct SharedGpuTexture {
    pub texture: Texture,
    pub view: TextureView,
}

/// Allocates receive targets on Bevy's render device.
pub struct RenderDeviceAllocator {
    render_device: RenderDevice,
}

impl RenderDeviceAllocator {
    pub fn new(render_device: RenderDevice) -> Self {
        Self { render_device }
    }
}

impl TextureAllocator for RenderDeviceAllocator {
    type Texture = SharedGpuTexture;

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<SharedGpuTexture> {
        if width == 0 || height == 0 {
            return Err(TextureShareError::AllocationFailed(format!(
                "Invalid texture size {}x{}",
                width, height
            )));
        }

        let texture = self.render_device.create_texture(&TextureDescriptor {
            label: Some("shared_texture"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_DST
                | TextureUsages::COPY_SRC
                | TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let view = texture.create_view(&TextureViewDescriptor {
            label: Some("shared_texture_view"),
            ..Default::default()
        });

        Ok(SharedGpuTexture { texture, view })
    }

    fn native_handle(&self, texture: &SharedGpuTexture) -> Result<NativeHandle> {
        native_handle(&texture.texture)
    }
}
