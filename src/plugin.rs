use bevy::{
    log::{debug, error, info, warn},
    prelude::*,
    render::{
        render_asset::RenderAssets,
        render_resource::{Extent3d, TextureFormat},
        renderer::RenderDevice,
        texture::GpuImage,
        Extract, ExtractSchedule, Render, RenderApp, RenderSet,
    },
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    binding::Texture2d,
    client::TextureShareClient,
    receiver::{SyncOutcome, TextureReceiver},
    sender::TextureSender,
    vulkan::{self, RenderDeviceAllocator, SharedGpuTexture, VulkanFence},
    TextureShareError,
};

/// When a shared texture is transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncMode {
    /// Receive before every frame is drawn, send after every frame.
    #[default]
    EveryFrame,
    /// Transfer only on frames following a `request_sync` call.
    Manual,
}

#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct TextureShareConfig {
    pub sync_mode: SyncMode,
    pub discard_on_receive: bool,
}

impl Default for TextureShareConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::EveryFrame,
            discard_on_receive: true,
        }
    }
}

#[derive(Resource, Clone)]
pub struct TextureShareClientHandle(pub Arc<Mutex<dyn TextureShareClient>>);

impl TextureShareClientHandle {
    pub fn new(client: impl TextureShareClient + 'static) -> Self {
        Self(Arc::new(Mutex::new(client)))
    }
}

/// Mirrors a shared channel into `image`.
#[derive(Component, Debug, Clone)]
pub struct SharedTexture {
    pub channel: String,
    pub image: Handle<Image>,
    /// Overrides [`TextureShareConfig::sync_mode`].
    pub sync_mode: Option<SyncMode>,
    requested: bool,
}

impl SharedTexture {
    pub fn new(channel: impl Into<String>, image: Handle<Image>) -> Self {
        Self {
            channel: channel.into(),
            image,
            sync_mode: None,
            requested: false,
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = Some(sync_mode);
        self
    }

    pub fn request_sync(&mut self) {
        self.requested = true;
    }

    pub fn is_sync_requested(&self) -> bool {
        self.requested
    }
}

/// Publishes `image` on a shared channel.
#[derive(Component, Debug, Clone)]
pub struct SharedTextureSender {
    pub channel: String,
    pub image: Handle<Image>,
    pub sync_mode: Option<SyncMode>,
    requested: bool,
}

impl SharedTextureSender {
    pub fn new(channel: impl Into<String>, image: Handle<Image>) -> Self {
        Self {
            channel: channel.into(),
            image,
            sync_mode: None,
            requested: false,
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = Some(sync_mode);
        self
    }

    pub fn request_sync(&mut self) {
        self.requested = true;
    }

    pub fn is_sync_requested(&self) -> bool {
        self.requested
    }
}

pub struct TextureSharePlugin {
    pub client: TextureShareClientHandle,
    pub config: TextureShareConfig,
}

impl TextureSharePlugin {
    pub fn new(client: impl TextureShareClient + 'static) -> Self {
        Self::from_handle(TextureShareClientHandle::new(client))
    }

    pub fn from_handle(client: TextureShareClientHandle) -> Self {
        Self {
            client,
            config: TextureShareConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TextureShareConfig) -> Self {
        self.config = config;
        self
    }
}

impl Plugin for TextureSharePlugin {
    fn build(&self, app: &mut App) {
        let received = ReceivedImages::default();
        app.insert_resource(self.config.clone())
            .insert_resource(self.client.clone())
            .insert_resource(received.clone())
            .add_systems(First, clear_sync_requests)
            .add_systems(PreUpdate, resize_received_images);

        let Some(render_app) = app.get_sub_app_mut(RenderApp) else {
            warn!("No render app, shared textures will not be transferred");
            return;
        };

        render_app
            .insert_resource(self.client.clone())
            .insert_resource(received)
            .init_resource::<ExtractedSharing>()
            .init_resource::<ReceiverStates>()
            .init_resource::<SenderStates>()
            .add_systems(ExtractSchedule, extract_shared_textures)
            .add_systems(
                Render,
                (
                    receive_shared_textures.in_set(RenderSet::PrepareResources),
                    send_shared_textures.in_set(RenderSet::Cleanup),
                ),
            );
    }
}

fn wants_sync(sync_mode: Option<SyncMode>, requested: bool, default: SyncMode) -> bool {
    match sync_mode.unwrap_or(default) {
        SyncMode::EveryFrame => true,
        SyncMode::Manual => requested,
    }
}

// Requests were extracted at the end of the previous frame.
fn clear_sync_requests(
    mut receivers: Query<&mut SharedTexture>,
    mut senders: Query<&mut SharedTextureSender>,
) {
    for mut receiver in &mut receivers {
        if receiver.requested {
            receiver.requested = false;
        }
    }
    for mut sender in &mut senders {
        if sender.requested {
            sender.requested = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ReceivedImage {
    size: Extent3d,
    format: TextureFormat,
}

/// Reallocations made by the render world, waiting to be applied to the
/// main-world `Image` assets they replace.
#[derive(Resource, Clone, Default)]
struct ReceivedImages(Arc<Mutex<HashMap<AssetId<Image>, ReceivedImage>>>);

impl ReceivedImages {
    fn record(&self, image: AssetId<Image>, size: Extent3d, format: TextureFormat) {
        if let Ok(mut received) = self.0.lock() {
            received.insert(image, ReceivedImage { size, format });
        }
    }

    fn take(&self) -> HashMap<AssetId<Image>, ReceivedImage> {
        self.0
            .lock()
            .map(|mut received| std::mem::take(&mut *received))
            .unwrap_or_default()
    }
}

/// Gives the `Image` asset the received size and format. The asset change
/// re-prepares the image, which drops bind groups built for the old texture.
fn resize_received_images(received: Res<ReceivedImages>, images: Option<ResMut<Assets<Image>>>) {
    let updates = received.take();
    let Some(mut images) = images else {
        return;
    };

    for (id, update) in updates {
        let Some(image) = images.get(id) else {
            continue;
        };
        if image.texture_descriptor.size == update.size
            && image.texture_descriptor.format == update.format
        {
            continue;
        }
        if let Some(image) = images.get_mut(id) {
            image.texture_descriptor.format = update.format;
            image.resize(update.size);
        }
    }
}

fn received_size(width: u32, height: u32) -> Extent3d {
    Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

#[derive(Debug, Clone)]
struct ExtractedChannel {
    entity: Entity,
    channel: String,
    image: AssetId<Image>,
    active: bool,
}

#[derive(Resource, Default)]
struct ExtractedSharing {
    receivers: Vec<ExtractedChannel>,
    senders: Vec<ExtractedChannel>,
    discard_on_receive: bool,
}

fn extract_shared_textures(
    mut extracted: ResMut<ExtractedSharing>,
    config: Extract<Res<TextureShareConfig>>,
    receivers: Extract<Query<(Entity, &SharedTexture)>>,
    senders: Extract<Query<(Entity, &SharedTextureSender)>>,
) {
    extracted.discard_on_receive = config.discard_on_receive;

    extracted.receivers.clear();
    for (entity, receiver) in &receivers {
        extracted.receivers.push(ExtractedChannel {
            entity,
            channel: receiver.channel.clone(),
            image: receiver.image.id(),
            active: wants_sync(receiver.sync_mode, receiver.requested, config.sync_mode),
        });
    }

    extracted.senders.clear();
    for (entity, sender) in &senders {
        extracted.senders.push(ExtractedChannel {
            entity,
            channel: sender.channel.clone(),
            image: sender.image.id(),
            active: wants_sync(sender.sync_mode, sender.requested, config.sync_mode),
        });
    }
}

struct ReceiverState {
    receiver: TextureReceiver<SharedGpuTexture>,
    last_error: Option<TextureShareError>,
}

#[derive(Resource, Default)]
struct ReceiverStates(HashMap<Entity, ReceiverState>);

struct SenderState {
    sender: TextureSender,
    last_error: Option<TextureShareError>,
}

#[derive(Resource, Default)]
struct SenderStates(HashMap<Entity, SenderState>);

/// Logs an error only when it differs from the previous frame's.
fn report(channel: &str, last_error: &mut Option<TextureShareError>, result: crate::Result<()>) {
    match result {
        Ok(()) => {
            if last_error.take().is_some() {
                info!("Shared texture {} recovered", channel);
            }
        }
        Err(e) => {
            if last_error.as_ref() != Some(&e) {
                match e {
                    TextureShareError::ChannelNotFound(_) => {
                        debug!("Waiting for shared texture {}", channel)
                    }
                    _ => warn!("Shared texture {} failed: {}", channel, e),
                }
                *last_error = Some(e);
            }
        }
    }
}

fn new_fence(render_device: &RenderDevice) -> Option<VulkanFence> {
    match VulkanFence::from_render_device(render_device) {
        Ok(fence) => Some(fence),
        Err(e) => {
            debug!("Transferring without fence: {}", e);
            None
        }
    }
}

fn receive_shared_textures(
    extracted: Res<ExtractedSharing>,
    client: Res<TextureShareClientHandle>,
    render_device: Res<RenderDevice>,
    received: Res<ReceivedImages>,
    mut states: ResMut<ReceiverStates>,
    mut gpu_images: ResMut<RenderAssets<GpuImage>>,
) {
    states
        .0
        .retain(|entity, _| extracted.receivers.iter().any(|r| r.entity == *entity));

    if extracted.receivers.is_empty() {
        return;
    }

    let Ok(mut client) = client.0.lock() else {
        error!("Texture share client poisoned");
        return;
    };
    let mut allocator = RenderDeviceAllocator::new((*render_device).clone());

    for channel in &extracted.receivers {
        let state = states.0.entry(channel.entity).or_insert_with(|| {
            let mut receiver = TextureReceiver::new(channel.channel.clone())
                .with_discard_on_receive(extracted.discard_on_receive);
            if let Some(fence) = new_fence(&render_device) {
                receiver = receiver.with_fence(fence);
            }
            ReceiverState {
                receiver,
                last_error: None,
            }
        });

        if state.receiver.channel_name() != channel.channel {
            state.receiver.set_channel_name(channel.channel.clone());
        }

        if channel.active {
            let result = state.receiver.synchronize(&mut *client, &mut allocator);
            if let (Ok(SyncOutcome::Reallocated), Some(binding)) =
                (&result, state.receiver.binding())
            {
                info!(
                    "Shared texture {} is now {}x{}",
                    channel.channel,
                    binding.width(),
                    binding.height()
                );
                received.record(
                    channel.image,
                    received_size(binding.width(), binding.height()),
                    binding.host_format(),
                );
            }
            report(&channel.channel, &mut state.last_error, result.map(|_| ()));
        }

        let (Some(binding), Some(gpu_image)) =
            (state.receiver.binding(), gpu_images.get_mut(channel.image))
        else {
            continue;
        };

        // Re-applied whenever the image is prepared again from its asset.
        let shared = binding.texture();
        if gpu_image.texture.id() != shared.texture.id() {
            gpu_image.texture = shared.texture.clone();
            gpu_image.texture_view = shared.view.clone();
            gpu_image.texture_format = binding.host_format();
            gpu_image.size = received_size(binding.width(), binding.height());
            gpu_image.mip_level_count = 1;
        }
    }
}

fn send_shared_textures(
    extracted: Res<ExtractedSharing>,
    client: Res<TextureShareClientHandle>,
    render_device: Res<RenderDevice>,
    mut states: ResMut<SenderStates>,
    gpu_images: Res<RenderAssets<GpuImage>>,
) {
    states
        .0
        .retain(|entity, _| extracted.senders.iter().any(|s| s.entity == *entity));

    if extracted.senders.is_empty() {
        return;
    }

    let Ok(mut client) = client.0.lock() else {
        error!("Texture share client poisoned");
        return;
    };

    for channel in extracted.senders.iter().filter(|s| s.active) {
        let state = states.0.entry(channel.entity).or_insert_with(|| {
            let mut sender = TextureSender::new(channel.channel.clone());
            if let Some(fence) = new_fence(&render_device) {
                sender = sender.with_fence(fence);
            }
            SenderState {
                sender,
                last_error: None,
            }
        });

        state.sender.set_channel_name(channel.channel.clone());

        // Not uploaded yet.
        let Some(gpu_image) = gpu_images.get(channel.image) else {
            continue;
        };

        let result = vulkan::native_handle(&gpu_image.texture).and_then(|native| {
            state.sender.send(
                &mut *client,
                native,
                gpu_image.texture.width(),
                gpu_image.texture.height(),
                gpu_image.texture_format,
            )
        });
        report(&channel.channel, &mut state.last_error, result);
    }
}
