//! In-process implementation of [`TextureShareClient`].
//!
//! A [`LocalShareHub`] plays the role of the sharing server: it owns the
//! channel table. Every [`LocalShareClient`] created from it keeps its own
//! cached view of channel metadata, so lookups behave like the cross-process
//! library's (a producer resize shows up as [`LookupResult::RequiresUpdate`]
//! until the client refreshes).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};

use crate::{
    client::{ImageMetadata, LookupResult, TextureShareClient, Transfer},
    format::ImageFormat,
    Result, TextureShareError,
};

#[derive(Debug, Clone)]
struct Channel {
    metadata: ImageMetadata,
    generation: u64,
    frames_sent: u64,
    frames_received: u64,
}

#[derive(Debug, Default)]
struct ChannelTable {
    channels: HashMap<String, Channel>,
    /// Hub-wide, so a re-registered channel never reuses a generation.
    next_generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LocalShareHub {
    table: Arc<Mutex<ChannelTable>>,
}

impl LocalShareHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> LocalShareClient {
        LocalShareClient {
            hub: self.clone(),
            cache: HashMap::new(),
        }
    }

    pub fn metadata(&self, name: &str) -> Option<ImageMetadata> {
        self.lock().ok()?.channels.get(name).map(|channel| channel.metadata)
    }

    pub fn frames_sent(&self, name: &str) -> u64 {
        self.read_counter(name, |channel| channel.frames_sent)
    }

    pub fn frames_received(&self, name: &str) -> u64 {
        self.read_counter(name, |channel| channel.frames_received)
    }

    /// Unregisters a channel, as if its producer went away.
    pub fn remove(&self, name: &str) -> bool {
        match self.lock() {
            Ok(mut table) => table.channels.remove(name).is_some(),
            Err(_) => false,
        }
    }

    fn read_counter(&self, name: &str, counter: impl Fn(&Channel) -> u64) -> u64 {
        self.lock()
            .ok()
            .and_then(|table| table.channels.get(name).map(&counter))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelTable>> {
        self.table
            .lock()
            .map_err(|_| TextureShareError::ChannelError("channel table poisoned".into()))
    }
}

pub struct LocalShareClient {
    hub: LocalShareHub,
    cache: HashMap<String, (ImageMetadata, u64)>,
}

impl LocalShareClient {
    pub fn hub(&self) -> &LocalShareHub {
        &self.hub
    }
}

impl TextureShareClient for LocalShareClient {
    fn find_image(&mut self, name: &str, force_update: bool) -> LookupResult {
        let table = match self.hub.lock() {
            Ok(table) => table,
            Err(e) => {
                warn!("Lookup of {} failed: {}", name, e);
                return LookupResult::Error;
            }
        };

        let Some(channel) = table.channels.get(name) else {
            self.cache.remove(name);
            return LookupResult::NotFound;
        };

        if force_update {
            self.cache
                .insert(name.to_string(), (channel.metadata, channel.generation));
            return LookupResult::Found;
        }

        match self.cache.get(name) {
            Some((_, generation)) if *generation == channel.generation => LookupResult::Found,
            _ => LookupResult::RequiresUpdate,
        }
    }

    fn image_metadata(&self, name: &str) -> Option<ImageMetadata> {
        self.cache.get(name).map(|(metadata, _)| *metadata)
    }

    fn init_image(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        format: ImageFormat,
        overwrite: bool,
    ) -> Result<()> {
        if !format.is_defined() {
            return Err(TextureShareError::UnsupportedFormat(format.to_string()));
        }

        let metadata = ImageMetadata::new(width, height, format);
        let mut table = self.hub.lock()?;

        if !overwrite && table.channels.contains_key(name) {
            return Err(TextureShareError::ChannelError(format!(
                "channel {} already exists",
                name
            )));
        }

        let generation = table.next_generation;
        table.next_generation += 1;

        debug!("Registering channel {} as {:?} (generation {})", name, metadata, generation);
        table.channels.insert(
            name.to_string(),
            Channel {
                metadata,
                generation,
                frames_sent: 0,
                frames_received: 0,
            },
        );
        drop(table);

        // The producer's own view is current.
        self.cache.insert(name.to_string(), (metadata, generation));
        Ok(())
    }

    fn send_image(&mut self, name: &str, _transfer: &Transfer) -> Result<()> {
        let mut table = self.hub.lock()?;
        let channel = table
            .channels
            .get_mut(name)
            .ok_or_else(|| TextureShareError::ChannelNotFound(name.to_string()))?;
        channel.frames_sent += 1;
        Ok(())
    }

    fn recv_image(&mut self, name: &str, _transfer: &Transfer) -> Result<()> {
        let mut table = self.hub.lock()?;
        let channel = table
            .channels
            .get_mut(name)
            .ok_or_else(|| TextureShareError::ChannelNotFound(name.to_string()))?;
        channel.frames_received += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NativeHandle;
    use ash::vk;

    fn transfer() -> Transfer {
        Transfer::new(
            NativeHandle::OpenGl(1),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let hub = LocalShareHub::new();
        let mut client = hub.client();
        assert_eq!(client.find_image("missing", false), LookupResult::NotFound);
        assert_eq!(client.find_image("missing", true), LookupResult::NotFound);
        assert_eq!(client.image_metadata("missing"), None);
    }

    #[test]
    fn stale_cache_requires_update() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        let mut consumer = hub.client();
        producer.init_image("demo", 64, 64, ImageFormat::R8G8B8A8, true).unwrap();

        assert_eq!(consumer.find_image("demo", false), LookupResult::RequiresUpdate);
        assert_eq!(consumer.find_image("demo", true), LookupResult::Found);
        assert_eq!(consumer.find_image("demo", false), LookupResult::Found);

        producer.init_image("demo", 128, 128, ImageFormat::R8G8B8A8, true).unwrap();
        assert_eq!(consumer.find_image("demo", false), LookupResult::RequiresUpdate);
        assert_eq!(
            consumer.image_metadata("demo"),
            Some(ImageMetadata::new(64, 64, ImageFormat::R8G8B8A8))
        );
    }

    #[test]
    fn init_without_overwrite_keeps_existing_channel() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        producer.init_image("demo", 64, 64, ImageFormat::R8G8B8A8, true).unwrap();

        let err = producer
            .init_image("demo", 32, 32, ImageFormat::R8G8B8A8, false)
            .unwrap_err();
        assert!(matches!(err, TextureShareError::ChannelError(_)));
        assert_eq!(hub.metadata("demo"), Some(ImageMetadata::new(64, 64, ImageFormat::R8G8B8A8)));
    }

    #[test]
    fn undefined_format_is_rejected() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        assert!(producer.init_image("demo", 8, 8, ImageFormat::Undefined, true).is_err());
        assert_eq!(hub.metadata("demo"), None);
    }

    #[test]
    fn transfers_are_counted() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        let mut consumer = hub.client();
        assert!(producer.send_image("demo", &transfer()).is_err());

        producer.init_image("demo", 4, 4, ImageFormat::B8G8R8A8, true).unwrap();
        producer.send_image("demo", &transfer()).unwrap();
        producer.send_image("demo", &transfer()).unwrap();
        consumer.recv_image("demo", &transfer()).unwrap();

        assert_eq!(hub.frames_sent("demo"), 2);
        assert_eq!(hub.frames_received("demo"), 1);
    }

    #[test]
    fn reregistered_channel_gets_fresh_generation() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        let mut consumer = hub.client();
        producer.init_image("demo", 4, 4, ImageFormat::R8G8B8A8, true).unwrap();
        consumer.find_image("demo", true);

        hub.remove("demo");
        hub.client().init_image("demo", 8, 8, ImageFormat::R8G8B8A8, true).unwrap();
        assert_eq!(consumer.find_image("demo", false), LookupResult::RequiresUpdate);
    }

    #[test]
    fn removed_channel_drops_cached_metadata() {
        let hub = LocalShareHub::new();
        let mut producer = hub.client();
        let mut consumer = hub.client();
        producer.init_image("demo", 4, 4, ImageFormat::R8G8B8A8, true).unwrap();
        consumer.find_image("demo", true);

        assert!(hub.remove("demo"));
        assert_eq!(consumer.find_image("demo", false), LookupResult::NotFound);
        assert_eq!(consumer.image_metadata("demo"), None);
    }
}
