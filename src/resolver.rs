use log::trace;

use crate::{
    client::{ImageMetadata, LookupResult, TextureShareClient},
    Result, TextureShareError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    NotFound,
    UpToDate,
    Changed(ImageMetadata),
}

/// Looks up `name` and compares its metadata against `cached`.
///
/// A cheap lookup is tried first; only when the client reports its copy as
/// stale is a forced refresh issued. The producer may change or drop the
/// channel between the two lookups, so the refresh result is authoritative.
pub fn resolve<C>(
    client: &mut C,
    name: &str,
    cached: Option<&ImageMetadata>,
) -> Result<Resolution>
where
    C: TextureShareClient + ?Sized,
{
    match client.find_image(name, false) {
        LookupResult::Found => {}
        LookupResult::NotFound => return Ok(Resolution::NotFound),
        LookupResult::Error => return Err(lookup_error(name)),
        LookupResult::RequiresUpdate => match client.find_image(name, true) {
            LookupResult::Found => {}
            LookupResult::NotFound => return Ok(Resolution::NotFound),
            LookupResult::Error | LookupResult::RequiresUpdate => return Err(lookup_error(name)),
        },
    }

    let Some(metadata) = client.image_metadata(name) else {
        return Ok(Resolution::NotFound);
    };

    if cached == Some(&metadata) {
        Ok(Resolution::UpToDate)
    } else {
        trace!("Channel {} changed to {:?}", name, metadata);
        Ok(Resolution::Changed(metadata))
    }
}

fn lookup_error(name: &str) -> TextureShareError {
    TextureShareError::ChannelError(format!("lookup of {} failed", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{format::ImageFormat, local::LocalShareHub, client::Transfer};

    const RGBA_64: ImageMetadata = ImageMetadata {
        width: 64,
        height: 64,
        format: ImageFormat::R8G8B8A8,
    };

    #[test]
    fn first_resolve_reports_change() {
        let hub = LocalShareHub::new();
        hub.client().init_image("demo", 64, 64, ImageFormat::R8G8B8A8, true).unwrap();

        let mut consumer = hub.client();
        assert_eq!(resolve(&mut consumer, "demo", None), Ok(Resolution::Changed(RGBA_64)));
    }

    #[test]
    fn unchanged_channel_stays_up_to_date() {
        let hub = LocalShareHub::new();
        hub.client().init_image("demo", 64, 64, ImageFormat::R8G8B8A8, true).unwrap();

        let mut consumer = hub.client();
        resolve(&mut consumer, "demo", None).unwrap();
        assert_eq!(resolve(&mut consumer, "demo", Some(&RGBA_64)), Ok(Resolution::UpToDate));
        assert_eq!(resolve(&mut consumer, "demo", Some(&RGBA_64)), Ok(Resolution::UpToDate));
    }

    #[test]
    fn never_registered_channel_is_not_found() {
        let hub = LocalShareHub::new();
        let mut consumer = hub.client();
        assert_eq!(resolve(&mut consumer, "nobody", None), Ok(Resolution::NotFound));
    }

    /// Reports a stale cache, then loses the channel on the forced refresh.
    struct VanishingClient;

    impl TextureShareClient for VanishingClient {
        fn find_image(&mut self, _name: &str, force_update: bool) -> LookupResult {
            if force_update {
                LookupResult::NotFound
            } else {
                LookupResult::RequiresUpdate
            }
        }

        fn image_metadata(&self, _name: &str) -> Option<ImageMetadata> {
            Some(RGBA_64)
        }

        fn init_image(&mut self, _: &str, _: u32, _: u32, _: ImageFormat, _: bool) -> Result<()> {
            Ok(())
        }

        fn send_image(&mut self, _: &str, _: &Transfer) -> Result<()> {
            Ok(())
        }

        fn recv_image(&mut self, _: &str, _: &Transfer) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn refresh_result_is_authoritative() {
        let mut client = VanishingClient;
        assert_eq!(resolve(&mut client, "demo", None), Ok(Resolution::NotFound));
    }
}
