// Mirrors the "demo" channel into a sprite.
//
// `LocalShareHub` only exists inside this process, so the demo also runs the
// producer side as a loopback. A cross-process sharing library plugs in by
// implementing `TextureShareClient` and passing it to `TextureSharePlugin`.
use bevy::{
    asset::RenderAssetUsages,
    log::info,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages},
};
use bevy_texture_share::{
    LocalShareHub, SharedTexture, SharedTextureSender, SyncMode, TextureSharePlugin,
};

const CHANNEL: &str = "demo";

#[derive(Resource)]
struct Demo {
    hub: LocalShareHub,
}

fn main() {
    let hub = LocalShareHub::new();

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(TextureSharePlugin::new(hub.client()))
        .insert_resource(Demo { hub })
        .add_systems(Startup, setup)
        .add_systems(Update, (request_on_space, log_channel))
        .run();
}

fn solid_image(size: u32, color: [u8; 4], usage: TextureUsages) -> Image {
    let mut image = Image::new_fill(
        Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &color,
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage |= usage;
    image
}

fn setup(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    commands.spawn(Camera2d);

    // Producer.
    let source = images.add(solid_image(128, [40, 160, 220, 255], TextureUsages::COPY_SRC));
    commands.spawn((
        Sprite::from_image(source.clone()),
        Transform::from_xyz(-160.0, 0.0, 0.0),
    ));
    commands.spawn(SharedTextureSender::new(CHANNEL, source));

    // Consumer. The placeholder is shown until the first receive.
    let mirror = images.add(solid_image(1, [255, 0, 255, 255], TextureUsages::empty()));
    commands.spawn((
        Sprite::from_image(mirror.clone()),
        Transform::from_xyz(160.0, 0.0, 0.0),
    ));
    commands.spawn(SharedTexture::new(CHANNEL, mirror).with_sync_mode(SyncMode::Manual));

    info!("Press space to receive from {}", CHANNEL);
}

fn request_on_space(keys: Res<ButtonInput<KeyCode>>, mut receivers: Query<&mut SharedTexture>) {
    if keys.just_pressed(KeyCode::Space) {
        for mut receiver in &mut receivers {
            receiver.request_sync();
        }
    }
}

fn log_channel(demo: Res<Demo>, mut frames: Local<u32>) {
    *frames += 1;
    if *frames % 120 == 0 {
        info!(
            "{}: {:?}, {} sent, {} received",
            CHANNEL,
            demo.hub.metadata(CHANNEL),
            demo.hub.frames_sent(CHANNEL),
            demo.hub.frames_received(CHANNEL)
        );
    }
}
