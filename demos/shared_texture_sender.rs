// Publishes an animated texture on the "demo" channel.
use bevy::{
    asset::RenderAssetUsages,
    log::info,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages},
};
use bevy_texture_share::{LocalShareHub, SharedTextureSender, TextureSharePlugin};

const CHANNEL: &str = "demo";
const SIZE: u32 = 256;

#[derive(Resource)]
struct Demo {
    hub: LocalShareHub,
    image: Handle<Image>,
}

fn main() {
    let hub = LocalShareHub::new();

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(TextureSharePlugin::new(hub.client()))
        .insert_resource(Demo {
            hub,
            image: Handle::default(),
        })
        .add_systems(Startup, setup)
        .add_systems(Update, (animate_texture, log_frames_sent))
        .run();
}

fn setup(mut commands: Commands, mut images: ResMut<Assets<Image>>, mut demo: ResMut<Demo>) {
    let mut image = Image::new_fill(
        Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 255],
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::default(),
    );
    // The sharing library copies out of the texture.
    image.texture_descriptor.usage |= TextureUsages::COPY_SRC;
    demo.image = images.add(image);

    commands.spawn(Camera2d);
    commands.spawn(Sprite::from_image(demo.image.clone()));
    commands.spawn(SharedTextureSender::new(CHANNEL, demo.image.clone()));

    info!("Sharing a {}x{} texture on channel {}", SIZE, SIZE, CHANNEL);
}

fn animate_texture(time: Res<Time>, demo: Res<Demo>, mut images: ResMut<Assets<Image>>) {
    let Some(data) = images.get_mut(&demo.image).and_then(|image| image.data.as_mut()) else {
        return;
    };

    let t = time.elapsed_secs();
    for (i, pixel) in data.chunks_exact_mut(4).enumerate() {
        let x = (i as u32 % SIZE) as f32 / SIZE as f32;
        let y = (i as u32 / SIZE) as f32 / SIZE as f32;
        pixel[0] = ((x + t * 0.25).fract() * 255.0) as u8;
        pixel[1] = ((y + t * 0.1).fract() * 255.0) as u8;
        pixel[2] = (((t * 2.0).sin() * 0.5 + 0.5) * 255.0) as u8;
    }
}

fn log_frames_sent(demo: Res<Demo>, mut frames: Local<u32>) {
    *frames += 1;
    if *frames % 120 == 0 {
        info!("Sent {} frames on {}", demo.hub.frames_sent(CHANNEL), CHANNEL);
    }
}
