//! Playback example
//!
//! This example demonstrates:
//! - Spawning a pipeline over the built-in clip decoder
//! - Playing a synthetic clip to the end with a 60 Hz refresh
//! - A full-screen round trip in the middle of playback
//!
//! Run with: cargo run -p vidpower-pipeline --example playback

use std::time::Duration;

use vidpower_model::{
    Buffering, LayerClass, ModelConfig, PixelBufferFlag, PixelFormat, SyntheticClip, VideoSource,
};
use vidpower_pipeline::{
    spawn_clip_pipeline, FullScreenEvent, HeadlessCompositor, PipelineConfig, PipelineState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = PipelineConfig::builder()
        .refresh_interval(Duration::from_millis(16))
        .resolve_timeout(Duration::from_secs(5))
        .build();
    let compositor = HeadlessCompositor::new();
    let (handle, task) = spawn_clip_pipeline(config, compositor.clone())?;

    let model = ModelConfig::builder()
        .layer_class(LayerClass::CaLayer)
        .buffering(Buffering::Direct)
        .format(PixelFormat::Yuv420BiPlanarVideoRange)
        .pixel_buffer(PixelBufferFlag::GpuTextureBacked | PixelBufferFlag::CompositorSurfaceBacked)
        .frame_size(640, 360)
        .flashing_overlay(true)
        .video_source(VideoSource::Synthetic(SyntheticClip::new(90, 30)))
        .build();

    println!("Playing {}", model.summary());
    handle.reset_with_model(model).await?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    handle.full_screen(FullScreenEvent::WillEnter).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.full_screen(FullScreenEvent::DidEnter).await?;

    handle.wait_for_state(PipelineState::Idle).await?;

    println!("Presented {} frames", compositor.presented_count());
    println!("Pipeline:  {:?}", handle.stats().await?);
    println!("Presenter: {:?}", handle.presenter_stats().await?);
    println!("Decoder:   {:?}", handle.decoder_stats().await?);

    handle.shutdown().await?;
    task.await?;
    Ok(())
}
