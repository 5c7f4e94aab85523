//! Resolve a synthetic clip and pull every frame through the decoder.
//!
//! ```text
//! cargo run -p vidpower-decoder --example resolve
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use vidpower_decoder::{clip_decoder, Decoder, DecoderEvent, FrameSink, ReadyOutcome};
use vidpower_model::{
    Buffering, LayerClass, ModelConfig, PixelBufferFlag, PixelFormat, SyntheticClip, VideoSource,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = ModelConfig::builder()
        .layer_class(LayerClass::CaLayer)
        .buffering(Buffering::Recreated)
        .format(PixelFormat::Yuv420BiPlanarFullRange)
        .pixel_buffer(PixelBufferFlag::GpuTextureBacked.into())
        .frame_size(320, 180)
        .video_source(VideoSource::Synthetic(SyntheticClip::new(12, 24).with_corrupt_frame(5)))
        .build();
    config.check()?;

    let (tx, mut rx) = mpsc::channel(1);
    let mut decoder = clip_decoder(Some(Duration::from_secs(5)));

    match decoder.reset(Arc::new(config), FrameSink::new(1, tx)).await {
        ReadyOutcome::Ready => {}
        ReadyOutcome::Failed(e) => return Err(e.into()),
        ReadyOutcome::Cancelled => return Ok(()),
    }

    // Raw surface sessions are push-once: one request, one event
    loop {
        decoder.request_frames();
        match rx.recv().await {
            Some(DecoderEvent::Frame { frame, .. }) => {
                println!("frame {:>3} pts {:?}", frame.index(), frame.pts());
            }
            Some(DecoderEvent::Dropped { reason, .. }) => println!("dropped: {reason}"),
            Some(DecoderEvent::EndOfStream { .. }) | None => break,
        }
    }

    println!("{:?}", decoder.stats());
    Ok(())
}
