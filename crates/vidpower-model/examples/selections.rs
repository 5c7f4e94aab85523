//! Configuration example
//!
//! This example demonstrates:
//! - Building a config and applying UI selections by integer tag
//! - Rejecting unknown tags
//! - Listing every configuration the pipeline can present
//!
//! Run with: cargo run -p vidpower-model --example selections

use vidpower_model::{supported_configs, ModelConfig, Selection, SyntheticClip, VideoSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== vidpower-model Configuration Example ===\n");

    let base = ModelConfig::builder()
        .video_source(VideoSource::Synthetic(SyntheticClip::default()))
        .build();
    println!("1. Default config:\n   {}\n", base.summary());

    // Each selection yields a new config; `base` is untouched
    let raw = base
        .apply(Selection::LayerClass(1))?
        .apply(Selection::Format(2))?
        .apply(Selection::TogglePixelBuffer(2))?;
    println!("2. After selecting CaLayer / 420v / compositor surfaces:");
    println!("   {}", raw.summary());
    println!(
        "   can handle buffers: {}, pulls repeatedly: {}\n",
        raw.can_handle_buffers(),
        raw.will_request_frames_repeatedly()
    );

    match raw.apply(Selection::Buffering(7)) {
        Ok(_) => println!("3. Unexpectedly accepted tag 7\n"),
        Err(e) => println!("3. Unknown tag rejected: {e}\n"),
    }

    let configs = supported_configs(&base);
    println!("4. {} presentable configurations:", configs.len());
    for config in &configs {
        println!("   {}", config.summary());
    }

    Ok(())
}
