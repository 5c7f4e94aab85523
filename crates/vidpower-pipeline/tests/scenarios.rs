//! End-to-end pipeline scenarios over the synthetic clip decoder.

use std::sync::Arc;
use std::time::Duration;

use vidpower_decoder::{ClipResolver, DecodeError, VideoDecoder};
use vidpower_model::{
    supported_configs, BitFlags, Buffering, FrameBuffer, LayerClass, ModelConfig, PixelBufferFlag,
    PixelFormat, SampleBuffer, SurfaceFrame, SyntheticClip, VideoSource,
};
use vidpower_pipeline::{
    spawn_clip_pipeline, Compositor, FullScreenEvent, HeadlessCompositor, LayerHost, LayerKind,
    LayerPresenter, Pipeline, PipelineConfig, PipelineError, PipelineHandle, PipelineState,
    PresentError, Presenter, PresenterStats, ResetOutcome,
};

const REFRESH: Duration = Duration::from_millis(16);

fn refreshing() -> PipelineConfig {
    PipelineConfig::builder().refresh_interval(REFRESH).build()
}

fn clip(frames: u32) -> VideoSource {
    VideoSource::Synthetic(SyntheticClip::new(frames, 10))
}

fn raw_config(frames: u32, buffering: Buffering) -> ModelConfig {
    ModelConfig::builder()
        .layer_class(LayerClass::CaLayer)
        .buffering(buffering)
        .format(PixelFormat::Yuv420BiPlanarVideoRange)
        .pixel_buffer(BitFlags::from_flag(PixelBufferFlag::CompositorSurfaceBacked))
        .frame_size(16, 16)
        .video_source(clip(frames))
        .build()
}

fn frame_pts(index: u64) -> Duration {
    Duration::from_millis(100) * u32::try_from(index).expect("small index")
}

async fn run_to_idle(handle: &PipelineHandle) {
    tokio::time::timeout(Duration::from_secs(600), handle.wait_for_state(PipelineState::Idle))
        .await
        .expect("pipeline did not go idle")
        .expect("pipeline closed");
}

/// Refresh until a frame is on screen
async fn show_first_frame(handle: &PipelineHandle) {
    for _ in 0..1000 {
        if handle.display_refresh().await.expect("refresh") {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("no frame reached the screen");
}

#[tokio::test(start_paused = true)]
async fn test_direct_raw_surface_clip_plays_to_end() {
    let compositor = HeadlessCompositor::new();
    let (handle, _task) = spawn_clip_pipeline(refreshing(), compositor.clone()).expect("pipeline");

    let outcome = handle
        .reset_with_model(raw_config(10, Buffering::Direct))
        .await
        .expect("reset");
    assert_eq!(outcome, ResetOutcome::Ready);

    run_to_idle(&handle).await;

    let presenter = handle.presenter_stats().await.expect("stats");
    assert_eq!(presenter.accepted, 10);
    assert_eq!(presenter.rejected, 0);

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.end_of_streams, 1);
    assert_eq!(stats.frames_delivered, 10);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(handle.state(), PipelineState::Idle);

    let expected: Vec<Duration> = (0..10).map(frame_pts).collect();
    assert_eq!(compositor.presented_pts(), expected);
}

#[tokio::test]
async fn test_unreadable_asset_fails_once_without_requests() {
    let (handle, _task) =
        spawn_clip_pipeline(PipelineConfig::default(), HeadlessCompositor::new()).expect("pipeline");

    let config = ModelConfig::builder()
        .video_source(VideoSource::File("/nonexistent/clip.mov".into()))
        .build();
    let err = handle.reset_with_model(config).await.expect_err("resolution fails");
    assert!(matches!(
        err,
        PipelineError::AssetResolution(DecodeError::AssetUnreadable { .. })
    ));

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.frames_requested, 0);
    assert_eq!(stats.sessions, 1);
    assert_eq!(handle.state(), PipelineState::Idle);

    let decoder = handle.decoder_stats().await.expect("stats");
    assert_eq!(decoder.resolution_failures, 1);
}

/// Presenter that refuses one frame index
struct RefusingPresenter {
    inner: LayerPresenter<HeadlessCompositor>,
    refuse: u64,
}

impl Presenter for RefusingPresenter {
    fn reset_with_config(&mut self, config: Option<Arc<ModelConfig>>) {
        self.inner.reset_with_config(config);
    }

    fn wants_more_frames(&self) -> bool {
        self.inner.wants_more_frames()
    }

    fn handle_buffer(&mut self, sample: SampleBuffer) -> bool {
        self.inner.handle_buffer(sample)
    }

    fn handle_frame(&mut self, frame: SurfaceFrame) -> bool {
        self.inner.handle_frame(frame)
    }

    fn present(&mut self, frame: FrameBuffer) -> bool {
        if frame.index() == self.refuse {
            return false;
        }
        self.inner.present(frame)
    }

    fn no_more_buffers(&mut self) {
        self.inner.no_more_buffers();
    }

    fn pending_frames(&self) -> usize {
        self.inner.pending_frames()
    }

    fn display_refresh(&mut self) -> bool {
        self.inner.display_refresh()
    }

    fn host(&self) -> LayerHost {
        self.inner.host()
    }

    fn set_host(&mut self, host: LayerHost) {
        self.inner.set_host(host);
    }

    fn detach_video_layer(&mut self) -> Result<(), PresentError> {
        self.inner.detach_video_layer()
    }

    fn reattach_video_layer(&mut self) -> Result<(), PresentError> {
        self.inner.reattach_video_layer()
    }

    fn detach_overlay_layer(&mut self) -> Result<(), PresentError> {
        self.inner.detach_overlay_layer()
    }

    fn reattach_overlay_layer(&mut self) -> Result<(), PresentError> {
        self.inner.reattach_overlay_layer()
    }

    fn visible_output(&self) -> Option<Vec<u8>> {
        self.inner.visible_output()
    }

    fn stats(&self) -> PresenterStats {
        self.inner.stats()
    }
}

#[tokio::test(start_paused = true)]
async fn test_refused_frame_is_skipped() {
    let compositor = HeadlessCompositor::new();
    let presenter = RefusingPresenter {
        inner: LayerPresenter::new(compositor.clone()).expect("presenter"),
        refuse: 3,
    };
    let decoder = VideoDecoder::new(ClipResolver::new());
    let (handle, _task) = Pipeline::spawn(refreshing(), decoder, presenter).expect("pipeline");

    handle
        .reset_with_model(raw_config(10, Buffering::Direct))
        .await
        .expect("reset");
    run_to_idle(&handle).await;

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.frames_dropped, 1);
    assert_eq!(stats.frames_delivered, 9);
    assert_eq!(stats.end_of_streams, 1);

    let expected: Vec<Duration> = (0..10).filter(|&i| i != 3).map(frame_pts).collect();
    assert_eq!(compositor.presented_pts(), expected);
}

#[tokio::test]
async fn test_equal_resets_coalesce() {
    let (handle, _task) =
        spawn_clip_pipeline(PipelineConfig::default(), HeadlessCompositor::new()).expect("pipeline");
    let config = raw_config(30, Buffering::Direct);

    let (first, second) = tokio::join!(
        handle.reset_with_model(config.clone()),
        handle.reset_with_model(config)
    );
    assert_eq!(first.expect("first"), ResetOutcome::Cancelled);
    assert_eq!(second.expect("second"), ResetOutcome::Ready);

    let decoder = handle.decoder_stats().await.expect("stats");
    assert_eq!(decoder.resets, 1);
    assert_eq!(decoder.resolutions, 1);
    assert_eq!(handle.stats().await.expect("stats").sessions, 1);
}

#[tokio::test]
async fn test_later_reset_cancels_earlier() {
    let (handle, _task) =
        spawn_clip_pipeline(PipelineConfig::default(), HeadlessCompositor::new()).expect("pipeline");

    let (first, second) = tokio::join!(
        handle.reset_with_model(raw_config(30, Buffering::Direct)),
        handle.reset_with_model(raw_config(30, Buffering::Recreated))
    );
    assert_eq!(first.expect("first"), ResetOutcome::Cancelled);
    assert_eq!(second.expect("second"), ResetOutcome::Ready);

    let decoder = handle.decoder_stats().await.expect("stats");
    assert_eq!(decoder.resets, 2);
    assert_eq!(decoder.resolutions, 1);
}

#[tokio::test]
async fn test_detach_reattach_keeps_visible_output() {
    let compositor = HeadlessCompositor::new();
    let (handle, _task) =
        spawn_clip_pipeline(PipelineConfig::default(), compositor.clone()).expect("pipeline");

    handle
        .reset_with_model(raw_config(10, Buffering::Direct))
        .await
        .expect("reset");
    show_first_frame(&handle).await;

    let before = handle.visible_output().await.expect("output");
    let shown = compositor.visible_bytes();
    assert!(before.is_some());

    handle.detach_video_layer().await.expect("detach");
    handle.detach_overlay_layer().await.expect("detach");
    assert!(matches!(
        handle.detach_video_layer().await,
        Err(PipelineError::Present(PresentError::InvalidState(_)))
    ));
    handle.reattach_overlay_layer().await.expect("reattach");
    handle.reattach_video_layer().await.expect("reattach");

    assert_eq!(handle.visible_output().await.expect("output"), before);
    assert_eq!(compositor.visible_bytes(), shown);
    assert_eq!(compositor.presented_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_screen_transition_loses_no_frames() {
    let compositor = HeadlessCompositor::new();
    let (handle, _task) = spawn_clip_pipeline(refreshing(), compositor.clone()).expect("pipeline");

    handle
        .reset_with_model(raw_config(12, Buffering::Recreated))
        .await
        .expect("reset");
    tokio::time::sleep(REFRESH * 4).await;

    handle
        .full_screen(FullScreenEvent::WillEnter)
        .await
        .expect("will enter");
    let frozen = compositor.presented_count();
    tokio::time::sleep(REFRESH * 10).await;
    assert_eq!(compositor.presented_count(), frozen);
    assert_eq!(compositor.layer_host(LayerKind::Video), None);

    handle
        .full_screen(FullScreenEvent::DidEnter)
        .await
        .expect("did enter");
    assert_eq!(
        compositor.layer_host(LayerKind::Video),
        Some(LayerHost::FullScreen)
    );

    run_to_idle(&handle).await;

    let expected: Vec<Duration> = (0..12).map(frame_pts).collect();
    assert_eq!(compositor.presented_pts(), expected);
    assert_eq!(handle.stats().await.expect("stats").frames_dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_more_buffers_stops_delivery() {
    let (handle, _task) =
        spawn_clip_pipeline(refreshing(), HeadlessCompositor::new()).expect("pipeline");

    let config = ModelConfig::builder()
        .video_source(clip(1000))
        .build();
    handle.reset_with_model(config).await.expect("reset");
    tokio::time::sleep(REFRESH * 5).await;

    handle.signal_no_more_buffers().await.expect("signal");
    run_to_idle(&handle).await;
    let delivered = handle.stats().await.expect("stats").frames_delivered;
    assert!(delivered > 0);

    handle.request_frames().await.expect("request");
    tokio::time::sleep(REFRESH * 5).await;
    assert_eq!(handle.stats().await.expect("stats").frames_delivered, delivered);
    assert_eq!(handle.state(), PipelineState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_no_more_buffers_while_resolving_ends_session_unplayed() {
    let compositor = HeadlessCompositor::new();
    let (handle, _task) = spawn_clip_pipeline(refreshing(), compositor.clone()).expect("pipeline");

    let config = ModelConfig::builder().video_source(clip(20)).build();
    let (reset, signal) = tokio::join!(
        handle.reset_with_model(config),
        handle.signal_no_more_buffers()
    );
    assert_eq!(reset.expect("reset"), ResetOutcome::Ready);
    signal.expect("signal");

    run_to_idle(&handle).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = handle.stats().await.expect("stats");
    assert_eq!(stats.frames_requested, 0);
    assert_eq!(stats.frames_delivered, 0);
    assert_eq!(compositor.presented_count(), 0);
    assert_eq!(handle.state(), PipelineState::Idle);

    // The next reset streams normally
    handle
        .reset_with_model(ModelConfig::builder().video_source(clip(4)).build())
        .await
        .expect("reset");
    run_to_idle(&handle).await;
    assert_eq!(compositor.presented_count(), 4);
}

#[tokio::test]
async fn test_failed_full_screen_step_moves_no_layer() {
    let compositor = HeadlessCompositor::new();
    let (handle, _task) =
        spawn_clip_pipeline(PipelineConfig::default(), compositor.clone()).expect("pipeline");

    handle
        .reset_with_model(raw_config(10, Buffering::Direct))
        .await
        .expect("reset");
    show_first_frame(&handle).await;

    // Overlay already out: entering full screen fails and the video stays put
    handle.detach_overlay_layer().await.expect("detach");
    assert!(matches!(
        handle.full_screen(FullScreenEvent::WillEnter).await,
        Err(PipelineError::Present(PresentError::InvalidState(_)))
    ));
    assert_eq!(
        compositor.layer_host(LayerKind::Video),
        Some(LayerHost::Window)
    );
    show_first_frame(&handle).await;
    assert_eq!(compositor.presented_count(), 2);

    // Overlay already back: the reattach is undone
    handle.reattach_overlay_layer().await.expect("reattach");
    handle
        .full_screen(FullScreenEvent::WillEnter)
        .await
        .expect("will enter");
    handle.reattach_overlay_layer().await.expect("reattach");
    assert!(matches!(
        handle.full_screen(FullScreenEvent::DidEnter).await,
        Err(PipelineError::Present(PresentError::InvalidState(_)))
    ));
    assert_eq!(compositor.layer_host(LayerKind::Video), None);
    assert_eq!(compositor.host(), LayerHost::Window);

    handle.detach_overlay_layer().await.expect("detach");
    handle
        .full_screen(FullScreenEvent::DidEnter)
        .await
        .expect("did enter");
    assert_eq!(
        compositor.layer_host(LayerKind::Video),
        Some(LayerHost::FullScreen)
    );
    assert_eq!(
        compositor.layer_host(LayerKind::Overlay),
        Some(LayerHost::FullScreen)
    );
}

#[tokio::test(start_paused = true)]
async fn test_every_supported_config_plays_in_order() {
    let base = ModelConfig::builder()
        .frame_size(8, 8)
        .video_source(clip(6))
        .build();
    let configs = supported_configs(&base);
    assert!(!configs.is_empty());

    for config in configs {
        let compositor = HeadlessCompositor::new();
        let (handle, task) =
            spawn_clip_pipeline(refreshing(), compositor.clone()).expect("pipeline");
        let summary = config.summary();

        handle.reset_with_model(config).await.expect("reset");
        run_to_idle(&handle).await;

        let pts = compositor.presented_pts();
        assert_eq!(pts.len(), 6, "{summary}");
        assert!(pts.windows(2).all(|w| w[0] <= w[1]), "{summary}");

        // Nothing is presented once the stream has ended
        handle.request_frames().await.expect("request");
        tokio::time::sleep(REFRESH * 3).await;
        assert_eq!(compositor.presented_count(), 6, "{summary}");

        handle.shutdown().await.expect("shutdown");
        task.await.expect("pipeline task");
    }
}
