//! Unit tests for renderer.rs
//!
//! Tests renderer construction, the recording state machine, command-list
//! provenance checks, present pacing, MSAA reconfiguration, resize handling
//! and pipeline tracking, all against the mock device and window.

use std::sync::Arc;

use crate::error::Error;
use crate::gpu::mock::{MockDevice, MockWindow};
use crate::gpu::{
    ClearValue, Extent2d, GpuDevice, PipelineDesc, PrimitiveTopology, SampleCount, TextureFormat,
};
use crate::render::{
    AttachmentDesc, AttachmentKind, CommandRecorder, FrameClock, RenderLayout, Renderer,
    RendererDesc, SubpassDesc,
};
use crate::window::RenderWindow;

const SURFACE_FORMAT: TextureFormat = TextureFormat::B8G8R8A8_UNORM;

fn color(format: TextureFormat, preserved: bool) -> AttachmentDesc {
    AttachmentDesc {
        format,
        kind: AttachmentKind::Color,
        preserved,
        msaa_capable: true,
    }
}

fn depth() -> AttachmentDesc {
    AttachmentDesc {
        format: TextureFormat::D32_SFLOAT,
        kind: AttachmentKind::DepthStencil,
        preserved: false,
        msaa_capable: true,
    }
}

fn forward_layout() -> RenderLayout {
    RenderLayout::new(
        vec![color(SURFACE_FORMAT, true), depth()],
        vec![SubpassDesc {
            color_attachments: vec![0],
            depth_attachment: Some(1),
            ..Default::default()
        }],
    )
    .unwrap()
}

/// Gbuffer subpass, then a lighting subpass reading it as input
fn deferred_layout() -> RenderLayout {
    RenderLayout::new(
        vec![
            color(SURFACE_FORMAT, true),
            color(TextureFormat::R16G16B16A16_SFLOAT, false),
            depth(),
        ],
        vec![
            SubpassDesc {
                color_attachments: vec![1],
                depth_attachment: Some(2),
                ..Default::default()
            },
            SubpassDesc {
                color_attachments: vec![0],
                input_attachments: vec![1],
                ..Default::default()
            },
        ],
    )
    .unwrap()
}

fn desc(layout: RenderLayout) -> RendererDesc {
    RendererDesc {
        layout,
        samples: SampleCount::X1,
        uniform_capacity: 4096,
    }
}

fn offscreen(device: &Arc<MockDevice>, layout: RenderLayout) -> Renderer {
    Renderer::new_offscreen(
        device.clone(),
        Extent2d::new(640, 480),
        FrameClock::new(),
        desc(layout),
    )
    .unwrap()
}

fn windowed(
    device: &Arc<MockDevice>,
    window: &Arc<MockWindow>,
    clock: FrameClock,
) -> Renderer {
    Renderer::new_windowed(device.clone(), window.clone(), clock, desc(forward_layout())).unwrap()
}

fn pipeline_desc(device: &Arc<MockDevice>, subpass: u32) -> PipelineDesc {
    let shader = device.create_shader_module(&[0u8; 4]).unwrap();
    PipelineDesc {
        label: "test".to_string(),
        subpass,
        vertex_shader: shader.clone(),
        fragment_shader: Some(shader),
        topology: PrimitiveTopology::TriangleList,
    }
}

// ============================================================================
// CONSTRUCTION TESTS
// ============================================================================

#[test]
fn test_new_windowed() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let renderer = windowed(&device, &window, FrameClock::new());

    assert!(renderer.is_window_backed());
    assert_eq!(renderer.size(), Extent2d::new(800, 600));
    assert_eq!(renderer.subpass_count(), 1);
    assert!(!renderer.is_recording());
    assert!(window.has_renderer());
}

#[test]
fn test_new_windowed_rejects_second_renderer() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let _first = windowed(&device, &window, FrameClock::new());

    let result = Renderer::new_windowed(
        device.clone(),
        window.clone(),
        FrameClock::new(),
        desc(forward_layout()),
    );
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
}

#[test]
fn test_drop_releases_window() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));

    let renderer = windowed(&device, &window, FrameClock::new());
    drop(renderer);
    assert!(!window.has_renderer());

    // A new renderer can attach now
    let _second = windowed(&device, &window, FrameClock::new());
}

#[test]
fn test_new_windowed_rejects_format_mismatch() {
    let device = MockDevice::new();
    let window = MockWindow::new(TextureFormat::R8G8B8A8_UNORM, Extent2d::new(800, 600));
    let result = Renderer::new_windowed(
        device,
        window,
        FrameClock::new(),
        desc(forward_layout()),
    );
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_new_windowed_rejects_backbuffer_as_input() {
    let layout = RenderLayout::new(
        vec![color(SURFACE_FORMAT, true), color(SURFACE_FORMAT, false)],
        vec![
            SubpassDesc {
                color_attachments: vec![0],
                ..Default::default()
            },
            SubpassDesc {
                color_attachments: vec![1],
                input_attachments: vec![0],
                ..Default::default()
            },
        ],
    )
    .unwrap();

    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let result = Renderer::new_windowed(device, window, FrameClock::new(), desc(layout));
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_new_rejects_unsupported_sample_count() {
    let device = MockDevice::with_max_samples(SampleCount::X2);
    let result = Renderer::new_offscreen(
        device,
        Extent2d::new(640, 480),
        FrameClock::new(),
        RendererDesc {
            layout: forward_layout(),
            samples: SampleCount::X8,
            uniform_capacity: 4096,
        },
    );
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_descriptor_sets_follow_layout() {
    let device = MockDevice::new();
    let renderer = offscreen(&device, deferred_layout());

    assert!(renderer.input_descriptor_set(0).is_none());
    assert!(renderer.input_descriptor_set(1).is_some());
}

// ============================================================================
// RECORDING STATE MACHINE TESTS
// ============================================================================

#[test]
fn test_full_frame_sequence() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, deferred_layout());

    renderer.begin().unwrap();
    assert!(renderer.is_recording());
    assert_eq!(renderer.current_subpass(), Some(0));

    renderer.next_subpass().unwrap();
    assert_eq!(renderer.current_subpass(), Some(1));

    renderer.end().unwrap();
    assert!(!renderer.is_recording());
    assert_eq!(renderer.current_subpass(), None);

    let operations = device.operations();
    assert!(operations.contains(&"allocate_primary_command_buffer".to_string()));
    assert!(operations.iter().any(|op| op.starts_with("submit frame_slot=")));
}

#[test]
fn test_double_begin_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    renderer.begin().unwrap();
    assert!(renderer.begin().is_err());
    // Still recording the original frame
    assert!(renderer.is_recording());
}

#[test]
fn test_end_before_last_subpass_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, deferred_layout());

    renderer.begin().unwrap();
    assert!(renderer.end().is_err());

    // The frame is still open; finishing it properly works
    assert_eq!(renderer.current_subpass(), Some(0));
    renderer.next_subpass().unwrap();
    renderer.end().unwrap();
}

#[test]
fn test_next_subpass_past_last_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    renderer.begin().unwrap();
    assert!(renderer.next_subpass().is_err());
    assert_eq!(renderer.current_subpass(), Some(0));
}

#[test]
fn test_next_subpass_while_idle_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    assert!(renderer.next_subpass().is_err());
    assert!(renderer.end().is_err());
}

#[test]
fn test_begin_advances_uniform_frame() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    renderer.uniforms().try_push_data(&[1u8; 16]).unwrap().unwrap();
    renderer.begin().unwrap();
    // Fresh region after begin
    assert_eq!(renderer.uniforms().remaining(), renderer.uniforms().frame_capacity());
    renderer.end().unwrap();
}

// ============================================================================
// PRESENT PACING TESTS
// ============================================================================

#[test]
fn test_one_present_per_tick() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let clock = FrameClock::new();
    let mut renderer = windowed(&device, &window, clock.clone());

    renderer.begin().unwrap();
    renderer.end().unwrap();
    assert_eq!(window.presented().len(), 1);

    // Same tick: refused
    assert!(renderer.begin().is_err());

    clock.advance();
    renderer.begin().unwrap();
    renderer.end().unwrap();
    assert_eq!(window.presented().len(), 2);
}

#[test]
fn test_offscreen_ignores_clock() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    for _ in 0..3 {
        renderer.begin().unwrap();
        renderer.end().unwrap();
    }
}

// ============================================================================
// SUBMIT TESTS
// ============================================================================

#[test]
fn test_submit_invalidates_lists() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    let mut list = recorder.end().unwrap();

    renderer.submit_one(&mut list).unwrap();
    assert!(!list.is_valid());

    // Double submit fails
    assert!(renderer.submit_one(&mut list).is_err());
    renderer.end().unwrap();
}

#[test]
fn test_submit_rejects_wrong_subpass() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, deferred_layout());
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 1).unwrap();
    let mut list = recorder.end().unwrap();

    // Renderer is on subpass 0 but the list targets subpass 1
    assert!(renderer.submit_one(&mut list).is_err());
    assert!(list.is_valid());

    renderer.next_subpass().unwrap();
    renderer.submit_one(&mut list).unwrap();
    renderer.end().unwrap();
}

#[test]
fn test_submit_rejects_foreign_list() {
    let device = MockDevice::new();
    let mut first = offscreen(&device, forward_layout());
    let mut second = offscreen(&device, forward_layout());

    first.begin().unwrap();
    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&first, 0).unwrap();
    let mut list = recorder.end().unwrap();

    second.begin().unwrap();
    assert!(second.submit_one(&mut list).is_err());
    assert!(list.is_valid());
}

#[test]
fn test_submit_rejects_stale_frame_list() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    renderer.begin().unwrap();
    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    let mut list = recorder.end().unwrap();
    renderer.end().unwrap();

    // Next frame: the list belongs to the previous one
    renderer.begin().unwrap();
    assert!(renderer.submit_one(&mut list).is_err());
}

#[test]
fn test_submit_all_or_nothing() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, deferred_layout());
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    let good = recorder.end().unwrap();
    recorder.begin(&renderer, 1).unwrap();
    let bad = recorder.end().unwrap();

    let mut lists = [good, bad];
    assert!(renderer.submit(&mut lists).is_err());
    // Validation failed before execution: both lists untouched
    assert!(lists[0].is_valid());
    assert!(lists[1].is_valid());

    // The good list alone goes through
    renderer.submit(&mut lists[0..1]).unwrap();
    assert!(!lists[0].is_valid());
}

#[test]
fn test_submit_while_idle_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    assert!(renderer.submit(&mut []).is_err());
}

// ============================================================================
// CLEAR VALUE TESTS
// ============================================================================

#[test]
fn test_set_clear_values() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    renderer
        .set_clear_values(vec![
            ClearValue::Color([0.2, 0.2, 0.2, 1.0]),
            ClearValue::DepthStencil { depth: 0.0, stencil: 0 },
        ])
        .unwrap();
}

#[test]
fn test_set_clear_values_rejects_wrong_count() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    let result = renderer.set_clear_values(vec![ClearValue::Color([0.0; 4])]);
    assert!(result.is_err());
}

#[test]
fn test_set_clear_values_rejects_while_recording() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.begin().unwrap();
    let result = renderer.set_clear_values(vec![
        ClearValue::Color([0.0; 4]),
        ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
    ]);
    assert!(result.is_err());
}

// ============================================================================
// MSAA RECONFIGURATION TESTS
// ============================================================================

#[test]
fn test_set_msaa_rebuilds_everything() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    let pipeline = renderer.create_pipeline(pipeline_desc(&device, 0)).unwrap();
    let handle_before = pipeline.handle();

    renderer.set_msaa(SampleCount::X4).unwrap();

    assert_eq!(renderer.samples(), SampleCount::X4);
    assert_eq!(device.idle_wait_count(), 1);
    // Initial build plus the rebuild
    assert_eq!(device.pipeline_build_count(), 2);
    assert!(!Arc::ptr_eq(&handle_before, &pipeline.handle()));
}

#[test]
fn test_set_msaa_same_value_is_noop() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.set_msaa(SampleCount::X1).unwrap();
    assert_eq!(device.idle_wait_count(), 0);
}

#[test]
fn test_set_msaa_rejects_while_recording() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.begin().unwrap();
    // Fails even for the current value
    assert!(renderer.set_msaa(SampleCount::X1).is_err());
    assert!(renderer.set_msaa(SampleCount::X4).is_err());
}

#[test]
fn test_set_msaa_unsupported_leaves_renderer_unchanged() {
    let device = MockDevice::with_max_samples(SampleCount::X2);
    let mut renderer = offscreen(&device, forward_layout());

    let result = renderer.set_msaa(SampleCount::X8);
    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert_eq!(renderer.samples(), SampleCount::X1);
    assert_eq!(device.idle_wait_count(), 0);

    // Renderer still fully usable
    renderer.begin().unwrap();
    renderer.end().unwrap();
}

#[test]
fn test_set_msaa_rejects_incapable_layout() {
    let mut incapable = color(SURFACE_FORMAT, true);
    incapable.msaa_capable = false;
    let layout = RenderLayout::new(
        vec![incapable],
        vec![SubpassDesc {
            color_attachments: vec![0],
            ..Default::default()
        }],
    )
    .unwrap();

    let device = MockDevice::new();
    let mut renderer = offscreen(&device, layout);
    assert!(matches!(renderer.set_msaa(SampleCount::X4), Err(Error::Unsupported(_))));
}

#[test]
fn test_windowed_frame_at_msaa() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let clock = FrameClock::new();
    let mut renderer = windowed(&device, &window, clock.clone());

    renderer.set_msaa(SampleCount::X4).unwrap();
    clock.advance();
    renderer.begin().unwrap();
    renderer.end().unwrap();
    assert_eq!(window.presented().len(), 1);
}

// ============================================================================
// RESIZE TESTS
// ============================================================================

#[test]
fn test_set_size_rejects_while_recording() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.begin().unwrap();

    // Fails even for the current extent
    assert!(renderer.set_size(Extent2d::new(640, 480)).is_err());
    assert!(renderer.set_size(Extent2d::new(1024, 768)).is_err());
    assert!(renderer.is_recording());
}

#[test]
fn test_set_size_rejects_window_backed() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let mut renderer = windowed(&device, &window, FrameClock::new());
    assert!(renderer.set_size(Extent2d::new(1024, 768)).is_err());
}

#[test]
fn test_set_size_unchanged_is_noop() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    renderer.set_size(Extent2d::new(640, 480)).unwrap();
}

#[test]
fn test_set_size_changed_is_unsupported() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    let result = renderer.set_size(Extent2d::new(1024, 768));
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_notify_resize_rebuilds_target() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let mut renderer = windowed(&device, &window, FrameClock::new());

    window.resize(Extent2d::new(1024, 768));
    renderer.notify_resize().unwrap();
    assert_eq!(renderer.size(), Extent2d::new(1024, 768));

    renderer.begin().unwrap();
    renderer.end().unwrap();
}

#[test]
fn test_notify_resize_rejects_offscreen() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());
    assert!(renderer.notify_resize().is_err());
}

#[test]
fn test_notify_resize_rejects_while_recording() {
    let device = MockDevice::new();
    let window = MockWindow::new(SURFACE_FORMAT, Extent2d::new(800, 600));
    let mut renderer = windowed(&device, &window, FrameClock::new());
    renderer.begin().unwrap();
    assert!(renderer.notify_resize().is_err());
}

// ============================================================================
// PIPELINE TRACKING TESTS
// ============================================================================

#[test]
fn test_create_pipeline_rejects_out_of_range_subpass() {
    let device = MockDevice::new();
    let renderer = offscreen(&device, forward_layout());
    assert!(renderer.create_pipeline(pipeline_desc(&device, 5)).is_err());
}

#[test]
fn test_pipeline_tracking() {
    let device = MockDevice::new();
    let renderer = offscreen(&device, forward_layout());
    assert_eq!(renderer.pipeline_count(), 0);

    let pipeline = renderer.create_pipeline(pipeline_desc(&device, 0)).unwrap();
    assert_eq!(renderer.pipeline_count(), 1);
    assert_eq!(pipeline.subpass(), 0);
    assert_eq!(pipeline.label(), "test");

    drop(pipeline);
    assert_eq!(renderer.pipeline_count(), 0);
}

#[test]
fn test_dropped_pipeline_not_rebuilt() {
    let device = MockDevice::new();
    let mut renderer = offscreen(&device, forward_layout());

    let pipeline = renderer.create_pipeline(pipeline_desc(&device, 0)).unwrap();
    drop(pipeline);

    renderer.set_msaa(SampleCount::X4).unwrap();
    // Only the initial build; nothing left to rebuild
    assert_eq!(device.pipeline_build_count(), 1);
}
