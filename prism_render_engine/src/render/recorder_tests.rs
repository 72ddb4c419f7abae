//! Unit tests for recorder.rs
//!
//! Tests CommandRecorder state transitions, renderer-state requirements
//! and stale-recording detection against the mock device.

use std::sync::Arc;

use crate::gpu::mock::MockDevice;
use crate::gpu::{Extent2d, GpuDevice, SampleCount, TextureFormat};
use crate::render::{
    AttachmentDesc, AttachmentKind, CommandRecorder, FrameClock, RenderLayout, Renderer,
    RendererDesc, SubpassDesc,
};

fn single_subpass_layout() -> RenderLayout {
    RenderLayout::new(
        vec![AttachmentDesc {
            format: TextureFormat::R8G8B8A8_UNORM,
            kind: AttachmentKind::Color,
            preserved: true,
            msaa_capable: true,
        }],
        vec![SubpassDesc {
            color_attachments: vec![0],
            ..Default::default()
        }],
    )
    .unwrap()
}

fn offscreen_renderer(device: &Arc<MockDevice>) -> Renderer {
    Renderer::new_offscreen(
        device.clone(),
        Extent2d::new(640, 480),
        FrameClock::new(),
        RendererDesc {
            layout: single_subpass_layout(),
            samples: SampleCount::X1,
            uniform_capacity: 1024,
        },
    )
    .unwrap()
}

// ============================================================================
// STATE MACHINE TESTS
// ============================================================================

#[test]
fn test_begin_requires_recording_renderer() {
    let device = MockDevice::new();
    let renderer = offscreen_renderer(&device);
    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);

    assert!(recorder.begin(&renderer, 0).is_err());
    assert!(!recorder.is_recording());
}

#[test]
fn test_begin_rejects_out_of_range_subpass() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    assert!(recorder.begin(&renderer, 1).is_err());
}

#[test]
fn test_begin_end_produces_valid_list() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    assert!(recorder.is_recording());

    recorder.commands().unwrap().draw(3, 0).unwrap();

    let list = recorder.end().unwrap();
    assert!(!recorder.is_recording());
    assert!(list.is_valid());
    assert_eq!(list.renderer(), renderer.id());
    assert_eq!(list.subpass(), 0);
}

#[test]
fn test_double_begin_fails() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    assert!(recorder.begin(&renderer, 0).is_err());
    // Still recording the original buffer
    assert!(recorder.is_recording());
}

#[test]
fn test_commands_requires_recording() {
    let device = MockDevice::new();
    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    assert!(recorder.commands().is_err());
}

#[test]
fn test_end_requires_recording() {
    let device = MockDevice::new();
    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    assert!(recorder.end().is_err());
}

#[test]
fn test_discard_abandons_recording() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    recorder.discard().unwrap();
    assert!(!recorder.is_recording());

    // Recorder is reusable after a discard
    recorder.begin(&renderer, 0).unwrap();
    assert!(recorder.end().is_ok());
}

#[test]
fn test_discard_requires_recording() {
    let device = MockDevice::new();
    let mut recorder = CommandRecorder::new(device as Arc<dyn GpuDevice>);
    assert!(recorder.discard().is_err());
}

// ============================================================================
// STALENESS TESTS
// ============================================================================

#[test]
fn test_end_fails_after_renderer_advances() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();

    // Renderer finishes this frame and starts the next one
    renderer.end().unwrap();
    renderer.begin().unwrap();

    assert!(recorder.end().is_err());
    // The stale buffer was released; the recorder is idle again
    assert!(!recorder.is_recording());
}

#[test]
fn test_recording_survives_within_same_frame() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    recorder.commands().unwrap().draw(3, 0).unwrap();

    let mut list = recorder.end().unwrap();
    assert!(renderer.submit_one(&mut list).is_ok());
    assert!(!list.is_valid());
    renderer.end().unwrap();
}

// ============================================================================
// INHERITANCE TESTS
// ============================================================================

#[test]
fn test_secondary_buffer_inherits_subpass() {
    let device = MockDevice::new();
    let mut renderer = offscreen_renderer(&device);
    renderer.begin().unwrap();

    let mut recorder = CommandRecorder::new(device.clone() as Arc<dyn GpuDevice>);
    recorder.begin(&renderer, 0).unwrap();
    recorder.discard().unwrap();

    let operations = device.operations();
    assert!(operations.contains(&"allocate_secondary_command_buffer subpass=0".to_string()));
}
