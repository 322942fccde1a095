// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for reading the compositor bridge from a render thread while the
//! owning thread reconfigures viewports.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use kurbo::{Affine, Rect};
use understory_manipulation::{
    CompositorBridge, CompositorContent, ContentType, Coordinator, CoordinatorOptions,
    FixedDisplay, OverpanMode,
};
use understory_manipulation_ref::RefEngine;

const FRAME: Duration = Duration::from_millis(16);

fn assert_send_sync<T: Send + Sync>() {}

fn setup() -> (Arc<RefEngine>, Coordinator<u32, RefEngine>) {
    let engine = Arc::new(RefEngine::new());
    let mut c = Coordinator::with_options(
        Arc::clone(&engine),
        CoordinatorOptions::with_display(FixedDisplay { height: 1080.0 }),
    );
    let vp = c.register_viewport(1).unwrap();
    c.set_viewport_bounds(1, Rect::new(0.0, 0.0, 100.0, 200.0))
        .unwrap();
    c.set_content_bounds(1, Rect::new(0.0, 0.0, 400.0, 1000.0))
        .unwrap();
    c.add_secondary_content_for_type(1, 10, ContentType::TopHeader)
        .unwrap();
    engine.set_primary_transform(vp, Affine::translate((50.0, 30.0)));
    (engine, c)
}

#[test]
fn bridge_handles_cross_threads() {
    assert_send_sync::<CompositorBridge<RefEngine>>();
    assert_send_sync::<CompositorContent>();
}

#[test]
fn render_thread_reads_while_reflexes_are_rebuilt() {
    let (_engine, mut c) = setup();
    let bridge = c.compositor();
    let primary = c.compositor_primary_content(1).unwrap();
    let header = c.compositor_secondary_content(1, 10, false).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        let render = s.spawn(|| {
            let mut frames = 0_u32;
            loop {
                for content in [&primary, &header] {
                    let t = bridge
                        .transform(content)
                        .expect("registered content always has a transform");
                    assert!(
                        t.translation_x.is_finite() && t.translation_y.is_finite(),
                        "translation stays finite: {t:?}"
                    );
                    assert!(t.zoom_y > 0.0, "zoom stays positive: {t:?}");
                }
                assert!(bridge.tick(&primary, FRAME), "live viewport ticks");
                frames += 1;
                if done.load(Ordering::Acquire) {
                    return frames;
                }
            }
        });

        for i in 0..200_u32 {
            let mode = if i % 2 == 0 {
                OverpanMode::Suppress
            } else {
                OverpanMode::Compress
            };
            c.apply_overpan_modes(1, mode, mode, 1.0, true).unwrap();
            c.set_content_bounds(1, Rect::new(0.0, 0.0, 200.0 + f64::from(i), 1000.0))
                .unwrap();
        }
        done.store(true, Ordering::Release);
        let frames = render.join().unwrap();
        assert!(frames > 0, "the render thread drew at least one frame");
    });

    assert!(c.overpan_debug_info(1).unwrap().has_behavior);
}

#[test]
fn render_thread_sees_unregister_as_a_missing_viewport() {
    let (engine, mut c) = setup();
    c.apply_overpan_modes(1, OverpanMode::Suppress, OverpanMode::Compress, 1.0, true)
        .unwrap();
    let bridge = c.compositor();
    let primary = c.compositor_primary_content(1).unwrap();
    let header = c.compositor_secondary_content(1, 10, false).unwrap();

    thread::scope(|s| {
        let render = s.spawn(|| {
            loop {
                let alive = bridge.transform(&primary).is_some();
                // The header may vanish first; it must never panic or hang.
                let _ = bridge.transform(&header);
                if !alive {
                    break;
                }
                bridge.tick(&primary, FRAME);
            }
        });

        for _ in 0..50 {
            c.apply_overpan_modes(1, OverpanMode::Compress, OverpanMode::Suppress, 1.0, true)
                .unwrap();
            c.apply_overpan_modes(1, OverpanMode::Suppress, OverpanMode::Compress, 1.0, true)
                .unwrap();
        }
        c.unregister_viewport(1).unwrap();
        render.join().unwrap();
    });

    assert_eq!(bridge.transform(&primary), None);
    assert_eq!(bridge.transform(&header), None);
    assert!(!bridge.tick(&primary, FRAME), "unregistered viewports do not tick");
    assert_eq!(engine.live_contents(), 0);
}
