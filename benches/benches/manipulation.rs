// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for per-frame work in `understory_manipulation`.

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Rect};
use understory_manipulation::curve::{CurveSet, Property};
use understory_manipulation::overpan::{ReflexGeometry, primary_reflex_curves};
use understory_manipulation::{
    ContentType, Coordinator, CoordinatorOptions, FixedDisplay, OverpanMode, OverpanTuning,
};
use understory_manipulation_ref::RefEngine;

fn bench_curve_evaluation(c: &mut Criterion) {
    let geometry = ReflexGeometry {
        viewport: Rect::new(0.0, 0.0, 800.0, 600.0),
        content: Rect::new(0.0, 0.0, 800.0, 20_000.0),
        centerpoint_offset: Some(2000.0),
    };
    let tuning = OverpanTuning::default();
    let compress = primary_reflex_curves(
        ContentType::Primary,
        OverpanMode::Default,
        OverpanMode::Compress,
        &geometry,
        &tuning,
    );
    let header = CurveSet::for_content_type(ContentType::TopHeader).unwrap();

    let mut group = c.benchmark_group("curve_evaluate");
    for (name, set) in [("compress_reflex", &compress), ("top_header", &header)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), set, |b, set| {
            let mut y = -21_000.0;
            b.iter(|| {
                y = if y > 1_000.0 { -21_000.0 } else { y + 37.0 };
                let source = |p: Property| match p {
                    Property::TranslationY => y,
                    Property::TranslationX => 0.0,
                    Property::Zoom => 1.0,
                };
                for property in Property::ALL {
                    black_box(set.evaluate(property, source));
                }
            });
        });
    }
    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    for overpan in [OverpanMode::Default, OverpanMode::Compress] {
        let engine = Arc::new(RefEngine::new());
        let mut coordinator = Coordinator::with_options(
            Arc::clone(&engine),
            CoordinatorOptions::with_display(FixedDisplay { height: 1080.0 }),
        );
        let vp = coordinator.register_viewport(1_u32).unwrap();
        coordinator
            .set_viewport_bounds(1, Rect::new(0.0, 0.0, 800.0, 600.0))
            .unwrap();
        coordinator
            .set_content_bounds(1, Rect::new(0.0, 0.0, 800.0, 20_000.0))
            .unwrap();
        coordinator
            .add_secondary_content_for_type(1, 2, ContentType::TopHeader)
            .unwrap();
        coordinator
            .apply_overpan_modes(1, OverpanMode::Default, overpan, 1.0, true)
            .unwrap();
        engine.set_primary_transform(vp, Affine::translate((0.0, 120.0)));

        let bridge = coordinator.compositor();
        let primary = coordinator.compositor_primary_content(1).unwrap();
        let header = coordinator.compositor_secondary_content(1, 2, false).unwrap();
        group.bench_function(BenchmarkId::new("tick_and_transform", format!("{overpan:?}")), |b| {
            b.iter(|| {
                bridge.tick(&primary, Duration::from_micros(16_667));
                black_box(bridge.transform(&primary));
                black_box(bridge.transform(&header));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_curve_evaluation, bench_frame);
criterion_main!(benches);
