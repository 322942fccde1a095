// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_manipulation` coordinator.
//!
//! These drive a `Coordinator` against the reference engine and check what the
//! engine was asked to do and what the listener was told.

use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};
use understory_manipulation::engine::{
    AutoScrollMotion, BehaviorKind, ConfigureResponse, ContactId, EngineError, EngineStatus,
    GestureConfiguration,
};
use understory_manipulation::input::{Key, Modifiers};
use understory_manipulation::{
    Alignment, AutoScrollStatus, Axis, Configuration, ConfigurationOutcome, ContactOutcome,
    ContentType, Coordinator, CrossSlideKind, DeferredRelease, DragDropStatus, EngineConfiguration,
    Error, InputMessage, InteractionType, MotionTypes, Notification, OverpanMode,
    RecordingListener, SnapPointsType, ViewportStatus,
};
use understory_manipulation_ref::{RefEngine, SnapSetting};

fn setup() -> (Arc<RefEngine>, Coordinator<u32, RefEngine>) {
    let engine = Arc::new(RefEngine::new());
    let coordinator = Coordinator::new(Arc::clone(&engine));
    (engine, coordinator)
}

fn key(key: Key, modifiers: Modifiers) -> InputMessage {
    InputMessage::KeyDown {
        key,
        modifiers,
        system: false,
    }
}

#[test]
fn register_is_idempotent() {
    let (engine, mut c) = setup();
    let first = c.register_viewport(1).unwrap();
    let second = c.register_viewport(1).unwrap();
    assert_eq!(first, second);
    assert_eq!(c.viewport_count(), 1);
    assert_eq!(engine.live_handlers(), 1);
    assert_eq!(c.viewport_handle(first), Some(1));
}

#[test]
fn reregistering_creates_a_fresh_viewport() {
    let (engine, mut c) = setup();
    let first = c.register_viewport(1).unwrap();
    c.unregister_viewport(1).unwrap();
    assert!(engine.is_abandoned(first));
    assert_eq!(engine.live_handlers(), 0);
    assert!(!c.is_registered(1));

    let second = c.register_viewport(1).unwrap();
    assert_ne!(first, second);
    assert_eq!(engine.live_handlers(), 1);
}

#[test]
fn unknown_handles_are_rejected() {
    let (_, mut c) = setup();
    assert!(matches!(
        c.unregister_viewport(9),
        Err(Error::ViewportNotRegistered)
    ));
    assert!(matches!(
        c.viewport_status(9),
        Err(Error::ViewportNotRegistered)
    ));
}

#[test]
fn configuration_applies_while_building() {
    let (engine, mut c) = setup();
    // Adding registers the viewport on demand.
    let outcome = c.add_viewport_configuration(1, Configuration::PAN_Y).unwrap();
    assert_eq!(outcome, ConfigurationOutcome::Applied);
    let vp = c.engine_viewport(1).unwrap();
    let snapshot = engine.snapshot(vp).unwrap();
    assert_eq!(
        snapshot.configurations,
        EngineConfiguration::TRANSLATION_Y | EngineConfiguration::INTERACTION
    );

    let outcome = c
        .activate_viewport_configuration(1, Configuration::PAN_X | Configuration::PAN_INERTIA)
        .unwrap();
    assert_eq!(outcome, ConfigurationOutcome::Applied);
    assert_eq!(
        engine.snapshot(vp).unwrap().active_configuration,
        Some(
            EngineConfiguration::TRANSLATION_X
                | EngineConfiguration::TRANSLATION_INERTIA
                | EngineConfiguration::INTERACTION
        )
    );
}

#[test]
fn configuration_is_skipped_during_manipulation() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    engine.set_status(vp, EngineStatus::Running);
    let outcome = c.add_viewport_configuration(1, Configuration::ZOOM).unwrap();
    assert_eq!(outcome, ConfigurationOutcome::NotApplicable);

    engine.set_status(vp, EngineStatus::Ready);
    engine.seal(vp, true);
    let outcome = c
        .remove_viewport_configuration(1, Configuration::ZOOM)
        .unwrap();
    assert_eq!(outcome, ConfigurationOutcome::NotApplicable);
    assert_eq!(
        engine.snapshot(vp).unwrap().configurations,
        EngineConfiguration::empty()
    );
}

#[test]
fn enable_recovers_from_a_transient_run() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    assert!(!c.enable_viewport(1).unwrap());
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::Enabled);
    // Already enabled: nothing to do.
    assert!(!c.enable_viewport(1).unwrap());

    c.disable_viewport(1).unwrap();
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::Disabled);
    engine.land_on_ready_on_next_enable(vp);
    assert!(c.enable_viewport(1).unwrap());
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::Enabled);
}

#[test]
fn disable_leaves_building_viewports_alone() {
    let (_, mut c) = setup();
    c.register_viewport(1).unwrap();
    c.disable_viewport(1).unwrap();
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::Building);
}

#[test]
fn single_auto_scroll_activation_is_presented_as_auto_running() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Active);
    assert_eq!(c.auto_scroll_activations(), 1);
    assert_eq!(c.auto_scroll_viewport(), Some(1));
    assert_eq!(
        engine.auto_scroll_requests(),
        [(Axis::Vertical, AutoScrollMotion::Forward)]
    );

    engine.set_status(vp, EngineStatus::Inertia);
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::AutoRunning);
    engine.set_status(vp, EngineStatus::Ready);

    let mut listener = RecordingListener::default();
    assert_eq!(c.pump_events(&mut listener), 3);
    assert_eq!(
        listener.statuses(),
        [
            (1, ViewportStatus::Building, ViewportStatus::Enabled),
            (1, ViewportStatus::Enabled, ViewportStatus::AutoRunning),
            (1, ViewportStatus::AutoRunning, ViewportStatus::Ready),
        ]
    );
    assert_eq!(c.auto_scroll_activations(), 0);
}

#[test]
fn queued_auto_scroll_activation_keeps_auto_running() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    c.activate_auto_scroll(1, Axis::Horizontal, true).unwrap();
    c.activate_auto_scroll(1, Axis::Horizontal, false).unwrap();
    assert_eq!(c.auto_scroll_activations(), 2);
    assert_eq!(engine.snapshot(vp).unwrap().behaviors.len(), 1);

    let mut listener = RecordingListener::default();
    engine.set_status(vp, EngineStatus::Inertia);
    engine.set_status(vp, EngineStatus::Ready);
    c.pump_events(&mut listener);
    assert_eq!(c.auto_scroll_activations(), 1);

    engine.set_status(vp, EngineStatus::Inertia);
    engine.set_status(vp, EngineStatus::Ready);
    c.pump_events(&mut listener);
    assert_eq!(c.auto_scroll_activations(), 0);

    // The intermediate Ready is presented as AutoRunning, so no self-transition reaches the listener.
    assert_eq!(
        listener.statuses(),
        [
            (1, ViewportStatus::Building, ViewportStatus::Enabled),
            (1, ViewportStatus::Enabled, ViewportStatus::AutoRunning),
            (1, ViewportStatus::AutoRunning, ViewportStatus::Ready),
        ]
    );
}

#[test]
fn user_fling_after_a_settled_auto_scroll_is_plain_inertia() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    engine.set_status(vp, EngineStatus::Inertia);
    engine.set_status(vp, EngineStatus::Ready);

    let mut listener = RecordingListener::default();
    c.pump_events(&mut listener);
    assert_eq!(c.auto_scroll_activations(), 0);
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Active);

    engine.set_status(vp, EngineStatus::Running);
    engine.set_status(vp, EngineStatus::Inertia);
    c.pump_events(&mut listener);
    assert_eq!(
        listener.statuses().last(),
        Some(&(1, ViewportStatus::Running, ViewportStatus::Inertia))
    );
    assert_eq!(
        c.viewport_status(1).unwrap(),
        ViewportStatus::Inertia,
        "polled status agrees with the listener"
    );
}

#[test]
fn activating_during_user_inertia_keeps_the_activation() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    engine.set_status(vp, EngineStatus::Running);
    engine.set_status(vp, EngineStatus::Inertia);
    let mut listener = RecordingListener::default();
    c.pump_events(&mut listener);

    // Activation stops the fling first; that settle edge is not auto-scroll.
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    assert_eq!(engine.snapshot(vp).unwrap().status, EngineStatus::Ready);
    c.pump_events(&mut listener);
    assert_eq!(c.auto_scroll_activations(), 1);

    engine.set_status(vp, EngineStatus::Inertia);
    c.pump_events(&mut listener);
    engine.set_status(vp, EngineStatus::Ready);
    c.pump_events(&mut listener);
    assert_eq!(c.auto_scroll_activations(), 0);
    assert_eq!(
        listener.statuses(),
        [
            (1, ViewportStatus::Building, ViewportStatus::Enabled),
            (1, ViewportStatus::Enabled, ViewportStatus::Running),
            (1, ViewportStatus::Running, ViewportStatus::Inertia),
            (1, ViewportStatus::Inertia, ViewportStatus::Ready),
            (1, ViewportStatus::Ready, ViewportStatus::AutoRunning),
            (1, ViewportStatus::AutoRunning, ViewportStatus::Ready),
        ]
    );
}

#[test]
fn pending_stop_settles_with_inertia() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, false).unwrap();
    engine.set_status(vp, EngineStatus::Inertia);

    c.stop_auto_scroll(1, Axis::Vertical).unwrap();
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Stopping);
    assert_eq!(c.viewport_status(1).unwrap(), ViewportStatus::AutoRunning);

    engine.set_status(vp, EngineStatus::Ready);
    c.pump_events(&mut RecordingListener::default());
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Stopped);
}

#[test]
fn immediate_stop_ends_auto_scroll() {
    let (engine, mut c) = setup();
    c.register_viewport(1).unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    engine.set_auto_scroll_response(ConfigureResponse::Immediate);
    c.stop_auto_scroll(1, Axis::Vertical).unwrap();
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Stopped);
    assert_eq!(
        engine.auto_scroll_requests().last(),
        Some(&(Axis::Vertical, AutoScrollMotion::Stop))
    );
}

#[test]
fn auto_scroll_moves_between_viewports() {
    let (engine, mut c) = setup();
    let a = c.register_viewport(1).unwrap();
    let b = c.register_viewport(2).unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    c.activate_auto_scroll(2, Axis::Vertical, true).unwrap();
    assert!(engine.snapshot(a).unwrap().behaviors.is_empty());
    assert_eq!(
        engine.snapshot(b).unwrap().behaviors,
        [BehaviorKind::AutoScroll]
    );
    assert_eq!(c.auto_scroll_viewport(), Some(2));
}

#[test]
fn interaction_and_drag_drop_notifications_are_forwarded() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.add_cross_slide_configuration(2, CrossSlideKind::DragDrop)
        .unwrap();
    let dd = c.engine_viewport(2).unwrap();
    assert_eq!(c.drag_drop_viewport(), Some(2));

    engine.fire_interaction(vp, InteractionType::GestureTap);
    engine.fire_drag_drop(dd, DragDropStatus::Dragging, DragDropStatus::Preview);

    let mut listener = RecordingListener::default();
    assert_eq!(c.pump_events(&mut listener), 2);
    assert_eq!(
        listener.notifications,
        [
            Notification::Interaction {
                viewport: 1,
                interaction: InteractionType::GestureTap,
            },
            Notification::DragDrop {
                viewport: 2,
                current: DragDropStatus::Dragging,
                previous: DragDropStatus::Preview,
            },
        ]
    );

    assert!(c.detach_drag_drop(2).unwrap());
    assert!(!c.detach_drag_drop(2).unwrap());
    assert_eq!(c.drag_drop_viewport(), None);
}

#[test]
fn notifications_for_unregistered_viewports_are_dropped() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    engine.set_status(vp, EngineStatus::Running);
    c.unregister_viewport(1).unwrap();
    assert_eq!(c.pump_events(&mut RecordingListener::default()), 0);
}

#[test]
fn pan_keys_without_their_axis_are_dropped() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    let outcome = c
        .activate_viewport_configuration(1, Configuration::PAN_Y)
        .unwrap();
    assert_eq!(outcome, ConfigurationOutcome::Applied);
    c.enable_viewport(1).unwrap();

    assert!(!c.process_input(1, key(Key::Left, Modifiers::empty())).unwrap());
    assert!(c.process_input(1, key(Key::Down, Modifiers::empty())).unwrap());

    let snapshot = engine.snapshot(vp).unwrap();
    assert_eq!(snapshot.inputs, [key(Key::Down, Modifiers::empty())]);
    assert!(snapshot.contacts.is_empty(), "pseudo contact is released");
}

#[test]
fn right_to_left_mirrors_horizontal_pans() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    let outcome = c
        .activate_viewport_configuration(1, Configuration::PAN_X | Configuration::PAN_Y)
        .unwrap();
    assert_eq!(outcome, ConfigurationOutcome::Applied);
    c.set_right_to_left(1, true).unwrap();

    c.process_input(1, key(Key::Home, Modifiers::CTRL)).unwrap();
    c.process_input(1, key(Key::Home, Modifiers::empty()))
        .unwrap();
    let wheel = InputMessage::Wheel {
        pointer: 1,
        delta: -120.0,
        horizontal: true,
    };
    c.process_input(1, wheel).unwrap();

    assert_eq!(
        engine.snapshot(vp).unwrap().inputs,
        [
            key(Key::End, Modifiers::CTRL),
            key(Key::Home, Modifiers::empty()),
            wheel
        ]
    );
}

#[test]
fn contact_races_are_reported_as_failed() {
    let (engine, mut c) = setup();
    c.register_viewport(1).unwrap();
    let contact = ContactId(5);
    assert_eq!(c.set_contact(1, contact).unwrap(), ContactOutcome::Tracked);
    assert_eq!(c.set_contact(1, contact).unwrap(), ContactOutcome::Failed);

    engine.fail_next_contact(EngineError::ContactNoLongerExists);
    assert_eq!(
        c.set_contact(1, ContactId(6)).unwrap(),
        ContactOutcome::Failed
    );
    engine.fail_next_contact(EngineError::Unavailable);
    assert!(matches!(
        c.set_contact(1, ContactId(6)),
        Err(Error::Engine(EngineError::Unavailable))
    ));

    c.release_contact(1, contact).unwrap();
    assert_eq!(
        c.set_contact(1, ContactId(7)).unwrap(),
        ContactOutcome::Tracked
    );
    c.release_all_contacts(1).unwrap();
    let vp = c.engine_viewport(1).unwrap();
    assert!(engine.snapshot(vp).unwrap().contacts.is_empty());
}

#[test]
fn bounds_are_snapped_to_whole_pixels() {
    let (_, mut c) = setup();
    c.register_viewport(1).unwrap();
    c.set_viewport_bounds(1, Rect::new(10.4, 20.6, 111.1, 21.1))
        .unwrap();
    assert_eq!(
        c.viewport_bounds(1).unwrap(),
        Rect::new(10.0, 21.0, 110.0, 22.0)
    );

    c.set_content_bounds(1, Rect::new(0.4, 0.6, 300.6, 899.7))
        .unwrap();
    assert_eq!(
        c.content_bounds(1).unwrap(),
        Rect::new(0.0, 1.0, 301.0, 901.0)
    );
}

#[test]
fn cross_slide_viewports_are_zero_sized() {
    let (engine, mut c) = setup();
    c.add_cross_slide_configuration(1, CrossSlideKind::PanX)
        .unwrap();
    c.add_cross_slide_configuration(2, CrossSlideKind::PanXY)
        .unwrap();
    c.add_cross_slide_configuration(3, CrossSlideKind::Zoom)
        .unwrap();

    let pan_x = engine.snapshot(c.engine_viewport(1).unwrap()).unwrap();
    assert_eq!(
        pan_x.active_configuration,
        Some(EngineConfiguration::TRANSLATION_X)
    );
    assert_eq!(pan_x.chaining, MotionTypes::TRANSLATE_X);
    assert_eq!(
        pan_x.manual_gestures,
        Some(GestureConfiguration::DEFAULT | GestureConfiguration::CROSS_SLIDE_VERTICAL)
    );
    assert_eq!(pan_x.rect, Rect::ZERO);

    let pan_xy = engine.snapshot(c.engine_viewport(2).unwrap()).unwrap();
    assert!(pan_xy.manual_input);
    assert_eq!(
        pan_xy.active_configuration,
        Some(EngineConfiguration::empty())
    );

    let zoom = engine.snapshot(c.engine_viewport(3).unwrap()).unwrap();
    assert_eq!(
        zoom.manual_gestures,
        Some(GestureConfiguration::PINCH_ZOOM)
    );
    assert_eq!(c.cross_slide_kind(3), Some(CrossSlideKind::Zoom));
    assert_eq!(c.cross_slide_kind(4), None);
}

#[test]
fn viewport_settings_reach_the_engine() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.set_viewport_bounds(1, Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    c.set_viewport_chaining(1, MotionTypes::TRANSLATE_Y)
        .unwrap();
    c.set_content_alignment(1, Alignment::CENTER, Alignment::NEAR | Alignment::UNLOCKED)
        .unwrap();
    c.set_zoom_boundaries(1, 0.5, 4.0).unwrap();
    c.set_snap_points_interval(1, Axis::Vertical, 50.0, 10.0)
        .unwrap();
    c.set_snap_points_type(1, Axis::Vertical, SnapPointsType::Mandatory)
        .unwrap();
    c.bring_into_viewport(1, Rect::new(0.0, 200.0, 50.0, 250.0), false)
        .unwrap();

    let snapshot = engine.snapshot(vp).unwrap();
    assert_eq!(snapshot.chaining, MotionTypes::TRANSLATE_Y);
    assert_eq!(
        snapshot.alignment,
        Some((Alignment::CENTER, Alignment::NEAR | Alignment::UNLOCKED))
    );
    assert_eq!(snapshot.zoom_boundaries, Some((0.5, 4.0)));
    assert_eq!(
        snapshot.snap,
        [
            SnapSetting::Interval {
                motion: MotionTypes::TRANSLATE_Y,
                interval: 50.0,
                offset: 10.0,
            },
            SnapSetting::Type {
                motion: MotionTypes::TRANSLATE_Y,
                kind: SnapPointsType::Mandatory,
            },
        ]
    );
    assert_eq!(
        snapshot.primary_transform,
        Affine::new([2.0, 0.0, 0.0, 2.0, 0.0, -400.0])
    );

    c.set_primary_content_transform(1, Vec2::new(-10.0, -20.0), 1.5)
        .unwrap();
    let t = c.primary_content_transform(1).unwrap();
    assert_eq!((t.translation_x, t.translation_y), (-10.0, -20.0));
    assert_eq!((t.zoom_x, t.zoom_y, t.uncompressed_zoom), (1.5, 1.5, 1.5));
}

#[test]
fn inertia_end_transform_is_only_reported_during_inertia() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    assert_eq!(c.inertia_end_transform(1).unwrap(), None);

    engine.set_status(vp, EngineStatus::Inertia);
    engine.set_inertia_end(vp, Affine::translate((0.0, -500.0)));
    let end = c.inertia_end_transform(1).unwrap().unwrap();
    assert_eq!(end.translation_y, -500.0);
    assert_eq!(end.zoom_y, 1.0);

    // Inertia ending between the status check and the query is not an error.
    engine.fail_next_inertia_query(EngineError::NotInInertia);
    assert_eq!(c.inertia_end_transform(1).unwrap(), None);

    engine.fail_next_inertia_query(EngineError::Failed("lost"));
    assert!(
        matches!(
            c.inertia_end_transform(1),
            Err(Error::Engine(EngineError::Failed("lost")))
        ),
        "other engine failures propagate"
    );
}

#[test]
fn header_content_follows_its_axis() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.add_secondary_content_for_type(1, 10, ContentType::TopHeader)
        .unwrap();
    engine.set_primary_transform(vp, Affine::translate((-30.0, -40.0)));

    let t = c.secondary_content_transform(1, 10, false).unwrap();
    assert_eq!((t.translation_x, t.translation_y), (-30.0, 0.0));

    let bridge = c.compositor();
    let content = c.compositor_secondary_content(1, 10, false).unwrap();
    assert_eq!(content.content_type(), ContentType::TopHeader);
    assert_eq!(bridge.transform(&content), Some(t));

    assert!(matches!(
        c.add_secondary_content_for_type(1, 11, ContentType::Primary),
        Err(Error::InvalidContentType(ContentType::Primary))
    ));
}

#[test]
fn readding_secondary_content_reuses_the_engine_content() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    let curves = understory_manipulation::curve::CurveSet::pass_through();
    c.add_secondary_content(1, 10, curves.clone(), Vec2::ZERO)
        .unwrap();
    let first = c.compositor_secondary_content(1, 10, false).unwrap();
    c.add_secondary_content(1, 10, curves, Vec2::new(5.0, 5.0))
        .unwrap();
    let second = c.compositor_secondary_content(1, 10, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.snapshot(vp).unwrap().contents.len(), 1);
    assert_eq!(
        engine.content(second.engine_content()).unwrap().origin,
        Vec2::new(5.0, 5.0)
    );
    assert!(c.secondary_content_curves(1, 10, false).is_some());
}

#[test]
fn deferred_release_waits_for_finalize() {
    let (engine, mut c) = setup();
    c.register_viewport(1).unwrap();
    c.add_secondary_content_for_type(1, 10, ContentType::LeftHeader)
        .unwrap();
    c.add_secondary_clip_content(
        1,
        11,
        ContentType::Custom,
        understory_manipulation::curve::CurveSet::pass_through(),
    )
    .unwrap();
    let header = c
        .compositor_secondary_content(1, 10, false)
        .unwrap()
        .engine_content();
    let clip = c
        .compositor_secondary_content(1, 11, true)
        .unwrap()
        .engine_content();

    let mut token = DeferredRelease::new();
    c.remove_secondary_content(1, 10, Some(&mut token)).unwrap();
    assert!(token.is_pending());
    let record = engine.content(header).unwrap();
    assert_eq!(record.viewport, None);
    assert!(!record.released);

    token.finalize().unwrap();
    assert!(!token.is_pending());
    assert!(engine.content(header).unwrap().released);

    {
        let mut dropped = DeferredRelease::new();
        c.remove_secondary_clip_content(1, 11, Some(&mut dropped))
            .unwrap();
        assert!(!engine.content(clip).unwrap().released);
    }
    assert!(engine.content(clip).unwrap().released);

    assert!(matches!(
        c.remove_secondary_content(1, 10, None),
        Err(Error::ContentNotRegistered)
    ));
}

#[test]
fn unregister_releases_everything_mid_manipulation() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.enable_viewport(1).unwrap();
    c.add_secondary_content_for_type(1, 10, ContentType::TopHeader)
        .unwrap();
    c.add_secondary_clip_content(
        1,
        11,
        ContentType::Custom,
        understory_manipulation::curve::CurveSet::pass_through(),
    )
    .unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    c.add_cross_slide_configuration(1, CrossSlideKind::DragDrop)
        .unwrap();
    engine.set_status(vp, EngineStatus::Running);

    let bridge = c.compositor();
    let primary = c.compositor_primary_content(1).unwrap();
    assert!(bridge.tick(&primary, std::time::Duration::from_millis(16)));

    c.unregister_viewport(1).unwrap();
    assert!(engine.is_abandoned(vp));
    assert_eq!(engine.live_contents(), 0);
    assert_eq!(engine.live_handlers(), 0);
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Stopped);
    assert_eq!(c.drag_drop_viewport(), None);

    assert_eq!(bridge.transform(&primary), None);
    assert!(!bridge.tick(&primary, std::time::Duration::from_millis(16)));
    assert_eq!(engine.frame_count(), 1);
    assert_eq!(
        engine.last_frame().map(|f| f.elapsed),
        Some(std::time::Duration::from_millis(16))
    );
}

#[test]
fn unregister_finishes_teardown_after_a_failed_step() {
    let (engine, mut c) = setup();
    let vp = c.register_viewport(1).unwrap();
    c.add_secondary_content_for_type(1, 10, ContentType::TopHeader)
        .unwrap();
    c.apply_overpan_modes(1, OverpanMode::Suppress, OverpanMode::Default, 1.0, true)
        .unwrap();
    c.activate_auto_scroll(1, Axis::Vertical, true).unwrap();
    let bridge = c.compositor();
    let primary = c.compositor_primary_content(1).unwrap();

    engine.fail_next_handler_removal(EngineError::Failed("handler busy"));
    assert!(
        matches!(
            c.unregister_viewport(1),
            Err(Error::Engine(EngineError::Failed("handler busy")))
        ),
        "the first failure is reported"
    );

    assert!(!c.is_registered(1));
    assert!(engine.is_abandoned(vp));
    assert_eq!(engine.live_contents(), 0);
    assert_eq!(engine.live_handlers(), 0);
    assert_eq!(c.auto_scroll_status(), AutoScrollStatus::Stopped);
    assert_eq!(bridge.transform(&primary), None);

    // The handle can be registered again from scratch.
    let fresh = c.register_viewport(1).unwrap();
    assert_ne!(fresh, vp);
    assert_eq!(c.overpan_debug_info(1), None);
}
