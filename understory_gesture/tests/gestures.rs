// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end tests for `understory_gesture`.
//!
//! These drive recognizers through a [`GestureBinding`] the way a host
//! would: hit-testing, routing, arena management and timers all come from
//! the binding and its context.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kurbo::{Point, Vec2};
use understory_gesture::{
    DragGestureRecognizer, GestureBinding, GestureTarget, HitTestEntry, HitTestResult,
    HitTestTarget, HitTester, LongPressGestureRecognizer, PointerChange, PointerData, PointerEvent,
    PointerId, TapGestureRecognizer, ViewId,
};

type Log = Rc<RefCell<Vec<String>>>;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// A binding whose hit test always yields `targets`, innermost first.
fn binding_over(
    targets: Vec<Rc<dyn HitTestTarget>>,
) -> GestureBinding<impl Fn(&mut HitTestResult, Point, ViewId)> {
    GestureBinding::new(move |result: &mut HitTestResult, _: Point, _: ViewId| {
        for target in &targets {
            result.add(HitTestEntry::new(target.clone()));
        }
    })
}

#[test]
fn tap_or_long_press_depending_on_hold_time() {
    let taps = Log::default();
    let long_presses = Log::default();
    let (down, tap, cancel) = (taps.clone(), taps.clone(), taps.clone());
    let long_press = long_presses.clone();
    let target: Rc<dyn HitTestTarget> = Rc::new(
        GestureTarget::new()
            .with_recognizer(
                TapGestureRecognizer::new()
                    .on_tap_down(move |_| push(&down, "tap down"))
                    .on_tap(move || push(&tap, "tap"))
                    .on_tap_cancel(move || push(&cancel, "tap cancel")),
            )
            .with_recognizer(
                LongPressGestureRecognizer::new().on_long_press(move || push(&long_press, "long press")),
            ),
    );
    let mut binding = binding_over(vec![target]);

    binding.handle_event(PointerEvent::down(PointerId(1), Point::ZERO));
    binding.handle_event(PointerEvent::up(PointerId(1), Point::ZERO).with_timestamp(ms(50)));
    assert_eq!(*taps.borrow(), ["tap down", "tap"]);
    assert!(long_presses.borrow().is_empty());

    binding.handle_event(PointerEvent::down(PointerId(2), Point::ZERO).with_timestamp(ms(1_000)));
    binding.context().advance_to(ms(1_499));
    assert_eq!(*taps.borrow(), ["tap down", "tap", "tap down"]);
    assert!(long_presses.borrow().is_empty());
    binding.context().advance_to(ms(1_500));
    assert_eq!(*long_presses.borrow(), ["long press"]);
    binding.handle_event(PointerEvent::up(PointerId(2), Point::ZERO).with_timestamp(ms(1_600)));
    assert_eq!(*taps.borrow(), ["tap down", "tap", "tap down", "tap cancel"]);
    assert_eq!(*long_presses.borrow(), ["long press"]);
}

fn swipe<H: HitTester>(binding: &mut GestureBinding<H>, pointer: u64, t: u64, step: Vec2) {
    let pointer = PointerId(pointer);
    binding.handle_event(PointerEvent::down(pointer, Point::ZERO).with_timestamp(ms(t)));
    let mut position = Point::ZERO;
    for i in 1..=4 {
        position += step;
        binding.handle_event(
            PointerEvent::moved(pointer, position)
                .with_delta(step)
                .with_timestamp(ms(t + 10 * i)),
        );
    }
    binding.handle_event(PointerEvent::up(pointer, position).with_timestamp(ms(t + 50)));
}

#[test]
fn nested_drags_split_by_axis() {
    let log = Log::default();
    let drag_target = |drag: DragGestureRecognizer, name: &'static str| -> Rc<dyn HitTestTarget> {
        let (start, end) = (log.clone(), log.clone());
        Rc::new(
            GestureTarget::new().with_recognizer(
                drag.on_drag_start(move |_| push(&start, format!("{name} start")))
                    .on_drag_end(move |_| push(&end, format!("{name} end"))),
            ),
        )
    };
    let inner = drag_target(DragGestureRecognizer::horizontal(), "horizontal");
    let outer = drag_target(DragGestureRecognizer::vertical(), "vertical");
    let mut binding = binding_over(vec![inner, outer]);

    swipe(&mut binding, 1, 0, Vec2::new(0.0, 10.0));
    assert_eq!(*log.borrow(), ["vertical start", "vertical end"]);
    swipe(&mut binding, 2, 1_000, Vec2::new(10.0, 2.0));
    assert_eq!(
        *log.borrow(),
        [
            "vertical start",
            "vertical end",
            "horizontal start",
            "horizontal end"
        ]
    );
}

#[derive(Default)]
struct Recorder {
    seen: RefCell<Vec<String>>,
}

impl HitTestTarget for Recorder {
    fn handle_event(
        &self,
        _: &understory_gesture::GestureContext,
        event: &PointerEvent,
        _: &HitTestEntry,
    ) {
        self.seen.borrow_mut().push(format!(
            "{:?} {} {}",
            event.kind, event.position.x, event.position.y
        ));
    }
}

#[test]
fn pointer_data_for_unknown_views_is_dropped() {
    let recorder = Rc::new(Recorder::default());
    let target: Rc<dyn HitTestTarget> = recorder.clone();
    let mut binding = binding_over(vec![target]);
    let records = [
        PointerData::new(PointerChange::Down, PointerId(1), Point::new(40.0, 60.0))
            .with_view(ViewId(1)),
        PointerData::new(PointerChange::Down, PointerId(2), Point::new(8.0, 8.0))
            .with_view(ViewId(9)),
        PointerData::new(PointerChange::Move, PointerId(1), Point::new(50.0, 60.0))
            .with_view(ViewId(1))
            .with_delta(Vec2::new(10.0, 0.0)),
        PointerData::new(PointerChange::Up, PointerId(1), Point::new(50.0, 60.0))
            .with_view(ViewId(1)),
    ];
    binding.handle_pointer_data(records, |view| (view == ViewId(1)).then_some(2.0));
    assert_eq!(
        *recorder.seen.borrow(),
        ["Down 20 30", "Move 25 30", "Up 25 30"]
    );
    assert!(!binding.is_pointer_down(PointerId(1)));
    assert!(!binding.is_pointer_down(PointerId(2)));
}

#[test]
fn trackpad_pans_through_the_binding() {
    let log = Log::default();
    let (start, update, end) = (log.clone(), log.clone(), log.clone());
    let target: Rc<dyn HitTestTarget> = Rc::new(
        GestureTarget::new().with_recognizer(
            DragGestureRecognizer::pan()
                .on_drag_start(move |d| {
                    push(
                        &start,
                        format!("start {} {}", d.global_position.x, d.global_position.y),
                    );
                })
                .on_drag_update(move |d| push(&update, format!("update {} {}", d.delta.x, d.delta.y)))
                .on_drag_end(move |_| push(&end, "end")),
        ),
    );
    let mut binding = binding_over(vec![target]);
    let p = PointerId(5);
    let at = Point::new(10.0, 10.0);
    binding.handle_event(PointerEvent::pan_zoom_start(p, at));
    binding.handle_event(
        PointerEvent::pan_zoom_update(p, at, Vec2::new(0.0, 5.0), Vec2::new(0.0, 5.0))
            .with_timestamp(ms(10)),
    );
    binding.handle_event(PointerEvent::pan_zoom_end(p, at).with_timestamp(ms(300)));
    assert_eq!(*log.borrow(), ["start 10 10", "update 0 5", "end"]);
    assert!(!binding.context().router().is_routed(p));
}

#[test]
fn cancelled_pointer_fires_no_tap() {
    let log = Log::default();
    let (tap, cancel) = (log.clone(), log.clone());
    let target: Rc<dyn HitTestTarget> = Rc::new(
        GestureTarget::new().with_recognizer(
            TapGestureRecognizer::new()
                .on_tap(move || push(&tap, "tap"))
                .on_tap_cancel(move || push(&cancel, "cancel")),
        ),
    );
    let mut binding = binding_over(vec![target]);
    binding.handle_event(PointerEvent::down(PointerId(1), Point::ZERO));
    assert!(binding.cancel_pointer(PointerId(1)));
    assert!(!binding.cancel_pointer(PointerId(1)));
    assert_eq!(*log.borrow(), ["cancel"]);
    assert!(!binding.context().router().is_routed(PointerId(1)));
}
