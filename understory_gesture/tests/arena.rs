// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the gesture arena and pointer router of `understory_gesture`.
//!
//! Every resolution path must notify each member exactly once, and routes
//! must follow snapshot semantics while events are being dispatched.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::Point;
use understory_gesture::{
    GestureArenaEntry, GestureArenaMember, GestureContext, GestureDisposition, PointerEvent,
    PointerId, PointerRoute,
};

const P: PointerId = PointerId(7);

#[derive(Default)]
struct Member {
    outcomes: RefCell<Vec<bool>>,
}

impl GestureArenaMember for Member {
    fn accept_gesture(self: Rc<Self>, _: &GestureContext, _: PointerId) {
        self.outcomes.borrow_mut().push(true);
    }

    fn reject_gesture(self: Rc<Self>, _: &GestureContext, _: PointerId) {
        self.outcomes.borrow_mut().push(false);
    }
}

fn join(ctx: &GestureContext, count: usize) -> (Vec<Rc<Member>>, Vec<GestureArenaEntry>) {
    let members: Vec<_> = (0..count).map(|_| Rc::new(Member::default())).collect();
    let entries = members
        .iter()
        .map(|member| ctx.arena().add(P, member.clone()))
        .collect();
    (members, entries)
}

fn outcomes(members: &[Rc<Member>]) -> Vec<Vec<bool>> {
    members
        .iter()
        .map(|member| member.outcomes.borrow().clone())
        .collect()
}

#[test]
fn rejections_leave_a_default_winner() {
    let ctx = GestureContext::new();
    let (members, entries) = join(&ctx, 3);
    ctx.arena().close(P);
    entries[0].resolve(&ctx, GestureDisposition::Rejected);
    entries[2].resolve(&ctx, GestureDisposition::Rejected);
    // The survivor only wins once deferred tasks run.
    assert_eq!(outcomes(&members), [vec![false], vec![], vec![false]]);
    ctx.drain_tasks();
    assert_eq!(outcomes(&members), [vec![false], vec![true], vec![false]]);
    assert!(!ctx.arena().has_arena(P));
}

#[test]
fn late_resolutions_are_ignored() {
    let ctx = GestureContext::new();
    let (members, entries) = join(&ctx, 2);
    ctx.arena().close(P);
    entries[1].resolve(&ctx, GestureDisposition::Accepted);
    entries[0].resolve(&ctx, GestureDisposition::Accepted);
    entries[1].resolve(&ctx, GestureDisposition::Rejected);
    ctx.arena().sweep(P);
    ctx.drain_tasks();
    assert_eq!(outcomes(&members), [vec![false], vec![true]]);
}

#[test]
fn eager_winner_waits_for_close() {
    let ctx = GestureContext::new();
    let (members, entries) = join(&ctx, 3);
    entries[2].resolve(&ctx, GestureDisposition::Accepted);
    entries[1].resolve(&ctx, GestureDisposition::Accepted);
    assert_eq!(outcomes(&members), [vec![], vec![], vec![]]);
    assert!(ctx.arena().is_open(P));
    ctx.arena().close(P);
    assert_eq!(outcomes(&members), [vec![false], vec![false], vec![true]]);
}

#[test]
fn held_arena_sweeps_on_release() {
    let ctx = GestureContext::new();
    let (members, _entries) = join(&ctx, 2);
    ctx.arena().close(P);
    ctx.arena().hold(P);
    ctx.arena().sweep(P);
    assert_eq!(ctx.arena().member_count(P), 2);
    ctx.arena().release(P);
    assert_eq!(outcomes(&members), [vec![true], vec![false]]);
}

#[test]
fn batch_defers_notifications() {
    let ctx = GestureContext::new();
    let (members, entries) = join(&ctx, 2);
    ctx.arena().close(P);
    ctx.batch(|| {
        entries[0].resolve(&ctx, GestureDisposition::Accepted);
        assert_eq!(outcomes(&members), [vec![], vec![]]);
    });
    assert_eq!(outcomes(&members), [vec![true], vec![false]]);
}

struct Listener {
    name: &'static str,
    log: Rc<RefCell<Vec<&'static str>>>,
    on_event: RefCell<Option<Box<dyn FnOnce(&GestureContext)>>>,
}

impl Listener {
    fn new(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Rc<Self> {
        Rc::new(Self {
            name,
            log: log.clone(),
            on_event: RefCell::new(None),
        })
    }
}

impl PointerRoute for Listener {
    fn handle_event(self: Rc<Self>, ctx: &GestureContext, _: &PointerEvent) {
        self.log.borrow_mut().push(self.name);
        let action = self.on_event.borrow_mut().take();
        if let Some(action) = action {
            action(ctx);
        }
    }
}

#[test]
fn routes_added_during_dispatch_wait_for_the_next_event() {
    let ctx = GestureContext::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let first = Listener::new("first", &log);
    let late = Listener::new("late", &log);
    let global = Listener::new("global", &log);

    let added = late.clone();
    *first.on_event.borrow_mut() = Some(Box::new(move |ctx: &GestureContext| {
        ctx.router().add_route(P, added, None);
    }));
    ctx.router().add_route(P, first.clone(), None);
    ctx.router().add_global_route(global.clone(), None);

    let event = PointerEvent::moved(P, Point::ZERO);
    ctx.router().route(&event);
    assert_eq!(*log.borrow(), ["first", "global"]);
    ctx.router().route(&event);
    assert_eq!(
        *log.borrow(),
        ["first", "global", "first", "late", "global"]
    );
}

#[test]
fn routes_removed_during_dispatch_are_skipped() {
    let ctx = GestureContext::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let first = Listener::new("first", &log);
    let second = Listener::new("second", &log);

    let removed: Rc<dyn PointerRoute> = second.clone();
    *first.on_event.borrow_mut() = Some(Box::new(move |ctx: &GestureContext| {
        ctx.router().remove_route(P, &removed);
    }));
    ctx.router().add_route(P, first.clone(), None);
    ctx.router().add_route(P, second.clone(), None);

    ctx.router().route(&PointerEvent::moved(P, Point::ZERO));
    assert_eq!(*log.borrow(), ["first"]);
    assert_eq!(ctx.router().route_count(P), 1);
}
