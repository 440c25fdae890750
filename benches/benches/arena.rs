// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kurbo::Point;
use understory_gesture::{
    GestureArenaMember, GestureContext, GestureDisposition, PointerEvent, PointerId, PointerRoute,
};

struct Member;

impl GestureArenaMember for Member {
    fn accept_gesture(self: Rc<Self>, _: &GestureContext, pointer: PointerId) {
        black_box(pointer);
    }

    fn reject_gesture(self: Rc<Self>, _: &GestureContext, pointer: PointerId) {
        black_box(pointer);
    }
}

impl PointerRoute for Member {
    fn handle_event(self: Rc<Self>, _: &GestureContext, event: &PointerEvent) {
        black_box(event.position);
    }
}

fn bench_arena(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena");
    for members in [2_usize, 8, 32] {
        let pool: Vec<Rc<Member>> = (0..members).map(|_| Rc::new(Member)).collect();

        group.bench_with_input(BenchmarkId::new("sweep", members), &pool, |b, pool| {
            let ctx = GestureContext::new();
            b.iter(|| {
                let p = PointerId(1);
                for member in pool {
                    ctx.arena().add(p, member.clone());
                }
                ctx.arena().close(p);
                ctx.arena().sweep(p);
            });
        });

        group.bench_with_input(BenchmarkId::new("reject_all_but_last", members), &pool, |b, pool| {
            let ctx = GestureContext::new();
            b.iter(|| {
                let p = PointerId(1);
                let entries: Vec<_> = pool
                    .iter()
                    .map(|member| ctx.arena().add(p, member.clone()))
                    .collect();
                ctx.arena().close(p);
                for entry in &entries[1..] {
                    entry.resolve(&ctx, GestureDisposition::Rejected);
                }
                ctx.drain_tasks();
            });
        });
    }
    group.finish();
}

fn bench_router(c: &mut Criterion) {
    let mut group = c.benchmark_group("router");
    for routes in [1_usize, 8, 32] {
        let ctx = GestureContext::new();
        let p = PointerId(1);
        for _ in 0..routes {
            ctx.router().add_route(p, Rc::new(Member), None);
        }
        let event = PointerEvent::moved(p, Point::new(10.0, 10.0));
        group.bench_function(BenchmarkId::new("route", routes), |b| {
            b.iter(|| ctx.router().route(black_box(&event)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_arena, bench_router);
criterion_main!(benches);
