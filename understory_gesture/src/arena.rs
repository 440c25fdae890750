// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture arenas: per-pointer competitions that end with exactly one winner.
//!
//! Every recognizer interested in a pointer joins that pointer's arena with
//! [`GestureArenaManager::add`]. The arena stays *open* while new members may
//! still join (typically until the down event finishes dispatching) and is
//! then *closed*. A closed arena resolves as soon as the outcome is clear:
//!
//! - a member accepts: it wins, everybody else is rejected;
//! - all but one member reject: the survivor wins, but only from a deferred
//!   task, so that other members can still reject within the current turn;
//! - every member rejects: the arena is discarded without a winner;
//! - the pointer goes up with nobody having claimed it: the binding *sweeps*
//!   the arena and the first member to have joined wins.
//!
//! An accept while the arena is still open makes the member the *eager
//! winner*; the first eager winner is confirmed when the arena closes.
//! [`hold`](GestureArenaManager::hold) delays a sweep until
//! [`release`](GestureArenaManager::release), which is how double-tap style
//! recognizers keep an arena alive after the pointer is lifted.
//!
//! Every member receives exactly one of [`GestureArenaMember::accept_gesture`]
//! or [`GestureArenaMember::reject_gesture`] per arena it joined, delivered
//! when the current batch ends (see [`GestureContext::batch`]).
//!
//! ## Minimal example
//!
//! ```
//! use core::cell::RefCell;
//! use std::rc::Rc;
//! use understory_gesture::{GestureArenaMember, GestureContext, PointerId};
//!
//! #[derive(Debug, Default)]
//! struct Member(RefCell<Vec<&'static str>>);
//!
//! impl GestureArenaMember for Member {
//!     fn accept_gesture(self: Rc<Self>, _: &GestureContext, _: PointerId) {
//!         self.0.borrow_mut().push("accept");
//!     }
//!     fn reject_gesture(self: Rc<Self>, _: &GestureContext, _: PointerId) {
//!         self.0.borrow_mut().push("reject");
//!     }
//! }
//!
//! let ctx = GestureContext::new();
//! let (a, b) = (Rc::new(Member::default()), Rc::new(Member::default()));
//! let pointer = PointerId(1);
//!
//! ctx.arena().add(pointer, a.clone());
//! ctx.arena().add(pointer, b.clone());
//! ctx.arena().close(pointer);
//! ctx.arena().sweep(pointer);
//!
//! assert_eq!(*a.0.borrow(), ["accept"]);
//! assert_eq!(*b.0.borrow(), ["reject"]);
//! assert!(!ctx.arena().has_arena(pointer));
//! ```

use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use log::trace;

use crate::context::GestureContext;
use crate::event::PointerId;

/// Something that competes in gesture arenas.
///
/// Implementations receive exactly one of the two notifications for every
/// arena they join.
pub trait GestureArenaMember {
    /// This member won the arena for `pointer`.
    fn accept_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId);

    /// This member lost the arena for `pointer`.
    fn reject_gesture(self: Rc<Self>, ctx: &GestureContext, pointer: PointerId);
}

/// Outcome a member asks for when resolving its entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureDisposition {
    /// The member claims the pointer.
    Accepted,
    /// The member gives up on the pointer.
    Rejected,
}

pub(crate) fn member_addr<T: ?Sized>(member: *const T) -> *const () {
    member.cast::<()>()
}

/// A member's ticket in one arena, returned by [`GestureArenaManager::add`].
///
/// The entry only refers to its member weakly; the arena itself keeps the
/// member alive until it is resolved.
#[derive(Clone)]
pub struct GestureArenaEntry {
    pointer: PointerId,
    member: Weak<dyn GestureArenaMember>,
}

impl fmt::Debug for GestureArenaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureArenaEntry")
            .field("pointer", &self.pointer)
            .field("member", &member_addr(self.member.as_ptr()))
            .finish()
    }
}

impl GestureArenaEntry {
    /// Pointer whose arena this entry belongs to.
    #[must_use]
    pub fn pointer(&self) -> PointerId {
        self.pointer
    }

    /// Asks the arena to accept or reject this entry's member.
    ///
    /// Does nothing if the arena has already been resolved.
    pub fn resolve(&self, ctx: &GestureContext, disposition: GestureDisposition) {
        ctx.batch(|| {
            ctx.arena
                .borrow_mut()
                .resolve(self.pointer, member_addr(self.member.as_ptr()), disposition);
        });
    }
}

/// Queued arena notification, delivered by the context when a batch ends.
pub(crate) enum ArenaEffect {
    Accept {
        pointer: PointerId,
        member: Rc<dyn GestureArenaMember>,
    },
    Reject {
        pointer: PointerId,
        member: Rc<dyn GestureArenaMember>,
    },
    ResolveByDefault(PointerId),
}

struct Arena {
    members: Vec<Rc<dyn GestureArenaMember>>,
    is_open: bool,
    is_held: bool,
    has_pending_sweep: bool,
    eager_winner: Option<Rc<dyn GestureArenaMember>>,
}

impl Arena {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            is_open: true,
            is_held: false,
            has_pending_sweep: false,
            eager_winner: None,
        }
    }

    fn position_of(&self, member: *const ()) -> Option<usize> {
        self.members
            .iter()
            .position(|candidate| member_addr(Rc::as_ptr(candidate)) == member)
    }
}

/// Arena records keyed by pointer, plus the notification queue.
#[derive(Default)]
pub(crate) struct ArenaRegistry {
    arenas: HashMap<PointerId, Arena>,
    effects: VecDeque<ArenaEffect>,
}

impl ArenaRegistry {
    pub(crate) fn pop_effect(&mut self) -> Option<ArenaEffect> {
        self.effects.pop_front()
    }

    fn add(&mut self, pointer: PointerId, member: Rc<dyn GestureArenaMember>) {
        let arena = self.arenas.entry(pointer).or_insert_with(|| {
            trace!("{pointer:?}: arena created");
            Arena::new()
        });
        debug_assert!(arena.is_open, "cannot add a member to a closed arena");
        debug_assert!(
            arena.position_of(member_addr(Rc::as_ptr(&member))).is_none(),
            "a member may join an arena only once"
        );
        arena.members.push(member);
        trace!("{pointer:?}: member added ({} total)", arena.members.len());
    }

    fn close(&mut self, pointer: PointerId) {
        let Some(arena) = self.arenas.get_mut(&pointer) else {
            return;
        };
        arena.is_open = false;
        trace!("{pointer:?}: arena closed");
        self.try_to_resolve(pointer);
    }

    fn sweep(&mut self, pointer: PointerId) {
        let Some(arena) = self.arenas.get_mut(&pointer) else {
            return;
        };
        debug_assert!(!arena.is_open, "cannot sweep an open arena");
        if arena.is_held {
            arena.has_pending_sweep = true;
            trace!("{pointer:?}: sweep delayed by hold");
            return;
        }
        let Some(arena) = self.arenas.remove(&pointer) else {
            return;
        };
        let mut members = arena.members.into_iter();
        if let Some(winner) = members.next() {
            trace!("{pointer:?}: swept, first member wins");
            self.effects.push_back(ArenaEffect::Accept {
                pointer,
                member: winner,
            });
            for member in members {
                self.effects
                    .push_back(ArenaEffect::Reject { pointer, member });
            }
        } else {
            trace!("{pointer:?}: swept empty arena");
        }
    }

    fn hold(&mut self, pointer: PointerId) {
        if let Some(arena) = self.arenas.get_mut(&pointer) {
            arena.is_held = true;
            trace!("{pointer:?}: arena held");
        }
    }

    fn release(&mut self, pointer: PointerId) {
        let Some(arena) = self.arenas.get_mut(&pointer) else {
            return;
        };
        arena.is_held = false;
        trace!("{pointer:?}: arena released");
        if arena.has_pending_sweep {
            self.sweep(pointer);
        }
    }

    fn resolve(&mut self, pointer: PointerId, member: *const (), disposition: GestureDisposition) {
        let Some(arena) = self.arenas.get_mut(&pointer) else {
            // Already resolved.
            return;
        };
        let index = arena.position_of(member);
        debug_assert!(index.is_some(), "resolving a member that is not in the arena");
        let Some(index) = index else {
            return;
        };
        match disposition {
            GestureDisposition::Accepted => {
                if arena.is_open {
                    if arena.eager_winner.is_none() {
                        trace!("{pointer:?}: eager winner recorded");
                        arena.eager_winner = Some(arena.members[index].clone());
                    }
                } else {
                    trace!("{pointer:?}: accepted while closed");
                    let winner = arena.members[index].clone();
                    self.resolve_in_favor_of(pointer, &winner);
                }
            }
            GestureDisposition::Rejected => {
                let rejected = arena.members.remove(index);
                let is_open = arena.is_open;
                trace!("{pointer:?}: member rejected ({} left)", arena.members.len());
                self.effects.push_back(ArenaEffect::Reject {
                    pointer,
                    member: rejected,
                });
                if !is_open {
                    self.try_to_resolve(pointer);
                }
            }
        }
    }

    fn try_to_resolve(&mut self, pointer: PointerId) {
        let Some(arena) = self.arenas.get(&pointer) else {
            return;
        };
        if arena.members.len() == 1 {
            trace!("{pointer:?}: default winner scheduled");
            self.effects.push_back(ArenaEffect::ResolveByDefault(pointer));
        } else if arena.members.is_empty() {
            trace!("{pointer:?}: arena discarded without a winner");
            self.arenas.remove(&pointer);
        } else if let Some(winner) = arena.eager_winner.clone() {
            trace!("{pointer:?}: eager winner confirmed");
            self.resolve_in_favor_of(pointer, &winner);
        }
    }

    fn resolve_by_default(&mut self, pointer: PointerId) {
        let Some(arena) = self.arenas.get(&pointer) else {
            // Already resolved earlier.
            return;
        };
        debug_assert!(!arena.is_open, "default resolution of an open arena");
        if arena.members.len() != 1 {
            return;
        }
        let Some(mut arena) = self.arenas.remove(&pointer) else {
            return;
        };
        if let Some(member) = arena.members.pop() {
            trace!("{pointer:?}: default winner accepted");
            self.effects
                .push_back(ArenaEffect::Accept { pointer, member });
        }
    }

    fn resolve_in_favor_of(&mut self, pointer: PointerId, winner: &Rc<dyn GestureArenaMember>) {
        let Some(arena) = self.arenas.remove(&pointer) else {
            return;
        };
        debug_assert!(
            arena
                .eager_winner
                .as_ref()
                .is_none_or(|eager| Rc::ptr_eq(eager, winner)),
            "an arena can only have one winner"
        );
        let winner_addr = member_addr(Rc::as_ptr(winner));
        for member in arena.members {
            if member_addr(Rc::as_ptr(&member)) != winner_addr {
                self.effects
                    .push_back(ArenaEffect::Reject { pointer, member });
            }
        }
        self.effects.push_back(ArenaEffect::Accept {
            pointer,
            member: winner.clone(),
        });
    }
}

/// Access to the arenas of a [`GestureContext`], from
/// [`GestureContext::arena`].
#[derive(Clone, Copy)]
pub struct GestureArenaManager<'a> {
    ctx: &'a GestureContext,
}

impl fmt::Debug for GestureArenaManager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.ctx.arena.borrow();
        f.debug_struct("GestureArenaManager")
            .field("arenas", &registry.arenas.len())
            .field("queued_effects", &registry.effects.len())
            .finish()
    }
}

impl<'a> GestureArenaManager<'a> {
    pub(crate) fn new(ctx: &'a GestureContext) -> Self {
        Self { ctx }
    }

    /// Adds `member` to the arena for `pointer`, creating an open arena if
    /// there is none.
    ///
    /// Adding to a closed arena is a programming error.
    pub fn add(
        &self,
        pointer: PointerId,
        member: Rc<dyn GestureArenaMember>,
    ) -> GestureArenaEntry {
        let entry = GestureArenaEntry {
            pointer,
            member: Rc::downgrade(&member),
        };
        self.ctx
            .batch(|| self.ctx.arena.borrow_mut().add(pointer, member));
        entry
    }

    /// Prevents new members from joining and resolves the arena if possible.
    pub fn close(&self, pointer: PointerId) {
        self.ctx
            .batch(|| self.ctx.arena.borrow_mut().close(pointer));
    }

    /// Resolves a closed arena in favor of its first member.
    ///
    /// If the arena is held, the sweep happens on [`release`](Self::release).
    pub fn sweep(&self, pointer: PointerId) {
        self.ctx
            .batch(|| self.ctx.arena.borrow_mut().sweep(pointer));
    }

    /// Delays any sweep of the arena until [`release`](Self::release).
    pub fn hold(&self, pointer: PointerId) {
        self.ctx.batch(|| self.ctx.arena.borrow_mut().hold(pointer));
    }

    /// Releases a hold, performing a sweep that was requested meanwhile.
    pub fn release(&self, pointer: PointerId) {
        self.ctx
            .batch(|| self.ctx.arena.borrow_mut().release(pointer));
    }

    pub(crate) fn resolve_by_default(&self, pointer: PointerId) {
        self.ctx
            .batch(|| self.ctx.arena.borrow_mut().resolve_by_default(pointer));
    }

    /// Returns `true` if an unresolved arena exists for `pointer`.
    #[must_use]
    pub fn has_arena(&self, pointer: PointerId) -> bool {
        self.ctx.arena.borrow().arenas.contains_key(&pointer)
    }

    /// Number of members still competing for `pointer`.
    #[must_use]
    pub fn member_count(&self, pointer: PointerId) -> usize {
        self.ctx
            .arena
            .borrow()
            .arenas
            .get(&pointer)
            .map_or(0, |arena| arena.members.len())
    }

    /// Returns `true` if the arena for `pointer` exists and is open.
    #[must_use]
    pub fn is_open(&self, pointer: PointerId) -> bool {
        self.ctx
            .arena
            .borrow()
            .arenas
            .get(&pointer)
            .is_some_and(|arena| arena.is_open)
    }
}
