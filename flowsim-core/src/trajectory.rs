//! Trajectories: user-built activity graphs executed by arrivals.
//!
//! A trajectory is an arena of [`Activity`] nodes linked by indices, built
//! front-to-back with [`TrajectoryBuilder`]. The chain is mostly linear;
//! branches fan out into embedded sub-paths and rollbacks add back-edges, so
//! plain indices (not owning references) keep the graph cycles harmless.
//!
//! Every activity parameter that the host may want to compute per-arrival
//! (a timeout, a seize amount, a branch selector) is a [`Dynamic`]: either a
//! literal or a boxed callback, optionally fed a snapshot of the arrival's
//! attributes.

use std::fmt;

use crate::arrival::{Arrival, Attributes, MonitorLevel};
use crate::error::SimError;
use crate::resource::{SeizePolicy, SeizeResult};
use crate::simulator::SimCtx;
use crate::time::SimTime;

/// Index of an activity inside its trajectory's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivityId(pub(crate) usize);

/// An activity parameter: a literal, or a host callback.
pub enum Dynamic<T> {
    Value(T),
    Call {
        call: Box<dyn FnMut(Option<&Attributes>) -> T>,
        /// Pass a snapshot of the arrival's attributes to the callback.
        provide_attrs: bool,
    },
}

impl<T: Copy> Dynamic<T> {
    /// Wrap a callback that is invoked with no arguments.
    pub fn call(f: impl FnMut(Option<&Attributes>) -> T + 'static) -> Self {
        Dynamic::Call {
            call: Box::new(f),
            provide_attrs: false,
        }
    }

    /// Wrap a callback that receives the arrival's attributes.
    pub fn call_with_attrs(f: impl FnMut(Option<&Attributes>) -> T + 'static) -> Self {
        Dynamic::Call {
            call: Box::new(f),
            provide_attrs: true,
        }
    }

    fn eval(&mut self, attrs: &Attributes) -> T {
        match self {
            Dynamic::Value(v) => *v,
            Dynamic::Call { call, provide_attrs } => {
                if *provide_attrs {
                    call(Some(attrs))
                } else {
                    call(None)
                }
            }
        }
    }
}

impl<T> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Dynamic::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Value(v) => write!(f, "{v:?}"),
            Dynamic::Call { .. } => write!(f, "function()"),
        }
    }
}

pub(crate) enum RollbackMode {
    /// Roll back this many times per arrival; negative means forever.
    Times(i32),
    /// Roll back while the predicate holds.
    Check(Dynamic<bool>),
}

pub(crate) enum ActivityKind {
    Timeout {
        delay: Dynamic<f64>,
    },
    SetAttribute {
        key: String,
        value: Dynamic<f64>,
    },
    Seize {
        resource: String,
        amount: Dynamic<i32>,
        policy: SeizePolicy,
        /// Where to continue when the seize is rejected; absent means the
        /// arrival is dropped.
        rejection: Option<ActivityId>,
    },
    Release {
        resource: String,
        amount: Dynamic<i32>,
    },
    Branch {
        option: Dynamic<usize>,
        paths: Vec<ActivityId>,
        merge: Vec<bool>,
    },
    Rollback {
        target: ActivityId,
        mode: RollbackMode,
    },
}

pub(crate) struct Activity {
    pub(crate) next: Option<ActivityId>,
    pub(crate) prev: Option<ActivityId>,
    pub(crate) kind: ActivityKind,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActivityKind::Timeout { delay } => {
                write!(f, "{{ Activity: Timeout | delay: {delay:?} }}")
            }
            ActivityKind::SetAttribute { key, value } => {
                write!(f, "{{ Activity: SetAttribute | key: {key}, value: {value:?} }}")
            }
            ActivityKind::Seize {
                resource,
                amount,
                policy,
                ..
            } => write!(
                f,
                "{{ Activity: Seize | resource: {resource}, amount: {amount:?}, priority: {} }}",
                policy.priority
            ),
            ActivityKind::Release { resource, amount } => {
                write!(
                    f,
                    "{{ Activity: Release | resource: {resource}, amount: {amount:?} }}"
                )
            }
            ActivityKind::Branch { paths, .. } => {
                write!(f, "{{ Activity: Branch | paths: {} }}", paths.len())
            }
            ActivityKind::Rollback { target, mode } => match mode {
                RollbackMode::Times(times) if *times >= 0 => write!(
                    f,
                    "{{ Activity: Rollback | target: {}, times: {times} }}",
                    target.0
                ),
                RollbackMode::Times(_) => {
                    write!(f, "{{ Activity: Rollback | target: {}, times: Inf }}", target.0)
                }
                RollbackMode::Check(_) => write!(
                    f,
                    "{{ Activity: Rollback | target: {}, check: function() }}",
                    target.0
                ),
            },
        }
    }
}

/// What the event loop should do after an activity ran.
pub(crate) enum Step {
    /// Advance to the next node (or to `goto`) and reschedule after `delay`.
    Advance {
        delay: SimTime,
        goto: Option<ActivityId>,
    },
    /// The arrival was parked inside a resource; the resource reschedules it.
    Wait,
    /// The arrival was turned away with nowhere to go.
    Drop,
}

/// A user-built activity graph.
///
/// Trajectories are registered on the simulator under a name; arrivals hold
/// a position into the arena and the trajectory outlives all of them.
pub struct Trajectory {
    name: String,
    arena: Vec<Activity>,
    head: Option<ActivityId>,
}

impl Trajectory {
    /// Start building a trajectory.
    pub fn builder(name: &str) -> TrajectoryBuilder {
        TrajectoryBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of activities, including embedded sub-paths.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub(crate) fn head(&self) -> Option<ActivityId> {
        self.head
    }

    pub(crate) fn next_of(&self, id: ActivityId) -> Option<ActivityId> {
        self.arena[id.0].next
    }

    /// Execute one activity for `arrival` and report how to proceed.
    pub(crate) fn execute(
        &mut self,
        id: ActivityId,
        arrival: &mut Arrival,
        ctx: &mut SimCtx<'_>,
    ) -> Result<Step, SimError> {
        let activity = &mut self.arena[id.0];
        match &mut activity.kind {
            ActivityKind::Timeout { delay } => {
                let raw = delay.eval(arrival.attributes());
                if !raw.is_finite() {
                    return Err(SimError::NonFiniteDelay { value: raw });
                }
                // negative delays are coerced positive
                Ok(Step::Advance {
                    delay: SimTime::from_secs_f64(raw.abs()),
                    goto: None,
                })
            }
            ActivityKind::SetAttribute { key, value } => {
                let v = value.eval(arrival.attributes());
                arrival.set_attribute(key, v);
                if arrival.monitoring() >= MonitorLevel::Attributes {
                    ctx.monitor.lock().unwrap().on_attribute(
                        arrival.name(),
                        ctx.scheduler.time(),
                        key,
                        v,
                    );
                }
                Ok(Step::Advance {
                    delay: SimTime::zero(),
                    goto: None,
                })
            }
            ActivityKind::Seize {
                resource,
                amount,
                policy,
                rejection,
            } => {
                let amt = amount.eval(arrival.attributes());
                if amt < 0 {
                    return Err(SimError::NegativeAmount {
                        op: "seize",
                        amount: amt,
                    });
                }
                let res = ctx
                    .resources
                    .get_mut(resource.as_str())
                    .ok_or_else(|| SimError::UnknownResource(resource.clone()))?;
                match res.seize(
                    arrival,
                    amt,
                    *policy,
                    ctx.arrivals,
                    ctx.scheduler,
                    ctx.monitor,
                ) {
                    SeizeResult::Admitted => Ok(Step::Advance {
                        delay: SimTime::zero(),
                        goto: None,
                    }),
                    SeizeResult::Enqueued => Ok(Step::Wait),
                    SeizeResult::Rejected => match rejection {
                        Some(target) => Ok(Step::Advance {
                            delay: SimTime::zero(),
                            goto: Some(*target),
                        }),
                        None => Ok(Step::Drop),
                    },
                }
            }
            ActivityKind::Release { resource, amount } => {
                let amt = amount.eval(arrival.attributes());
                if amt < 0 {
                    return Err(SimError::NegativeAmount {
                        op: "release",
                        amount: amt,
                    });
                }
                let res = ctx
                    .resources
                    .get_mut(resource.as_str())
                    .ok_or_else(|| SimError::UnknownResource(resource.clone()))?;
                res.release(arrival, amt, ctx.arrivals, ctx.scheduler, ctx.monitor)?;
                Ok(Step::Advance {
                    delay: SimTime::zero(),
                    goto: None,
                })
            }
            ActivityKind::Branch {
                option,
                paths,
                merge,
            } => {
                if arrival.branch_pending.remove(&id) {
                    // a merged sub-path looped back; fall through to `next`
                    return Ok(Step::Advance {
                        delay: SimTime::zero(),
                        goto: None,
                    });
                }
                let chosen = option.eval(arrival.attributes());
                if chosen < 1 || chosen > paths.len() {
                    return Err(SimError::BranchOutOfRange {
                        selected: chosen,
                        paths: paths.len(),
                    });
                }
                if merge[chosen - 1] {
                    arrival.branch_pending.insert(id);
                }
                Ok(Step::Advance {
                    delay: SimTime::zero(),
                    goto: Some(paths[chosen - 1]),
                })
            }
            ActivityKind::Rollback { target, mode } => {
                let go_back = match mode {
                    RollbackMode::Times(times) if *times >= 0 => {
                        let left = arrival.rollback_left.entry(id).or_insert(*times);
                        if *left == 0 {
                            arrival.rollback_left.remove(&id);
                            false
                        } else {
                            *left -= 1;
                            true
                        }
                    }
                    RollbackMode::Times(_) => true,
                    RollbackMode::Check(check) => check.eval(arrival.attributes()),
                };
                Ok(Step::Advance {
                    delay: SimTime::zero(),
                    goto: go_back.then_some(*target),
                })
            }
        }
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trajectory '{}':", self.name)?;
        for (i, activity) in self.arena.iter().enumerate() {
            writeln!(f, "  [{i}] {activity}")?;
        }
        Ok(())
    }
}

/// Front-to-back builder for [`Trajectory`].
///
/// Activities append in order and link automatically; rollback back-targets
/// are resolved against the construction order at push time. Branch paths
/// and seize rejection paths are separate builders embedded into the parent
/// arena.
pub struct TrajectoryBuilder {
    name: String,
    arena: Vec<Activity>,
    head: Option<ActivityId>,
    tail: Option<ActivityId>,
}

impl TrajectoryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arena: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// An unnamed builder for a branch path or rejection path.
    pub fn path() -> Self {
        Self::new("")
    }

    fn push(mut self, kind: ActivityKind) -> Self {
        let id = ActivityId(self.arena.len());
        let prev = self.tail;
        self.arena.push(Activity {
            next: None,
            prev,
            kind,
        });
        if let Some(prev) = prev {
            self.arena[prev.0].next = Some(id);
        }
        if self.head.is_none() {
            self.head = Some(id);
        }
        self.tail = Some(id);
        self
    }

    /// Move the sub-builder's activities into this arena, shifting every
    /// stored index. Returns the relocated (head, tail).
    fn embed(&mut self, sub: TrajectoryBuilder) -> (ActivityId, ActivityId) {
        let offset = self.arena.len();
        let head = ActivityId(sub.head.expect("sub-path is not empty").0 + offset);
        let tail = ActivityId(sub.tail.expect("sub-path is not empty").0 + offset);
        for mut activity in sub.arena {
            activity.next = activity.next.map(|n| ActivityId(n.0 + offset));
            activity.prev = activity.prev.map(|p| ActivityId(p.0 + offset));
            match &mut activity.kind {
                ActivityKind::Branch { paths, .. } => {
                    for p in paths {
                        *p = ActivityId(p.0 + offset);
                    }
                }
                ActivityKind::Rollback { target, .. } => *target = ActivityId(target.0 + offset),
                ActivityKind::Seize { rejection, .. } => {
                    if let Some(r) = rejection {
                        *r = ActivityId(r.0 + offset);
                    }
                }
                _ => {}
            }
            self.arena.push(activity);
        }
        (head, tail)
    }

    /// Wait for a delay (seconds); negative results are coerced positive.
    pub fn timeout(self, delay: impl Into<Dynamic<f64>>) -> Self {
        self.push(ActivityKind::Timeout {
            delay: delay.into(),
        })
    }

    /// Write an attribute on the traversing arrival.
    pub fn set_attribute(self, key: &str, value: impl Into<Dynamic<f64>>) -> Self {
        self.push(ActivityKind::SetAttribute {
            key: key.to_string(),
            value: value.into(),
        })
    }

    /// Acquire units of a resource with the default policy.
    pub fn seize(self, resource: &str, amount: impl Into<Dynamic<i32>>) -> Self {
        self.seize_with(resource, amount, SeizePolicy::default())
    }

    /// Acquire units of a resource with an explicit policy.
    pub fn seize_with(
        self,
        resource: &str,
        amount: impl Into<Dynamic<i32>>,
        policy: SeizePolicy,
    ) -> Self {
        self.push(ActivityKind::Seize {
            resource: resource.to_string(),
            amount: amount.into(),
            policy,
            rejection: None,
        })
    }

    /// Acquire units of a resource, continuing into `rejection` if the
    /// resource turns the arrival away.
    pub fn seize_or(
        mut self,
        resource: &str,
        amount: impl Into<Dynamic<i32>>,
        policy: SeizePolicy,
        rejection: TrajectoryBuilder,
    ) -> Self {
        assert!(
            !rejection.arena.is_empty(),
            "rejection path must contain at least one activity"
        );
        self = self.push(ActivityKind::Seize {
            resource: resource.to_string(),
            amount: amount.into(),
            policy,
            rejection: None,
        });
        let id = self.tail.expect("just pushed");
        let (head, _) = self.embed(rejection);
        if let ActivityKind::Seize { rejection, .. } = &mut self.arena[id.0].kind {
            *rejection = Some(head);
        }
        self
    }

    /// Give back units of a resource.
    pub fn release(self, resource: &str, amount: impl Into<Dynamic<i32>>) -> Self {
        self.push(ActivityKind::Release {
            resource: resource.to_string(),
            amount: amount.into(),
        })
    }

    /// Fan out into one of `paths` chosen by the 1-indexed `option`
    /// selector. Paths flagged with `merge = true` return to the activity
    /// after the branch when they finish; others end the arrival when their
    /// last activity completes.
    pub fn branch(
        mut self,
        option: impl Into<Dynamic<usize>>,
        paths: Vec<(TrajectoryBuilder, bool)>,
    ) -> Self {
        self = self.push(ActivityKind::Branch {
            option: option.into(),
            paths: Vec::new(),
            merge: Vec::new(),
        });
        let branch_id = self.tail.expect("just pushed");
        let mut heads = Vec::with_capacity(paths.len());
        let mut merges = Vec::with_capacity(paths.len());
        for (sub, merge) in paths {
            assert!(
                !sub.arena.is_empty(),
                "branch path must contain at least one activity"
            );
            let (head, tail) = self.embed(sub);
            if merge {
                // loop the path back to the branch; on the second visit the
                // branch passes the arrival through to its own `next`
                self.arena[tail.0].next = Some(branch_id);
            }
            heads.push(head);
            merges.push(merge);
        }
        if let ActivityKind::Branch { paths, merge, .. } = &mut self.arena[branch_id.0].kind {
            *paths = heads;
            *merge = merges;
        }
        self
    }

    /// Go back `amount` activities, up to `times` times per arrival
    /// (negative: forever).
    pub fn rollback(self, amount: usize, times: i32) -> Self {
        self.push_rollback(amount, RollbackMode::Times(times))
    }

    /// Go back `amount` activities while `check` returns `true`.
    pub fn rollback_if(self, amount: usize, check: impl Into<Dynamic<bool>>) -> Self {
        self.push_rollback(amount, RollbackMode::Check(check.into()))
    }

    fn push_rollback(mut self, amount: usize, mode: RollbackMode) -> Self {
        assert!(amount >= 1, "rollback must go back at least one activity");
        self = self.push(ActivityKind::Rollback {
            target: ActivityId(0),
            mode,
        });
        let id = self.tail.expect("just pushed");
        let mut target = id;
        for _ in 0..amount {
            match self.arena[target.0].prev {
                Some(prev) => target = prev,
                None => break,
            }
        }
        if let ActivityKind::Rollback { target: t, .. } = &mut self.arena[id.0].kind {
            *t = target;
        }
        self
    }

    pub fn build(self) -> Trajectory {
        Trajectory {
            name: self.name,
            arena: self.arena,
            head: self.head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_links_a_linear_chain() {
        let t = Trajectory::builder("flow")
            .seize("server", 1)
            .timeout(5.0)
            .release("server", 1)
            .build();
        assert_eq!(t.len(), 3);
        assert_eq!(t.head(), Some(ActivityId(0)));
        assert_eq!(t.next_of(ActivityId(0)), Some(ActivityId(1)));
        assert_eq!(t.next_of(ActivityId(1)), Some(ActivityId(2)));
        assert_eq!(t.next_of(ActivityId(2)), None);
    }

    #[test]
    fn rollback_target_walks_predecessors() {
        let t = Trajectory::builder("loop")
            .set_attribute("n", 0.0)
            .timeout(1.0)
            .timeout(2.0)
            .rollback(2, 3)
            .build();
        match &t.arena[3].kind {
            ActivityKind::Rollback { target, .. } => assert_eq!(*target, ActivityId(1)),
            _ => panic!("expected a rollback node"),
        }
    }

    #[test]
    fn rollback_target_saturates_at_the_head() {
        let t = Trajectory::builder("loop").timeout(1.0).rollback(10, -1).build();
        match &t.arena[1].kind {
            ActivityKind::Rollback { target, .. } => assert_eq!(*target, ActivityId(0)),
            _ => panic!("expected a rollback node"),
        }
    }

    #[test]
    fn merged_branch_path_loops_back_to_the_branch() {
        let t = Trajectory::builder("fork")
            .branch(
                1usize,
                vec![
                    (TrajectoryBuilder::path().timeout(1.0), true),
                    (TrajectoryBuilder::path().timeout(2.0), false),
                ],
            )
            .timeout(9.0)
            .build();

        let (paths, merge) = match &t.arena[0].kind {
            ActivityKind::Branch { paths, merge, .. } => (paths.clone(), merge.clone()),
            _ => panic!("expected a branch node"),
        };
        assert_eq!(merge, vec![true, false]);
        // merged path returns to the branch node, the other just ends
        assert_eq!(t.next_of(paths[0]), Some(ActivityId(0)));
        assert_eq!(t.next_of(paths[1]), None);
        // the activity after the branch is its `next`
        assert_eq!(t.next_of(ActivityId(0)), Some(ActivityId(3)));
    }

    #[test]
    fn display_renders_callbacks_opaquely() {
        let t = Trajectory::builder("flow")
            .timeout(Dynamic::call(|_| 1.0))
            .seize("server", 2)
            .build();
        let text = t.to_string();
        assert!(text.contains("Timeout | delay: function()"));
        assert!(text.contains("Seize | resource: server, amount: 2"));
    }

    #[test]
    fn dynamic_literals_and_callbacks_evaluate() {
        let attrs = {
            let mut a = Attributes::new();
            a.set("x", 4.0);
            a
        };
        let mut lit: Dynamic<f64> = 3.0.into();
        assert_eq!(lit.eval(&attrs), 3.0);

        let mut plain = Dynamic::call(|attrs| {
            assert!(attrs.is_none());
            7.0
        });
        assert_eq!(plain.eval(&attrs), 7.0);

        let mut with_attrs = Dynamic::call_with_attrs(|attrs| attrs.unwrap().get("x") + 1.0);
        assert_eq!(with_attrs.eval(&attrs), 5.0);
    }
}
