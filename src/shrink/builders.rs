//! Builder elimination: dead per-message builders and the policies that enable it.
//!
//! Per-message builder classes subclass one shared generic builder base and exist only
//! so the reflection method can construct them. When the whole-program liveness result
//! finds a builder class dead, its construction site inside the reflection method is
//! redirected to the generic base, which makes the per-message class deletable.
//!
//! The pass has three parts:
//!
//! - A registry populated *during* the reachability fixpoint: the first time a
//!   reflection method is observed constructing its builder, the pair is recorded.
//! - The post-fixpoint rewrite: construction pairs of dead builders are redirected to
//!   the base, the base is demoted from abstract to concrete exactly once, and the
//!   synthesized instruction triple is reported to the enqueuer worklist.
//! - Policies the host honors while this pass is active: the selector-based inlining
//!   rule for the reflection dispatch, and the root-set additions that unblock
//!   class-inlining of the builder hierarchy.

use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::diagnostics::{EventKind, EventLog};
use crate::ir::cursor::InstructionCursor;
use crate::ir::instruction::{InstrId, Instruction};
use crate::ir::method::MethodIr;
use crate::program::facts::{EnqueuerWorklist, ReachabilityFacts};
use crate::program::pool::ClassPool;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};
use crate::shrink::references::ProtoSupportRefs;

/// Root-set additions that unblock inlining of the builder hierarchy.
///
/// Consumed by the host's inliner configuration; everything here is additive.
#[derive(Debug, Default)]
pub struct BuilderInliningHints {
    /// Always class-inline any strict subtype of these types.
    pub always_class_inline_below: Vec<TypeRef>,

    /// Always inline these methods.
    pub always_inline: Vec<MethodRef>,

    /// Allow inlining these methods without triggering their holder's initializer.
    pub bypass_clinit_for_inlining: Vec<MethodRef>,

    /// Never merge these types with their unique subtype.
    pub never_merge: Vec<TypeRef>,
}

/// The builder elimination pass and its fixpoint-shared state.
#[derive(Debug, Default)]
pub struct BuilderEliminationPass {
    /// Builder class -> the reflection method that constructs it.
    builders: DashMap<TypeRef, MethodRef>,

    /// Builder base types already demoted to concrete; add-if-absent guard.
    demoted_bases: DashSet<TypeRef>,

    /// Set when the runtime's builder bases do not have the supported shape.
    disabled: AtomicBool,
}

impl BuilderEliminationPass {
    /// Creates the pass with empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the pass has disabled itself for this compilation.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Number of registered builders.
    #[must_use]
    pub fn registered_builder_count(&self) -> usize {
        self.builders.len()
    }

    /// Validates the runtime's builder base classes before the fixpoint starts.
    ///
    /// Both base classes, when present in the program, must be abstract and carry the
    /// expected single-argument constructor. Any deviation indicates an unsupported
    /// protobuf runtime version: the whole pass self-disables with a single warning
    /// event rather than rewriting against unknown semantics.
    pub fn validate_library_shape(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        events: &EventLog,
    ) {
        let bases = [
            (
                &refs.generated_message_lite_builder_type,
                &refs.builder_constructor,
            ),
            (
                &refs.generated_message_lite_extendable_builder_type,
                &refs.extendable_builder_constructor,
            ),
        ];
        for (base, constructor) in bases {
            let valid = pool.with_class(base, |clazz| {
                clazz.is_abstract() && clazz.lookup_constructor(constructor.params()).is_some()
            });
            if valid == Some(false) && !self.disabled.swap(true, Ordering::AcqRel) {
                events
                    .record(EventKind::BuilderPassDisabled)
                    .subject(base)
                    .message("builder base has an unsupported shape");
            }
        }
    }

    /// Registers a builder observed under construction during the fixpoint.
    ///
    /// `context` must be the reflection method being traced; `register` is the host's
    /// deferral hook and is only invoked when the class/context shapes match. Returns
    /// `true` if the action was deferred.
    pub fn defer_dead_proto_builders<F>(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        builder: &TypeRef,
        context: &MethodRef,
        register: F,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        if self.is_disabled() {
            return false;
        }
        if !refs.is_dynamic_method(context) {
            return false;
        }
        let is_builder = pool
            .with_class(builder, |clazz| refs.is_generated_builder(clazz))
            .unwrap_or(false);
        if !is_builder {
            return false;
        }
        if register() {
            debug_assert!(
                self.builders
                    .get(builder)
                    .is_none_or(|existing| *existing == *context),
                "builder {builder} registered from two reflection methods"
            );
            self.builders.insert(builder.clone(), context.clone());
            return true;
        }
        false
    }

    /// Rewrites the reflection methods of all builders the liveness result found dead.
    ///
    /// Runs after the fixpoint has converged. The registry is consumed: it is cleared
    /// when this returns. Per-builder work is independent and runs on the worker pool.
    pub fn remove_dead_builder_references(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        facts: &dyn ReachabilityFacts,
        worklist: &dyn EnqueuerWorklist,
        events: &EventLog,
    ) {
        if self.is_disabled() {
            self.builders.clear();
            return;
        }
        let entries: Vec<(TypeRef, MethodRef)> = self
            .builders
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        entries.par_iter().for_each(|(builder, reflection_method)| {
            if facts.is_live_class(builder) {
                return;
            }
            self.rewrite_dead_builder(refs, pool, builder, reflection_method, worklist, events);
        });

        self.builders.clear();
    }

    fn rewrite_dead_builder(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        builder: &TypeRef,
        reflection_method: &MethodRef,
        worklist: &dyn EnqueuerWorklist,
        events: &EventLog,
    ) {
        let Some(base) = pool.super_type(builder) else {
            return;
        };
        if !refs.is_abstract_builder_type(&base) {
            return;
        }
        let base_constructor = if base == refs.generated_message_lite_builder_type {
            refs.builder_constructor.clone()
        } else {
            refs.extendable_builder_constructor.clone()
        };

        // One-time demotion of the shared base, guarded by add-if-absent: concurrent
        // discovery of two dead builders of the same base must demote once.
        if self.demoted_bases.insert(base.clone()) {
            pool.make_instantiable(&base);
        }

        let message_type = reflection_method.holder().clone();
        let default_instance = refs.default_instance_field(&message_type);

        // Take the body out of the pool, rewrite without holding any lock, put it back.
        let code = pool.with_class_mut(&message_type, |clazz| {
            clazz
                .virtual_methods
                .iter_mut()
                .find(|m| m.reference == *reflection_method)
                .and_then(|m| m.code.take())
        });
        let Some(Some(mut code)) = code else { return };

        let rewritten = rewrite_builder_construction(
            &mut code,
            builder,
            &base,
            &base_constructor,
            &default_instance,
        );
        for _ in 0..rewritten {
            worklist.trace_new_instance(&base);
            worklist.trace_invoke_direct(&base_constructor);
            worklist.trace_static_get(&default_instance);
            events
                .record(EventKind::BuilderRewritten)
                .subject(builder)
                .message(format!("now constructs {base}"));
        }

        pool.with_class_mut(&message_type, |clazz| {
            if let Some(method) = clazz
                .virtual_methods
                .iter_mut()
                .find(|m| m.reference == *reflection_method)
            {
                method.code = Some(code);
            }
        });
    }

    /// Inlining policy for invocations of the reflection dispatch method.
    ///
    /// An invocation is inlinable only when its selector argument is statically known
    /// to load one of the simple-body selector constants; every other selector value
    /// (including phis) makes the call never-inlinable. Invoke-super calls whose target
    /// holder is an abstract builder base are always inlinable, to unblock
    /// class-inlining of the builder hierarchy.
    #[must_use]
    pub fn is_invocation_inlinable(
        &self,
        refs: &ProtoSupportRefs,
        ir: &MethodIr,
        invoke: InstrId,
    ) -> bool {
        let instruction = ir.instruction(invoke);
        if let Instruction::InvokeSuper { method, .. } = instruction {
            if refs.is_abstract_builder_type(method.holder()) {
                return true;
            }
        }
        let Some(method) = instruction.invoked_method() else {
            return false;
        };
        if !refs.is_dynamic_method(method) && !refs.is_dynamic_method_bridge(method) {
            return false;
        }
        let Some(args) = instruction.invoke_args() else {
            return false;
        };
        // Receiver first, selector second, for all three dispatch shapes.
        let Some(&selector) = args.get(1) else {
            return false;
        };
        match refs.selector_constant_of_value(ir, selector) {
            Some(field) => refs.is_simple_body_selector(&field),
            None => false,
        }
    }

    /// Computes the root-set additions for builder inlining.
    #[must_use]
    pub fn builder_inlining_hints(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
    ) -> BuilderInliningHints {
        let mut hints = BuilderInliningHints {
            always_class_inline_below: vec![
                refs.generated_message_lite_builder_type.clone(),
                refs.generated_message_lite_extendable_builder_type.clone(),
            ],
            always_inline: vec![
                refs.create_builder_method.clone(),
                refs.build_partial_method.clone(),
            ],
            bypass_clinit_for_inlining: Vec::new(),
            never_merge: vec![
                refs.generated_message_lite_builder_type.clone(),
                refs.generated_message_lite_extendable_builder_type.clone(),
            ],
        };
        for message in pool.strict_subtypes_of(&refs.generated_message_lite_type) {
            let new_builder = pool.with_class(&message, |clazz| {
                clazz
                    .lookup_direct_method(|m| m.reference.name() == "newBuilder")
                    .map(|m| m.reference.clone())
            });
            if let Some(Some(method)) = new_builder {
                hints.bypass_clinit_for_inlining.push(method);
            }
        }
        hints
    }

    /// Strengthens check-casts of `NEW_MUTABLE_INSTANCE` dispatch results.
    ///
    /// A cast of `receiver.dynamicMethod(NEW_MUTABLE_INSTANCE)` to the generic message
    /// base is narrowed to the receiver's concrete message type when that type is a
    /// strict subtype of the base, restoring the precise type later inlining rounds
    /// need. Returns the number of casts narrowed.
    pub fn strengthen_check_casts(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        ir: &mut MethodIr,
        events: &EventLog,
    ) -> usize {
        let mut narrowed = 0;
        for block in 0..ir.block_count() {
            let mut position = 0;
            loop {
                let replacement = {
                    let mut cursor = if position == 0 {
                        InstructionCursor::new(ir, block)
                    } else {
                        InstructionCursor::at(ir, block, position - 1)
                    };
                    let Some(id) = cursor.find_next(|i| {
                        matches!(i, Instruction::CheckCast { ty, .. }
                            if *ty == refs.generated_message_lite_type)
                    }) else {
                        break;
                    };
                    position = cursor.ir().locate(id).map(|(_, p)| p + 1).unwrap_or(0);
                    self.narrowed_cast_target(refs, pool, cursor.ir(), id)
                };
                if let Some((id, object, dest, target)) = replacement {
                    ir.replace(
                        id,
                        Instruction::CheckCast {
                            dest,
                            object,
                            ty: target.clone(),
                        },
                    );
                    ir.set_value_type(dest, Some(target.clone()));
                    events
                        .record(EventKind::CheckCastStrengthened)
                        .subject(&target);
                    narrowed += 1;
                }
            }
        }
        narrowed
    }

    fn narrowed_cast_target(
        &self,
        refs: &ProtoSupportRefs,
        pool: &ClassPool,
        ir: &MethodIr,
        cast: InstrId,
    ) -> Option<(InstrId, crate::ir::value::ValueId, crate::ir::value::ValueId, TypeRef)> {
        let Instruction::CheckCast { dest, object, .. } = ir.instruction(cast) else {
            return None;
        };
        let root = ir.aliased_value(*object);
        if ir.is_phi(root) {
            return None;
        }
        let Some(Instruction::InvokeVirtual { method, args, .. }) = ir.definition_instr(root)
        else {
            return None;
        };
        if !refs.is_dynamic_method(method) && !refs.is_dynamic_method_bridge(method) {
            return None;
        }
        let selector = *args.get(1)?;
        if !refs.is_new_mutable_instance_selector_value(ir, selector) {
            return None;
        }
        let receiver = *args.first()?;
        let receiver_type = ir.value_type(receiver)?.clone();
        if !pool.is_strict_subtype_of(&receiver_type, &refs.generated_message_lite_type) {
            return None;
        }
        Some((cast, *object, *dest, receiver_type))
    }
}

/// Rewrites every `new builder` + constructor pair to construct the base instead.
///
/// The default-instance argument is recovered from a directly-preceding static load of
/// the message's `DEFAULT_INSTANCE` field when one exists, and synthesized fresh
/// otherwise. Returns the number of pairs rewritten.
fn rewrite_builder_construction(
    ir: &mut MethodIr,
    builder: &TypeRef,
    base: &TypeRef,
    base_constructor: &MethodRef,
    default_instance: &FieldRef,
) -> usize {
    let mut rewritten = 0;
    for block in 0..ir.block_count() {
        // Collect the construction pairs of this block first; mutation below changes
        // the instruction list.
        let mut pairs: Vec<(InstrId, InstrId, Option<crate::ir::value::ValueId>)> = Vec::new();
        {
            let instructions = ir.block_instructions(block).to_vec();
            for (index, &id) in instructions.iter().enumerate() {
                let Instruction::NewInstance { dest, ty } = ir.instruction(id) else {
                    continue;
                };
                if ty != builder {
                    continue;
                }
                let instance = *dest;
                let constructor_call = instructions[index + 1..].iter().copied().find(|&candidate| {
                    match ir.instruction(candidate) {
                        Instruction::InvokeDirect { method, args, .. } => {
                            method.is_constructor()
                                && *method.holder() == *builder
                                && args
                                    .first()
                                    .is_some_and(|&r| ir.aliased_value(r) == instance)
                        }
                        _ => false,
                    }
                });
                let Some(constructor_call) = constructor_call else {
                    continue;
                };
                // A directly-preceding load of the default instance can be reused.
                let preceding = index
                    .checked_sub(1)
                    .map(|i| instructions[i])
                    .and_then(|prev| match ir.instruction(prev) {
                        Instruction::StaticGet { dest, field } if field == default_instance => {
                            Some(*dest)
                        }
                        _ => None,
                    });
                pairs.push((id, constructor_call, preceding));
            }
        }

        for (new_instance, constructor_call, preceding) in pairs {
            let instance = match ir.instruction(new_instance) {
                Instruction::NewInstance { dest, .. } => *dest,
                _ => continue,
            };
            ir.replace(
                new_instance,
                Instruction::NewInstance {
                    dest: instance,
                    ty: base.clone(),
                },
            );
            ir.set_value_type(instance, Some(base.clone()));

            let default_value = match preceding {
                Some(value) => value,
                None => {
                    let (ctor_block, ctor_index) = ir
                        .locate(constructor_call)
                        .expect("constructor call is attached");
                    let dest = ir.new_value(Some(default_instance.holder().clone()));
                    let mut cursor = InstructionCursor::at(ir, ctor_block, ctor_index);
                    cursor.insert_before(Instruction::StaticGet {
                        dest,
                        field: default_instance.clone(),
                    });
                    dest
                }
            };
            ir.replace(
                constructor_call,
                Instruction::InvokeDirect {
                    dest: None,
                    method: base_constructor.clone(),
                    args: vec![instance, default_value],
                },
            );
            rewritten += 1;
        }
    }
    rewritten
}
