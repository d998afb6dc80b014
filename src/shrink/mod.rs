//! The shrinker passes and their coordinator.
//!
//! - [`references`] - Well-known protobuf runtime references and shape predicates
//! - [`enum_maps`] - Dead enum-value-map analysis
//! - [`extensions`] - Dead generated-extension analysis and its debug diagnostic
//! - [`rewriter`] - The per-method schema rewrite
//! - [`builders`] - Builder elimination, inlining policy and root-set hints
//!
//! [`ProtoShrinker`] owns the shared state (options, reference set, pruning records,
//! builder registry, event log) and exposes the entry points the host compiler invokes:
//! once after the first reachability fixpoint, and again method by method during
//! general IR optimization of each reflection method.

pub mod builders;
pub mod enum_maps;
pub mod extensions;
pub mod references;
pub mod rewriter;

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::diagnostics::{EventKind, EventLog};
use crate::ir::method::MethodIr;
use crate::program::facts::{EnqueuerWorklist, ReachabilityFacts};
use crate::program::pool::ClassPool;
use crate::program::pruning::{DeadTypeCandidateSet, PrunedItems};
use crate::program::refs::{FieldRef, MethodRef, TypeRef};
use crate::shrink::builders::{BuilderEliminationPass, BuilderInliningHints};
use crate::shrink::enum_maps::DeadEnumMapAnalysis;
use crate::shrink::extensions::{read_allow_list, DeadExtensionAnalysis};
use crate::shrink::references::ProtoSupportRefs;
use crate::shrink::rewriter::SchemaRewriter;
use crate::Result;

/// Configuration of the shrinker passes.
///
/// Mirrors the host compiler's optimization switches. The enum-map analysis is a
/// guaranteed no-op unless both enum unboxing and general shrinking are on, since it
/// produces no benefit without those companion optimizations.
#[derive(Debug, Clone)]
pub struct ShrinkerOptions {
    /// General shrinking (tree-shaking) is enabled in the host.
    pub enable_shrinking: bool,

    /// Enum unboxing is enabled in the host.
    pub enable_enum_unboxing: bool,

    /// Emit the debug diagnostics (surviving extension reads).
    pub debug_diagnostics: bool,

    /// Allow-list file for the extension diagnostic, one `package.Class.fieldName`
    /// per line.
    pub extension_allow_list: Option<PathBuf>,
}

impl Default for ShrinkerOptions {
    fn default() -> Self {
        ShrinkerOptions {
            enable_shrinking: true,
            enable_enum_unboxing: true,
            debug_diagnostics: false,
            extension_allow_list: None,
        }
    }
}

impl ShrinkerOptions {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether general shrinking is enabled.
    #[must_use]
    pub fn with_shrinking(mut self, enabled: bool) -> Self {
        self.enable_shrinking = enabled;
        self
    }

    /// Sets whether enum unboxing is enabled.
    #[must_use]
    pub fn with_enum_unboxing(mut self, enabled: bool) -> Self {
        self.enable_enum_unboxing = enabled;
        self
    }

    /// Enables the debug diagnostics.
    #[must_use]
    pub fn with_debug_diagnostics(mut self, enabled: bool) -> Self {
        self.debug_diagnostics = enabled;
        self
    }

    /// Sets the extension diagnostic allow-list file.
    #[must_use]
    pub fn with_extension_allow_list(mut self, path: PathBuf) -> Self {
        self.extension_allow_list = Some(path);
        self
    }
}

/// Coordinator of the protobuf shrinker passes.
///
/// Created once per compilation, shared by reference across worker threads. All
/// mutable state lives in thread-safe accumulators; the per-method entry points are
/// embarrassingly parallel.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use protoshrink::program::pool::ClassPool;
/// use protoshrink::shrink::{ProtoShrinker, ShrinkerOptions};
///
/// let pool = Arc::new(ClassPool::new());
/// let shrinker = ProtoShrinker::new(Arc::clone(&pool), ShrinkerOptions::default());
/// assert!(shrinker.events().is_empty());
/// ```
pub struct ProtoShrinker {
    options: ShrinkerOptions,
    refs: ProtoSupportRefs,
    pool: Arc<ClassPool>,
    pruned: PrunedItems,
    dead_type_candidates: DeadTypeCandidateSet,
    builder_pass: BuilderEliminationPass,
    events: EventLog,
}

impl ProtoShrinker {
    /// Creates the coordinator over a class pool.
    #[must_use]
    pub fn new(pool: Arc<ClassPool>, options: ShrinkerOptions) -> Self {
        ProtoShrinker {
            options,
            refs: ProtoSupportRefs::new(),
            pool,
            pruned: PrunedItems::new(),
            dead_type_candidates: DeadTypeCandidateSet::new(),
            builder_pass: BuilderEliminationPass::new(),
            events: EventLog::new(),
        }
    }

    /// The configuration this coordinator runs under.
    #[must_use]
    pub fn options(&self) -> &ShrinkerOptions {
        &self.options
    }

    /// The well-known reference set.
    #[must_use]
    pub fn references(&self) -> &ProtoSupportRefs {
        &self.refs
    }

    /// The shared class pool.
    #[must_use]
    pub fn pool(&self) -> &ClassPool {
        &self.pool
    }

    /// The removed-item records consumed by the tree-shaker.
    #[must_use]
    pub fn pruned_items(&self) -> &PrunedItems {
        &self.pruned
    }

    /// The dead-type candidates pending tree-shaker confirmation.
    #[must_use]
    pub fn dead_type_candidates(&self) -> &DeadTypeCandidateSet {
        &self.dead_type_candidates
    }

    /// The builder elimination pass state.
    #[must_use]
    pub fn builder_pass(&self) -> &BuilderEliminationPass {
        &self.builder_pass
    }

    /// The event log.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Rewrites the schema construction inside one reflection method.
    ///
    /// Per-method and lock-free; may run concurrently for different methods.
    pub fn rewrite(
        &self,
        facts: &dyn ReachabilityFacts,
        method: &MethodRef,
        ir: &mut MethodIr,
    ) -> bool {
        SchemaRewriter::new(&self.refs, facts, &self.events).rewrite(method, ir)
    }

    /// Rewrites the reflection methods of every message class in the pool.
    ///
    /// Convenience driver for hosts that keep method bodies in the pool: each message
    /// class's `dynamicMethod` body is taken out, rewritten, and put back, one method
    /// per worker.
    pub fn rewrite_reflection_methods(&self, facts: &dyn ReachabilityFacts) {
        let messages: Vec<TypeRef> = self
            .pool
            .strict_subtypes_of(&self.refs.generated_message_lite_type);
        messages.par_iter().for_each(|message| {
            let taken: Option<(MethodRef, MethodIr)> =
                self.pool
                    .with_class_mut(message, |clazz| {
                        clazz.virtual_methods.iter_mut().find_map(|m| {
                            if self.refs.is_dynamic_method(&m.reference) {
                                m.code.take().map(|code| (m.reference.clone(), code))
                            } else {
                                None
                            }
                        })
                    })
                    .flatten();
            let Some((reference, mut code)) = taken else {
                return;
            };
            self.rewrite(facts, &reference, &mut code);
            self.pool.with_class_mut(message, |clazz| {
                if let Some(method) = clazz
                    .virtual_methods
                    .iter_mut()
                    .find(|m| m.reference == reference)
                {
                    method.code = Some(code);
                }
            });
        });
    }

    /// Returns `true` if the class is a provably dead enum-value-map.
    ///
    /// Pure query; a guaranteed no-op (`false`) unless both enum unboxing and
    /// shrinking are enabled.
    #[must_use]
    pub fn is_dead_enum_lite_map(
        &self,
        facts: &dyn ReachabilityFacts,
        map_type: &TypeRef,
    ) -> bool {
        if !self.enum_map_analysis_enabled() {
            return false;
        }
        DeadEnumMapAnalysis::new(&self.refs, &self.pool, facts)
            .dead_map_owner(map_type)
            .is_some()
    }

    /// Sweeps the pool for dead enum-value-maps, clears their virtual methods and
    /// records the dead type candidates.
    ///
    /// Returns the number of map classes cleared.
    pub fn clear_dead_enum_lite_maps(&self, facts: &dyn ReachabilityFacts) -> usize {
        if !self.enum_map_analysis_enabled() {
            return 0;
        }
        let analysis = DeadEnumMapAnalysis::new(&self.refs, &self.pool, facts);
        let mut cleared = 0;
        for ty in self.pool.all_types() {
            if analysis.dead_map_owner(&ty).is_none() {
                continue;
            }
            self.pool.clear_virtual_methods(&ty);
            self.dead_type_candidates.insert(ty.clone());
            self.pruned.record_removed_type(ty.clone());
            self.events.record(EventKind::EnumMapRemoved).subject(&ty);
            cleared += 1;
        }
        cleared
    }

    fn enum_map_analysis_enabled(&self) -> bool {
        self.options.enable_enum_unboxing && self.options.enable_shrinking
    }

    /// Returns `true` if the extension field is provably dead.
    #[must_use]
    pub fn is_dead_proto_extension_field(
        &self,
        facts: &dyn ReachabilityFacts,
        field: &FieldRef,
    ) -> bool {
        DeadExtensionAnalysis::new(&self.refs, &self.pool, facts)
            .is_dead_proto_extension_field(field)
    }

    /// Sweeps the pool for dead extension fields and records them for removal.
    ///
    /// Returns the number of fields recorded. The companion member-value-propagation
    /// pass in the host rewrites reads of recorded fields to a null constant.
    pub fn remove_dead_extension_fields(&self, facts: &dyn ReachabilityFacts) -> usize {
        DeadExtensionAnalysis::new(&self.refs, &self.pool, facts)
            .record_dead_extension_fields(&self.pruned, &self.events)
    }

    /// Registers a builder observed under construction during the fixpoint.
    ///
    /// See [`BuilderEliminationPass::defer_dead_proto_builders`].
    pub fn defer_dead_proto_builders<F>(
        &self,
        builder: &TypeRef,
        context: &MethodRef,
        register: F,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.builder_pass
            .defer_dead_proto_builders(&self.refs, &self.pool, builder, context, register)
    }

    /// Validates the builder library shape; must run before the fixpoint starts.
    pub fn validate_builder_library_shape(&self) {
        self.builder_pass
            .validate_library_shape(&self.refs, &self.pool, &self.events);
    }

    /// Rewrites construction sites of dead builders; must run after the fixpoint.
    pub fn remove_dead_builder_references(
        &self,
        facts: &dyn ReachabilityFacts,
        worklist: &dyn EnqueuerWorklist,
    ) {
        self.builder_pass.remove_dead_builder_references(
            &self.refs,
            &self.pool,
            facts,
            worklist,
            &self.events,
        );
    }

    /// Computes the root-set additions for builder inlining.
    #[must_use]
    pub fn builder_inlining_hints(&self) -> BuilderInliningHints {
        self.builder_pass.builder_inlining_hints(&self.refs, &self.pool)
    }

    /// Inlining policy for one invocation inside a method being optimized.
    ///
    /// See [`BuilderEliminationPass::is_invocation_inlinable`].
    #[must_use]
    pub fn is_invocation_inlinable(
        &self,
        ir: &MethodIr,
        invoke: crate::ir::instruction::InstrId,
    ) -> bool {
        self.builder_pass.is_invocation_inlinable(&self.refs, ir, invoke)
    }

    /// Strengthens check-casts of dispatch results inside one method.
    ///
    /// See [`BuilderEliminationPass::strengthen_check_casts`]. Returns the number of
    /// casts narrowed.
    pub fn strengthen_check_casts(&self, ir: &mut MethodIr) -> usize {
        self.builder_pass
            .strengthen_check_casts(&self.refs, &self.pool, ir, &self.events)
    }

    /// Freezes the dead-type candidate set once all passes have joined.
    pub fn freeze_dead_type_candidates(&self) {
        self.dead_type_candidates.freeze();
    }

    /// Verifies that no dead-type candidate survived into the final liveness result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsoundOptimization`](crate::Error::UnsoundOptimization) for
    /// the first surviving candidate; this is fatal for the compilation.
    pub fn verify_dead_candidates_absent(&self, facts: &dyn ReachabilityFacts) -> Result<()> {
        self.dead_type_candidates.verify_absent(facts)
    }

    /// Runs the debug diagnostic for surviving extension reads.
    ///
    /// Reads the allow-list once, synchronously, then scans the registry dispatch
    /// methods. A no-op unless [`ShrinkerOptions::debug_diagnostics`] is set.
    ///
    /// # Errors
    ///
    /// Fails if the allow-list file was configured but cannot be read.
    pub fn report_surviving_extension_reads(&self, facts: &dyn ReachabilityFacts) -> Result<()> {
        if !self.options.debug_diagnostics {
            return Ok(());
        }
        let allow_list = match &self.options.extension_allow_list {
            Some(path) => read_allow_list(path)?,
            None => Default::default(),
        };
        DeadExtensionAnalysis::new(&self.refs, &self.pool, facts)
            .report_surviving_registry_reads(&self.pruned, &allow_list, &self.events);
        Ok(())
    }
}
