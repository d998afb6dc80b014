//! Dead generated-extension analysis and its debug diagnostic.
//!
//! A generated extension field whose only read sits inside the extension registry's
//! dispatch method is unreachable in practice: the dispatch method is the registry's
//! lookup table, and nothing else ever touches the field. Such fields are recorded in
//! the removed-field set; the host's member-value-propagation rewrites their reads to a
//! null constant, which lets the tree-shaker drop the backing declarations.
//!
//! The debug diagnostic reports the *surviving* registry reads - extension fields that
//! were not recognized as dead - filtered against a user-supplied allow-list so known
//! keepers don't drown the signal.

use std::collections::HashSet;
use std::path::Path;

use crate::diagnostics::{EventKind, EventLog};
use crate::ir::instruction::Instruction;
use crate::program::facts::ReachabilityFacts;
use crate::program::pool::ClassPool;
use crate::program::pruning::PrunedItems;
use crate::program::refs::FieldRef;
use crate::shrink::references::ProtoSupportRefs;
use crate::Result;

/// Analysis over generated extension fields.
pub struct DeadExtensionAnalysis<'a> {
    refs: &'a ProtoSupportRefs,
    pool: &'a ClassPool,
    facts: &'a dyn ReachabilityFacts,
}

impl<'a> DeadExtensionAnalysis<'a> {
    /// Creates the analysis over the given collaborators.
    #[must_use]
    pub fn new(
        refs: &'a ProtoSupportRefs,
        pool: &'a ClassPool,
        facts: &'a dyn ReachabilityFacts,
    ) -> Self {
        DeadExtensionAnalysis { refs, pool, facts }
    }

    /// Returns `true` if the extension field is provably dead.
    ///
    /// The field must be of the generated-extension type, be declared on a strict
    /// descendant of the message base, and have exactly one unique read context that is
    /// a registry dispatch method.
    #[must_use]
    pub fn is_dead_proto_extension_field(&self, field: &FieldRef) -> bool {
        if *field.field_type() != self.refs.generated_extension_type {
            return false;
        }
        if !self
            .pool
            .is_strict_subtype_of(field.holder(), &self.refs.generated_message_lite_type)
        {
            return false;
        }
        match self.facts.unique_read_context(field) {
            Some(context) => self.refs.is_find_lite_extension_by_number(&context),
            None => false,
        }
    }

    /// Sweeps the pool for dead extension fields and records them.
    ///
    /// Returns the number of fields recorded. Safe to call from one thread while other
    /// passes run; the analysis only reads facts fixed by the completed fixpoint.
    pub fn record_dead_extension_fields(&self, pruned: &PrunedItems, events: &EventLog) -> usize {
        let mut recorded = 0;
        for ty in self.pool.all_types() {
            let candidates: Vec<FieldRef> = self
                .pool
                .with_class(&ty, |clazz| {
                    clazz
                        .static_fields
                        .iter()
                        .map(|f| f.reference.clone())
                        .collect()
                })
                .unwrap_or_default();
            for field in candidates {
                if self.is_dead_proto_extension_field(&field) {
                    events
                        .record(EventKind::ExtensionFieldRemoved)
                        .subject(&field);
                    pruned.record_removed_field(field);
                    recorded += 1;
                }
            }
        }
        recorded
    }

    /// Debug diagnostic: reports surviving extension reads in dispatch methods.
    ///
    /// Scans every registry dispatch method body for reads of generated-extension
    /// fields that were not recorded as removed and are not covered by the allow-list.
    /// One event is recorded per surviving field read.
    pub fn report_surviving_registry_reads(
        &self,
        pruned: &PrunedItems,
        allow_list: &HashSet<String>,
        events: &EventLog,
    ) {
        for ty in self.pool.all_types() {
            self.pool.with_class(&ty, |clazz| {
                for method in clazz.direct_methods.iter().chain(&clazz.virtual_methods) {
                    if !self.refs.is_find_lite_extension_by_number(&method.reference) {
                        continue;
                    }
                    let Some(code) = &method.code else { continue };
                    for block in 0..code.block_count() {
                        for &id in code.block_instructions(block) {
                            let Instruction::StaticGet { field, .. } = code.instruction(id)
                            else {
                                continue;
                            };
                            if *field.field_type() != self.refs.generated_extension_type {
                                continue;
                            }
                            if pruned.is_removed_field(field) {
                                continue;
                            }
                            if allow_list.contains(&field.qualified_java_name()) {
                                continue;
                            }
                            events
                                .record(EventKind::SurvivingExtensionRead)
                                .subject(field)
                                .message(format!("read from {}", method.reference));
                        }
                    }
                }
            });
        }
    }
}

/// Reads the diagnostic allow-list: one `package.Class.fieldName` per line.
///
/// Blank lines and surrounding whitespace are ignored.
///
/// # Errors
///
/// I/O failures are fatal and propagate to the caller; the file was explicitly
/// requested by the user.
pub fn read_allow_list(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::class::{ClassAccessFlags, FieldAccessFlags, FieldDef, ProgramClass};
    use crate::program::refs::{MethodRef, TypeRef};

    struct SingleReadFacts {
        field: FieldRef,
        context: MethodRef,
        extra_read: bool,
    }

    impl ReachabilityFacts for SingleReadFacts {
        fn is_field_read(&self, field: &FieldRef) -> bool {
            *field == self.field
        }
        fn is_field_written(&self, _field: &FieldRef) -> bool {
            true
        }
        fn is_static_field_written_only_in_enclosing_static_initializer(
            &self,
            _field: &FieldRef,
        ) -> bool {
            true
        }
        fn unique_read_context(&self, field: &FieldRef) -> Option<MethodRef> {
            if *field == self.field && !self.extra_read {
                Some(self.context.clone())
            } else {
                None
            }
        }
        fn is_live_class(&self, _ty: &TypeRef) -> bool {
            true
        }
    }

    fn extension_setup(refs: &ProtoSupportRefs) -> (ClassPool, FieldRef, MethodRef) {
        let pool = ClassPool::new();
        pool.insert(ProgramClass::new(
            refs.generated_message_lite_type.clone(),
            Some(TypeRef::object()),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        ));

        let holder = TypeRef::new("Lcom/example/MyProto;");
        let mut holder_class = ProgramClass::new(
            holder.clone(),
            Some(refs.generated_message_lite_type.clone()),
            ClassAccessFlags::PUBLIC,
        );
        let field = FieldRef::new(
            holder.clone(),
            "someExtension",
            refs.generated_extension_type.clone(),
        );
        holder_class
            .static_fields
            .push(FieldDef::new(field.clone(), FieldAccessFlags::STATIC));
        pool.insert(holder_class);

        let registry = TypeRef::new("Lcom/example/MyRegistry;");
        let dispatch = MethodRef::new(
            registry,
            "findLiteExtensionByNumber",
            vec![refs.message_lite_type.clone(), TypeRef::int()],
            refs.generated_extension_type.clone(),
        );
        (pool, field, dispatch)
    }

    #[test]
    fn test_registry_only_read_is_dead() {
        let refs = ProtoSupportRefs::new();
        let (pool, field, dispatch) = extension_setup(&refs);
        let facts = SingleReadFacts {
            field: field.clone(),
            context: dispatch,
            extra_read: false,
        };
        let analysis = DeadExtensionAnalysis::new(&refs, &pool, &facts);
        assert!(analysis.is_dead_proto_extension_field(&field));

        let pruned = PrunedItems::new();
        let events = EventLog::new();
        assert_eq!(analysis.record_dead_extension_fields(&pruned, &events), 1);
        assert!(pruned.is_removed_field(&field));
        assert_eq!(events.count(EventKind::ExtensionFieldRemoved), 1);
    }

    #[test]
    fn test_second_read_context_keeps_field() {
        let refs = ProtoSupportRefs::new();
        let (pool, field, dispatch) = extension_setup(&refs);
        let facts = SingleReadFacts {
            field: field.clone(),
            context: dispatch,
            extra_read: true,
        };
        let analysis = DeadExtensionAnalysis::new(&refs, &pool, &facts);
        assert!(!analysis.is_dead_proto_extension_field(&field));
    }

    #[test]
    fn test_non_registry_context_keeps_field() {
        let refs = ProtoSupportRefs::new();
        let (pool, field, _dispatch) = extension_setup(&refs);
        let other = MethodRef::new(
            TypeRef::new("Lcom/example/App;"),
            "main",
            vec![],
            TypeRef::void(),
        );
        let facts = SingleReadFacts {
            field: field.clone(),
            context: other,
            extra_read: false,
        };
        let analysis = DeadExtensionAnalysis::new(&refs, &pool, &facts);
        assert!(!analysis.is_dead_proto_extension_field(&field));
    }

    #[test]
    fn test_holder_outside_message_hierarchy_keeps_field() {
        let refs = ProtoSupportRefs::new();
        let (pool, _field, dispatch) = extension_setup(&refs);
        let outside = FieldRef::new(
            TypeRef::new("Lcom/example/Unrelated;"),
            "someExtension",
            refs.generated_extension_type.clone(),
        );
        let facts = SingleReadFacts {
            field: outside.clone(),
            context: dispatch,
            extra_read: false,
        };
        let analysis = DeadExtensionAnalysis::new(&refs, &pool, &facts);
        assert!(!analysis.is_dead_proto_extension_field(&outside));
    }

    #[test]
    fn test_allow_list_parsing() {
        use std::io::Write;

        let dir = std::env::temp_dir();
        let path = dir.join("protoshrink_allowlist_test.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "  com.example.Outer.keepMe  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "com.example.Other.alsoKeep").unwrap();
        drop(file);

        let entries = read_allow_list(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains("com.example.Outer.keepMe"));
        assert!(entries.contains("com.example.Other.alsoKeep"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_allow_list_io_failure_is_fatal() {
        let missing = Path::new("/nonexistent/protoshrink/allowlist.txt");
        assert!(matches!(
            read_allow_list(missing),
            Err(crate::Error::FileError(_))
        ));
    }
}
