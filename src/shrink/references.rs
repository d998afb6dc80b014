//! Well-known protobuf runtime references and shape predicates.
//!
//! Everything the passes match against lives here: the runtime library types, the
//! generated method signatures in their three historical shapes, the reflective field
//! names, and the dispatch selector constants. Centralizing the references keeps the
//! pattern matching in the passes free of string literals.

use crate::ir::instruction::{InstrId, Instruction};
use crate::ir::method::MethodIr;
use crate::ir::value::ValueId;
use crate::program::class::ProgramClass;
use crate::program::pool::ClassPool;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};

/// Descriptor prefix of the protobuf runtime package.
const PROTOBUF_PACKAGE_PREFIX: &str = "Lcom/google/protobuf/";

/// The shape of a message-info construction site.
///
/// An earlier inlining round may have flattened one level of indirection, so the
/// rewriter recognizes three equivalent shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionShape {
    /// A call to the static `newMessageInfo(defaultInstance, info, objects)` factory.
    StaticFactory,

    /// The raw-info constructor invoked on a fresh allocation.
    RawConstructor,

    /// The constructor itself was inlined into stores of the `info`/`objects` fields.
    InlinedFieldStores,
}

/// The well-known protobuf runtime references.
///
/// Constructed once per compilation and shared read-only by every pass.
#[derive(Debug)]
pub struct ProtoSupportRefs {
    /// `Internal$EnumLite`.
    pub enum_lite_type: TypeRef,
    /// `Internal$EnumLiteMap`, the enum-value-map capability interface.
    pub enum_lite_map_type: TypeRef,
    /// `Internal$EnumVerifier`.
    pub enum_verifier_type: TypeRef,
    /// `GeneratedMessageLite$ExtendableMessage`.
    pub extendable_message_type: TypeRef,
    /// `GeneratedMessageLite$ExtensionDescriptor`.
    pub extension_descriptor_type: TypeRef,
    /// `ExtensionRegistryLite`.
    pub extension_registry_lite_type: TypeRef,
    /// `GeneratedMessageLite$GeneratedExtension`, the statically-typed extension.
    pub generated_extension_type: TypeRef,
    /// `GeneratedMessageLite`, the base message type.
    pub generated_message_lite_type: TypeRef,
    /// `GeneratedMessageLite$Builder`, the shared generic builder base.
    pub generated_message_lite_builder_type: TypeRef,
    /// `GeneratedMessageLite$ExtendableBuilder`.
    pub generated_message_lite_extendable_builder_type: TypeRef,
    /// `RawMessageInfo`, the record the schema pair is wrapped in.
    pub raw_message_info_type: TypeRef,
    /// `MessageLite`.
    pub message_lite_type: TypeRef,
    /// `GeneratedMessageLite$MethodToInvoke`, the dispatch selector enum.
    pub method_to_invoke_type: TypeRef,

    /// The per-message reflection method, full 3-argument shape.
    pub dynamic_method: MethodRef,
    /// The 1-argument dispatch bridge.
    pub dynamic_method_bridge: MethodRef,
    /// The 2-argument dispatch bridge.
    pub dynamic_method_bridge_with_object: MethodRef,
    /// The static `newMessageInfo` factory.
    pub new_message_info_method: MethodRef,
    /// The `RawMessageInfo(messageLite, info, objects)` constructor.
    pub raw_message_info_constructor: MethodRef,
    /// The generic builder base constructor.
    pub builder_constructor: MethodRef,
    /// The extendable builder base constructor.
    pub extendable_builder_constructor: MethodRef,
    /// `createBuilder` on the message base.
    pub create_builder_method: MethodRef,
    /// `buildPartial` on the extendable builder base.
    pub build_partial_method: MethodRef,

    /// `RawMessageInfo.info`.
    pub raw_message_info_info_field: FieldRef,
    /// `RawMessageInfo.objects`.
    pub raw_message_info_objects_field: FieldRef,

    /// Selector constants whose `dynamicMethod` cases have trivially inlinable bodies.
    simple_body_selectors: Vec<FieldRef>,
    /// Selector constants whose cases are substantial.
    non_simple_body_selectors: Vec<FieldRef>,
    /// The `NEW_MUTABLE_INSTANCE` selector constant.
    new_mutable_instance_selector: FieldRef,
    /// The `NEW_BUILDER` selector constant.
    new_builder_selector: FieldRef,
}

impl Default for ProtoSupportRefs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtoSupportRefs {
    /// Builds the reference set.
    #[must_use]
    pub fn new() -> Self {
        let enum_lite_type = TypeRef::new("Lcom/google/protobuf/Internal$EnumLite;");
        let enum_lite_map_type = TypeRef::new("Lcom/google/protobuf/Internal$EnumLiteMap;");
        let enum_verifier_type = TypeRef::new("Lcom/google/protobuf/Internal$EnumVerifier;");
        let extendable_message_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$ExtendableMessage;");
        let extension_descriptor_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$ExtensionDescriptor;");
        let extension_registry_lite_type =
            TypeRef::new("Lcom/google/protobuf/ExtensionRegistryLite;");
        let generated_extension_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$GeneratedExtension;");
        let generated_message_lite_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite;");
        let generated_message_lite_builder_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$Builder;");
        let generated_message_lite_extendable_builder_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$ExtendableBuilder;");
        let raw_message_info_type = TypeRef::new("Lcom/google/protobuf/RawMessageInfo;");
        let message_lite_type = TypeRef::new("Lcom/google/protobuf/MessageLite;");
        let method_to_invoke_type =
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$MethodToInvoke;");

        let dynamic_method = MethodRef::new(
            generated_message_lite_type.clone(),
            "dynamicMethod",
            vec![
                method_to_invoke_type.clone(),
                TypeRef::object(),
                TypeRef::object(),
            ],
            TypeRef::object(),
        );
        let dynamic_method_bridge = MethodRef::new(
            generated_message_lite_type.clone(),
            "dynamicMethod",
            vec![method_to_invoke_type.clone()],
            TypeRef::object(),
        );
        let dynamic_method_bridge_with_object = MethodRef::new(
            generated_message_lite_type.clone(),
            "dynamicMethod",
            vec![method_to_invoke_type.clone(), TypeRef::object()],
            TypeRef::object(),
        );
        let new_message_info_method = MethodRef::new(
            generated_message_lite_type.clone(),
            "newMessageInfo",
            vec![
                message_lite_type.clone(),
                TypeRef::string(),
                TypeRef::object_array(),
            ],
            TypeRef::object(),
        );
        let raw_message_info_constructor = MethodRef::new(
            raw_message_info_type.clone(),
            "<init>",
            vec![
                message_lite_type.clone(),
                TypeRef::string(),
                TypeRef::object_array(),
            ],
            TypeRef::void(),
        );
        let builder_constructor = MethodRef::new(
            generated_message_lite_builder_type.clone(),
            "<init>",
            vec![generated_message_lite_type.clone()],
            TypeRef::void(),
        );
        let extendable_builder_constructor = MethodRef::new(
            generated_message_lite_extendable_builder_type.clone(),
            "<init>",
            vec![extendable_message_type.clone()],
            TypeRef::void(),
        );
        let create_builder_method = MethodRef::new(
            generated_message_lite_type.clone(),
            "createBuilder",
            vec![],
            generated_message_lite_builder_type.clone(),
        );
        let build_partial_method = MethodRef::new(
            generated_message_lite_extendable_builder_type.clone(),
            "buildPartial",
            vec![],
            extendable_message_type.clone(),
        );

        let raw_message_info_info_field = FieldRef::new(
            raw_message_info_type.clone(),
            "info",
            TypeRef::string(),
        );
        let raw_message_info_objects_field = FieldRef::new(
            raw_message_info_type.clone(),
            "objects",
            TypeRef::object_array(),
        );

        let selector = |name: &str| {
            FieldRef::new(
                method_to_invoke_type.clone(),
                name,
                method_to_invoke_type.clone(),
            )
        };
        let new_mutable_instance_selector = selector("NEW_MUTABLE_INSTANCE");
        let new_builder_selector = selector("NEW_BUILDER");
        let simple_body_selectors = vec![
            selector("GET_DEFAULT_INSTANCE"),
            selector("GET_MEMOIZED_IS_INITIALIZED"),
            new_builder_selector.clone(),
            new_mutable_instance_selector.clone(),
            selector("SET_MEMOIZED_IS_INITIALIZED"),
        ];
        let non_simple_body_selectors =
            vec![selector("BUILD_MESSAGE_INFO"), selector("GET_PARSER")];

        ProtoSupportRefs {
            enum_lite_type,
            enum_lite_map_type,
            enum_verifier_type,
            extendable_message_type,
            extension_descriptor_type,
            extension_registry_lite_type,
            generated_extension_type,
            generated_message_lite_type,
            generated_message_lite_builder_type,
            generated_message_lite_extendable_builder_type,
            raw_message_info_type,
            message_lite_type,
            method_to_invoke_type,
            dynamic_method,
            dynamic_method_bridge,
            dynamic_method_bridge_with_object,
            new_message_info_method,
            raw_message_info_constructor,
            builder_constructor,
            extendable_builder_constructor,
            create_builder_method,
            build_partial_method,
            raw_message_info_info_field,
            raw_message_info_objects_field,
            simple_body_selectors,
            non_simple_body_selectors,
            new_mutable_instance_selector,
            new_builder_selector,
        }
    }

    /// The `DEFAULT_INSTANCE` field of a message class.
    #[must_use]
    pub fn default_instance_field(&self, holder: &TypeRef) -> FieldRef {
        FieldRef::new(holder.clone(), "DEFAULT_INSTANCE", holder.clone())
    }

    /// The `INSTANCE` field of an enum verifier class.
    #[must_use]
    pub fn enum_verifier_instance_field(&self, holder: &TypeRef) -> FieldRef {
        FieldRef::new(holder.clone(), "INSTANCE", self.enum_verifier_type.clone())
    }

    /// The reflective `internalValueMap` field of an enum class.
    #[must_use]
    pub fn internal_value_map_field(&self, enum_type: &TypeRef) -> FieldRef {
        FieldRef::new(
            enum_type.clone(),
            "internalValueMap",
            self.enum_lite_map_type.clone(),
        )
    }

    /// The `findValueByNumber(int)` lookup signature with the given return type.
    #[must_use]
    pub fn find_value_by_number_method(&self, holder: &TypeRef, returns: TypeRef) -> MethodRef {
        MethodRef::new(holder.clone(), "findValueByNumber", vec![TypeRef::int()], returns)
    }

    /// Returns `true` for the full 3-argument reflection method, on any holder.
    #[must_use]
    pub fn is_dynamic_method(&self, method: &MethodRef) -> bool {
        method.matches_signature(&self.dynamic_method)
    }

    /// Returns `true` for either dispatch bridge on the message base.
    #[must_use]
    pub fn is_dynamic_method_bridge(&self, method: &MethodRef) -> bool {
        *method == self.dynamic_method_bridge || *method == self.dynamic_method_bridge_with_object
    }

    /// Returns `true` for the two abstract builder base types.
    #[must_use]
    pub fn is_abstract_builder_type(&self, ty: &TypeRef) -> bool {
        *ty == self.generated_message_lite_builder_type
            || *ty == self.generated_message_lite_extendable_builder_type
    }

    /// Returns `true` for per-message builder classes: direct subclasses of a builder
    /// base that are not themselves the base.
    #[must_use]
    pub fn is_generated_builder(&self, clazz: &ProgramClass) -> bool {
        clazz
            .super_type
            .as_ref()
            .is_some_and(|super_type| self.is_abstract_builder_type(super_type))
            && !self.is_abstract_builder_type(&clazz.ty)
    }

    /// Returns `true` for an extension-registry dispatch method.
    ///
    /// Matches the exact `(MessageLite, int) -> GeneratedExtension` signature under the
    /// canonical name or a numbered legacy variant (`findLiteExtensionByNumber1`, ...)
    /// emitted when the dispatch table was split, on any holder except the registry
    /// base itself.
    #[must_use]
    pub fn is_find_lite_extension_by_number(&self, method: &MethodRef) -> bool {
        if *method.holder() == self.extension_registry_lite_type {
            return false;
        }
        if method.params() != [self.message_lite_type.clone(), TypeRef::int()]
            || *method.return_type() != self.generated_extension_type
        {
            return false;
        }
        let name = method.name();
        match name.strip_prefix("findLiteExtensionByNumber") {
            Some("") => true,
            Some(suffix) => suffix.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }

    /// Returns `true` for classes belonging to the protobuf runtime package.
    #[must_use]
    pub fn is_proto_library_class(&self, ty: &TypeRef) -> bool {
        ty.has_descriptor_prefix(PROTOBUF_PACKAGE_PREFIX)
    }

    /// Classifies an instruction as a message-info construction site.
    ///
    /// Recognizes the static factory call, the raw-info constructor on a fresh
    /// allocation, and (classified per store) the inlined constructor's field stores.
    #[must_use]
    pub fn classify_message_info_construction(
        &self,
        ir: &MethodIr,
        id: InstrId,
    ) -> Option<ConstructionShape> {
        match ir.instruction(id) {
            Instruction::InvokeStatic { method, .. }
                if method.matches_signature(&self.new_message_info_method) =>
            {
                Some(ConstructionShape::StaticFactory)
            }
            Instruction::InvokeDirect { method, args, .. }
                if *method == self.raw_message_info_constructor =>
            {
                let receiver = ir.aliased_value(*args.first()?);
                match ir.definition_instr(receiver) {
                    Some(Instruction::NewInstance { ty, .. })
                        if *ty == self.raw_message_info_type =>
                    {
                        Some(ConstructionShape::RawConstructor)
                    }
                    _ => None,
                }
            }
            Instruction::InstancePut { field, .. }
                if *field == self.raw_message_info_info_field
                    || *field == self.raw_message_info_objects_field =>
            {
                Some(ConstructionShape::InlinedFieldStores)
            }
            _ => None,
        }
    }

    /// Returns `true` for selector constants whose dispatch cases have simple bodies.
    #[must_use]
    pub fn is_simple_body_selector(&self, field: &FieldRef) -> bool {
        self.simple_body_selectors.contains(field)
    }

    /// Returns `true` for selector constants whose dispatch cases are substantial.
    #[must_use]
    pub fn is_non_simple_body_selector(&self, field: &FieldRef) -> bool {
        self.non_simple_body_selectors.contains(field)
    }

    /// The `NEW_BUILDER` selector constant.
    #[must_use]
    pub fn new_builder_selector(&self) -> &FieldRef {
        &self.new_builder_selector
    }

    /// Returns `true` if the value is a load of the `NEW_MUTABLE_INSTANCE` selector.
    #[must_use]
    pub fn is_new_mutable_instance_selector_value(&self, ir: &MethodIr, value: ValueId) -> bool {
        self.selector_constant_of_value(ir, value)
            .is_some_and(|field| field == self.new_mutable_instance_selector)
    }

    /// Resolves a value to the selector constant it loads, if it is such a load.
    #[must_use]
    pub fn selector_constant_of_value(&self, ir: &MethodIr, value: ValueId) -> Option<FieldRef> {
        let root = ir.aliased_value(value);
        if ir.is_phi(root) {
            return None;
        }
        match ir.definition_instr(root) {
            Some(Instruction::StaticGet { field, .. })
                if *field.holder() == self.method_to_invoke_type =>
            {
                Some(field.clone())
            }
            _ => None,
        }
    }

    /// Returns `true` if any message class in the pool uses proto support at all.
    ///
    /// Cheap gate the coordinator uses to skip the passes for programs without
    /// generated messages.
    #[must_use]
    pub fn program_contains_messages(&self, pool: &ClassPool) -> bool {
        pool.contains(&self.generated_message_lite_type)
            || !pool
                .strict_subtypes_of(&self.generated_message_lite_type)
                .is_empty()
    }
}
