//! Recognition of mixin annotations on parsed classes.

use protocol::descriptor::{decode_signature, type_argument_of, unbox_primitive};
use protocol::{
    bare_class_name, class_token, AnnotationNode, AnnotationReference, AtKind, AtTarget, ClassTree,
    DescriptorError, GenKind, InjectionKind, MemberTree, MethodSignature, MixinDeclaration,
    MixinReferences,
};
use tracing::{debug, warn};

pub const MIXIN: &str = "Lorg/spongepowered/asm/mixin/Mixin;";
pub const ACCESSOR: &str = "Lorg/spongepowered/asm/mixin/gen/Accessor;";
pub const INVOKER: &str = "Lorg/spongepowered/asm/mixin/gen/Invoker;";
pub const INJECT: &str = "Lorg/spongepowered/asm/mixin/injection/Inject;";
pub const REDIRECT: &str = "Lorg/spongepowered/asm/mixin/injection/Redirect;";
pub const MODIFY_ARGS: &str = "Lorg/spongepowered/asm/mixin/injection/ModifyArgs;";

pub const CALLBACK_INFO: &str = "Lorg/spongepowered/asm/mixin/injection/callback/CallbackInfo;";
pub const CALLBACK_INFO_RETURNABLE: &str =
    "Lorg/spongepowered/asm/mixin/injection/callback/CallbackInfoReturnable;";

/// Descriptor used for injection kinds that do not disambiguate overloads
pub const PLACEHOLDER_DESCRIPTOR: &str = "()V";

const GEN_ANNOTATIONS: [(&str, GenKind); 2] =
    [(ACCESSOR, GenKind::Accessor), (INVOKER, GenKind::Invoker)];

const INJECTION_ANNOTATIONS: [(&str, InjectionKind); 3] = [
    (INJECT, InjectionKind::Inject),
    (REDIRECT, InjectionKind::Redirect),
    (MODIFY_ARGS, InjectionKind::ModifyArgs),
];

/// Short annotation name of a reference, used for per-kind counts
pub fn annotation_label(reference: &AnnotationReference) -> &'static str {
    match reference {
        AnnotationReference::GenAccess { kind: GenKind::Accessor, .. } => "@Accessor",
        AnnotationReference::GenAccess { kind: GenKind::Invoker, .. } => "@Invoker",
        AnnotationReference::Injection { kind: InjectionKind::Inject, .. } => "@Inject",
        AnnotationReference::Injection { kind: InjectionKind::Redirect, .. } => "@Redirect",
        AnnotationReference::Injection { kind: InjectionKind::ModifyArgs, .. } => "@ModifyArgs",
    }
}

pub fn is_mixin(class: &ClassTree) -> bool {
    class.annotation(MIXIN).is_some()
}

/// The mixin declaration of a class: class literal targets first, then string targets
pub fn mixin_declaration(class: &ClassTree) -> Option<MixinDeclaration> {
    let annotation = class.annotation(MIXIN)?;

    let literals = annotation
        .get_list("value")
        .into_iter()
        .filter_map(|value| value.as_class())
        .map(class_token);
    let named = annotation
        .get_list("targets")
        .into_iter()
        .filter_map(|value| value.as_str())
        .map(|target| class_token(&target.replace('.', "/")));

    Some(MixinDeclaration {
        name: class.name.clone(),
        targets: literals.chain(named).collect(),
    })
}

/// Extract every remappable reference declared on a mixin class.
///
/// Returns `Ok(None)` for classes that are not mixins or that declare no target.
pub fn extract(class: &ClassTree) -> Result<Option<MixinReferences>, DescriptorError> {
    let Some(mixin) = mixin_declaration(class) else {
        return Ok(None);
    };

    if mixin.targets.is_empty() {
        warn!("Mixin {} declares no targets, skipping", mixin.name);
        return Ok(None);
    }

    let mut references = Vec::new();
    for method in &class.methods {
        for (desc, kind) in GEN_ANNOTATIONS {
            if let Some(annotation) = method.annotation(desc) {
                if remapped(annotation) {
                    references.push(gen_reference(kind, method, annotation));
                }
            }
        }

        for (desc, kind) in INJECTION_ANNOTATIONS {
            if let Some(annotation) = method.annotation(desc) {
                if remapped(annotation) {
                    references.push(injection_reference(kind, method, annotation)?);
                }
            }
        }
    }

    debug!("Mixin {} declares {} references", mixin.name, references.len());
    Ok(Some(MixinReferences { mixin, references }))
}

fn remapped(annotation: &AnnotationNode) -> bool {
    annotation.get_bool("remap").unwrap_or(true)
}

fn gen_reference(
    kind: GenKind,
    method: &MemberTree,
    annotation: &AnnotationNode,
) -> AnnotationReference {
    let name = annotation
        .get_str("value")
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| infer_target_name(kind, &method.name));

    AnnotationReference::GenAccess {
        kind,
        member: method.name.clone(),
        name,
    }
}

/// Member name implied by an accessor or invoker method without an explicit value,
/// e.g. `getHealth` targets `health` and `callTick` targets `tick`
pub fn infer_target_name(kind: GenKind, method: &str) -> String {
    let prefixes: &[&str] = match kind {
        GenKind::Accessor => &["get", "is", "set"],
        GenKind::Invoker => &["call", "invoke"],
    };

    for prefix in prefixes {
        if let Some(rest) = method.strip_prefix(prefix) {
            let mut chars = rest.chars();
            if let Some(first) = chars.next().filter(|c| c.is_uppercase()) {
                return first.to_lowercase().chain(chars).collect();
            }
        }
    }

    method.to_string()
}

fn injection_reference(
    kind: InjectionKind,
    method: &MemberTree,
    annotation: &AnnotationNode,
) -> Result<AnnotationReference, DescriptorError> {
    let methods = annotation
        .get_list("method")
        .into_iter()
        .filter_map(|value| value.as_str())
        .map(str::to_string)
        .collect();

    let mut declared = annotation.get_list("at");
    if kind.single_at() {
        declared.truncate(1);
    }

    let mut ats = Vec::new();
    for at in declared.into_iter().filter_map(|value| value.as_annotation()) {
        let value = at.get_str("value").unwrap_or_default();
        match value.parse::<AtKind>() {
            Ok(kind) => ats.push(AtTarget {
                kind,
                target: at.get_str("target").unwrap_or_default().to_string(),
            }),
            Err(value) => warn!("@At(value = \"{}\") not supported", value),
        }
    }

    let descriptor = if kind.generates_descriptor() {
        handler_descriptor(method)?
    } else {
        Some(PLACEHOLDER_DESCRIPTOR.to_string())
    };

    Ok(AnnotationReference::Injection {
        kind,
        member: method.name.clone(),
        methods,
        ats,
        descriptor,
    })
}

/// Descriptor of the injected-into method, derived from an `@Inject` handler.
///
/// Parameters from the callback parameter onward are dropped. A returnable
/// callback contributes its (unboxed) type argument as the return type, which
/// needs the handler's generic signature; without one `None` is returned.
pub fn handler_descriptor(method: &MemberTree) -> Result<Option<String>, DescriptorError> {
    let handler = decode_signature(&method.descriptor)?;

    let callback = handler
        .params
        .iter()
        .position(|param| param == CALLBACK_INFO || param == CALLBACK_INFO_RETURNABLE);
    let params = handler.params[..callback.unwrap_or(handler.params.len())].to_vec();

    let returnable =
        callback.is_some_and(|index| handler.params[index] == CALLBACK_INFO_RETURNABLE);
    let return_type = if returnable {
        let returnable_name = bare_class_name(CALLBACK_INFO_RETURNABLE);
        let argument = method
            .signature
            .as_deref()
            .and_then(|signature| type_argument_of(signature, returnable_name));

        match argument {
            Some(argument) => unbox_primitive(&argument).to_string(),
            None => {
                debug!("Handler {} has no generic signature, matching by name only", method.name);
                return Ok(None);
            }
        }
    } else {
        handler.return_type
    };

    Ok(Some(MethodSignature { params, return_type }.to_descriptor()))
}
