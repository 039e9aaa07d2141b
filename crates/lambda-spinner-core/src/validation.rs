//! Shape checks on the creation call, run before anything is emitted.
//!
//! A site that passes these checks has a conversion path for every value the
//! generated code moves, so emission failures after this point are internal.

use lambda_types::{CallSiteSpec, InvocationKind, JavaType, MethodType};

use crate::conversion::plan_conversion;
use crate::emitter::Dispatch;
use crate::error::LambdaConversionError;

/// Most argument slots a method descriptor may use, receiver included.
pub const MAX_PARAMETER_SLOTS: u32 = 255;

pub fn validate(site: &CallSiteSpec) -> Result<(), LambdaConversionError> {
    let interface_method = format!(
        "{}.{}",
        site.interface.binary_name(),
        site.interface_method_name
    );
    let violation = |reason: String, types: &[&MethodType]| {
        LambdaConversionError::contract(
            interface_method.clone(),
            reason,
            types.iter().map(|t| t.descriptor()).collect(),
        )
    };

    if site.interface_method_name.is_empty() || site.interface_method_name.starts_with('<') {
        return Err(violation(
            format!("invalid interface method name {:?}", site.interface_method_name),
            &[],
        ));
    }
    if site.factory_type.ret != site.interface.as_type() {
        return Err(violation(
            format!(
                "factory type must return {}, not {}",
                site.interface.binary_name(),
                site.factory_type.ret.binary_name()
            ),
            &[&site.factory_type],
        ));
    }
    if site.serializable
        && !site.interface.serializable
        && !site.alt_interfaces.iter().any(|i| i.serializable)
    {
        return Err(violation(
            "serializable lambda must implement a serializable interface".into(),
            &[],
        ));
    }

    let impl_type = site.implementation.handle_type();
    let captured = site.capture_arity();
    let sam_arity = site.interface_method_type.parameter_count();
    if impl_type.parameter_count() != captured + sam_arity {
        return Err(violation(
            format!(
                "incorrect number of parameters for {} method {}; {} captured parameters, {} functional interface method parameters, {} implementation parameters",
                site.implementation.kind,
                site.implementation,
                captured,
                sam_arity,
                impl_type.parameter_count()
            ),
            &[&site.interface_method_type, &impl_type],
        ));
    }
    if site.dynamic_method_type.parameter_count() != sam_arity {
        return Err(violation(
            format!(
                "dynamic method type has {} parameters, interface method has {}",
                site.dynamic_method_type.parameter_count(),
                sam_arity
            ),
            &[&site.dynamic_method_type, &site.interface_method_type],
        ));
    }
    for alt in &site.alt_methods {
        if alt.parameter_count() != sam_arity {
            return Err(violation(
                "bridge method type has a different arity".into(),
                &[alt, &site.interface_method_type],
            ));
        }
    }

    check_slot_limits(site).map_err(|(reason, ty)| violation(reason, &[&ty]))?;

    for (i, capture) in site.captured_types().iter().enumerate() {
        check_edge(capture, &impl_type.params[i], capture).map_err(|reason| {
            violation(
                format!("captured argument {}: {}", i, reason),
                &[&site.factory_type, &impl_type],
            )
        })?;
    }

    for sam in std::iter::once(&site.interface_method_type).chain(&site.alt_methods) {
        for i in 0..sam_arity {
            check_edge(
                &sam.params[i],
                &impl_type.params[captured + i],
                &site.dynamic_method_type.params[i],
            )
            .map_err(|reason| {
                violation(
                    format!("parameter {}: {}", i, reason),
                    &[sam, &site.dynamic_method_type, &impl_type],
                )
            })?;
        }
        if impl_type.ret.is_void() && !sam.ret.is_void() {
            return Err(violation(
                format!(
                    "void implementation cannot return {}",
                    sam.ret.binary_name()
                ),
                &[sam, &impl_type],
            ));
        }
        check_edge(&impl_type.ret, &sam.ret, &sam.ret).map_err(|reason| {
            violation(format!("return type: {}", reason), &[sam, &impl_type])
        })?;
    }
    Ok(())
}

fn slots(ty: &MethodType) -> u32 {
    ty.params.iter().map(|p| u32::from(p.slot_size())).sum()
}

/// Every descriptor the generated class declares or invokes must fit the
/// 255-slot argument limit.
fn check_slot_limits(site: &CallSiteSpec) -> Result<(), (String, MethodType)> {
    let over = |what: &str, used: u32, ty: &MethodType| {
        if used > MAX_PARAMETER_SLOTS {
            Err((
                format!(
                    "{} needs {} argument slots, limit is {}",
                    what, used, MAX_PARAMETER_SLOTS
                ),
                ty.clone(),
            ))
        } else {
            Ok(())
        }
    };

    over("factory type", slots(&site.factory_type), &site.factory_type)?;
    // constructor storing the captures, plus its receiver
    over("constructor", slots(&site.factory_type) + 1, &site.factory_type)?;
    for sam in std::iter::once(&site.interface_method_type).chain(&site.alt_methods) {
        over("interface method", slots(sam) + 1, sam)?;
    }

    let dispatch = Dispatch::resolve(site);
    let impl_type = site.implementation.handle_type();
    let receiver = match site.implementation.kind {
        InvocationKind::NewInvokeSpecial => 1,
        _ => 0,
    };
    let handle = if dispatch.indirect { 1 } else { 0 };
    over(
        "implementation call",
        slots(&impl_type) + receiver + handle,
        &impl_type,
    )
}

fn check_edge(source: &JavaType, target: &JavaType, functional: &JavaType) -> Result<(), String> {
    plan_conversion(source, target, functional)
        .map(|_| ())
        .map_err(|e| format!("{} is not adaptable to {}: {}", source.binary_name(), target.binary_name(), e))
}
