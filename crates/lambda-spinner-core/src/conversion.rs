//! Type adaptation between a value's static type and the type a call expects.
//!
//! Every forwarded value passes through [`plan_conversion`] with three types:
//!
//! | edge                         | source            | target            | functional          |
//! |------------------------------|-------------------|-------------------|---------------------|
//! | captured field → impl param  | capture type      | impl param        | capture type        |
//! | interface param → impl param | interface param   | impl param        | dynamic param       |
//! | impl result → interface ret  | impl return       | interface return  | interface return    |
//!
//! The functional type is what a reference source is first cast to; it is the
//! type the caller promised after generic substitution.

use anyhow::{bail, Result};
use lambda_classfile::{Insn, InvokeOp, MethodRef, PrimitiveOp};
use lambda_types::{JavaType, MethodType, PrimitiveKind, ValueKind, NUMBER_CLASS, OBJECT_CLASS};
use smallvec::SmallVec;

/// One adaptation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Primitive-to-primitive opcode (`i2l`, `d2f`, ...).
    Primitive(PrimitiveOp),
    /// `Wrapper.valueOf(prim)`.
    Box(PrimitiveKind),
    /// `owner.<prim>Value()`; `owner` is a wrapper class or `java/lang/Number`.
    Unbox { owner: String, kind: PrimitiveKind },
    /// `checkcast` to an internal name (or array descriptor).
    Cast(String),
}

impl Conversion {
    pub fn to_insn(&self) -> Insn {
        match self {
            Conversion::Primitive(op) => Insn::Convert(*op),
            Conversion::Box(kind) => box_insn(*kind),
            Conversion::Unbox { owner, kind } => Insn::Invoke {
                op: InvokeOp::Virtual,
                method: MethodRef::new(
                    owner.clone(),
                    format!("{}Value", kind.java_name()),
                    MethodType::new(Vec::new(), JavaType::Primitive(*kind)),
                ),
            },
            Conversion::Cast(class) => Insn::CheckCast(class.clone()),
        }
    }
}

/// `invokestatic Wrapper.valueOf(prim)LWrapper;`
pub fn box_insn(kind: PrimitiveKind) -> Insn {
    let wrapper = kind.wrapper_class();
    Insn::Invoke {
        op: InvokeOp::Static,
        method: MethodRef::new(
            wrapper,
            "valueOf",
            MethodType::new(vec![JavaType::Primitive(kind)], JavaType::class(wrapper)),
        ),
    }
}

pub type ConversionPlan = SmallVec<[Conversion; 3]>;

/// Lower a plan into instructions.
pub fn lower(plan: &ConversionPlan) -> impl Iterator<Item = Insn> + '_ {
    plan.iter().map(Conversion::to_insn)
}

/// Minimal conversion sequence taking a `source` value on the stack to `target`.
pub fn plan_conversion(
    source: &JavaType,
    target: &JavaType,
    functional: &JavaType,
) -> Result<ConversionPlan> {
    let mut plan = ConversionPlan::new();
    if source == target && source == functional {
        return Ok(plan);
    }
    if target.is_void() {
        return Ok(plan);
    }
    if source.is_void() {
        bail!("cannot produce {} from void", target.descriptor());
    }

    match (source, target) {
        (JavaType::Primitive(from), JavaType::Primitive(to)) => {
            widen(*from, *to, &mut plan)?;
        }
        (JavaType::Primitive(from), _) => match target.wrapped_primitive() {
            Some(boxed) => {
                widen(*from, boxed, &mut plan)?;
                plan.push(Conversion::Box(boxed));
            }
            None => {
                plan.push(Conversion::Box(*from));
                cast(&JavaType::class(from.wrapper_class()), target, &mut plan);
            }
        },
        _ => {
            let src = if functional.is_reference() {
                cast(source, functional, &mut plan);
                functional
            } else {
                source
            };
            match target {
                JavaType::Primitive(to) => match src.wrapped_primitive() {
                    Some(boxed) if boxed.is_signed() || boxed.is_floating() => {
                        plan.push(unbox(boxed.wrapper_class(), *to));
                    }
                    Some(boxed) => {
                        plan.push(unbox(boxed.wrapper_class(), boxed));
                        widen(boxed, *to, &mut plan)?;
                    }
                    None => {
                        let intermediate = if to.is_signed() || to.is_floating() {
                            NUMBER_CLASS
                        } else {
                            to.wrapper_class()
                        };
                        cast(src, &JavaType::class(intermediate), &mut plan);
                        plan.push(unbox(intermediate, *to));
                    }
                },
                _ => cast(src, target, &mut plan),
            }
        }
    }
    Ok(plan)
}

fn unbox(owner: &str, kind: PrimitiveKind) -> Conversion {
    Conversion::Unbox {
        owner: owner.to_string(),
        kind,
    }
}

fn widen(from: PrimitiveKind, to: PrimitiveKind, plan: &mut ConversionPlan) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if from == PrimitiveKind::Boolean || to == PrimitiveKind::Boolean {
        bail!("no conversion between {} and {}", from.java_name(), to.java_name());
    }
    // long/float/double into byte/short/char goes through int first
    let via_int = from.value_kind() != ValueKind::Int
        && to.value_kind() == ValueKind::Int
        && to != PrimitiveKind::Int;
    if via_int {
        plan.extend(PrimitiveOp::between(from, PrimitiveKind::Int).map(Conversion::Primitive));
        plan.extend(PrimitiveOp::between(PrimitiveKind::Int, to).map(Conversion::Primitive));
    } else if let Some(op) = PrimitiveOp::between(from, to) {
        plan.push(Conversion::Primitive(op));
    }
    Ok(())
}

fn cast(from: &JavaType, to: &JavaType, plan: &mut ConversionPlan) {
    if from == to {
        return;
    }
    if let JavaType::Class(name) = to {
        if name == OBJECT_CLASS {
            return;
        }
    }
    if let Some(name) = to.internal_name() {
        plan.push(Conversion::Cast(name));
    }
}
