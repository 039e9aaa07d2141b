//! Interpreter for the straight-line instruction subset of proxy classes.

use lambda_classfile::{
    FieldRef, Insn, InvokeOp, LoadableConstant, MethodModel, MethodRef, PrimitiveOp,
};
use lambda_spinner_core::emitter::METHOD_HANDLE_CLASS;
use lambda_types::{PrimitiveKind, ValueKind};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

use crate::runtime::Runtime;
use crate::trap::{Trap, ARRAY_INDEX_OUT_OF_BOUNDS, CLASS_CAST_EXCEPTION, NEGATIVE_ARRAY_SIZE};
use crate::unit::HiddenUnit;
use crate::value::{Instance, Object, Value};

/// Run `method` of `unit`. `args` holds the receiver (for instance methods)
/// followed by the parameters, one entry per value.
pub(crate) fn execute(
    runtime: &Runtime,
    unit: &Arc<HiddenUnit>,
    method: &MethodModel,
    args: Vec<Value>,
) -> Result<Option<Value>, Trap> {
    let code = method
        .code
        .as_ref()
        .ok_or_else(|| Trap::internal(format!("{}.{} has no code", unit.name(), method.name)))?;
    trace!(unit = %unit.name(), method = %method.name, "interpreting");

    let mut frame = Frame {
        runtime,
        unit,
        locals: lay_out_locals(method, args)?,
        stack: Vec::with_capacity(usize::from(method.max_stack())),
    };
    for insn in code {
        if let Some(result) = frame.step(insn)? {
            return Ok(result);
        }
    }
    Err(Trap::internal(format!(
        "{}.{} fell off the end of its code",
        unit.name(),
        method.name
    )))
}

/// Place arguments in their local slots; wide values take two slots.
fn lay_out_locals(method: &MethodModel, args: Vec<Value>) -> Result<Vec<Option<Value>>, Trap> {
    let expected = usize::from(!method.is_static()) + method.ty.parameter_count();
    if args.len() != expected {
        return Err(Trap::internal(format!(
            "{}{} takes {} arguments, got {}",
            method.name,
            method.ty,
            expected,
            args.len()
        )));
    }
    let mut locals = vec![None; usize::from(method.max_locals())];
    let mut slot = 0;
    let mut args = args.into_iter();
    if !method.is_static() {
        locals[0] = args.next();
        slot = 1;
    }
    for (ty, value) in method.ty.params.iter().zip(args) {
        locals[slot] = Some(value);
        slot += usize::from(ty.slot_size());
    }
    Ok(locals)
}

struct Frame<'a> {
    runtime: &'a Runtime,
    unit: &'a Arc<HiddenUnit>,
    locals: Vec<Option<Value>>,
    stack: Vec<Value>,
}

impl Frame<'_> {
    fn pop(&mut self) -> Result<Value, Trap> {
        self.stack
            .pop()
            .ok_or_else(|| Trap::internal("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Trap> {
        if self.stack.len() < n {
            return Err(Trap::internal("operand stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_int(&mut self) -> Result<i32, Trap> {
        let value = self.pop()?;
        value
            .as_int()
            .ok_or_else(|| Trap::internal(format!("expected int, found {}", value)))
    }

    /// Whether `class` names the unit being executed. Its code refers to
    /// itself by the requested name, not the suffixed defined one.
    fn is_self(&self, class: &str) -> bool {
        class == self.unit.model().name
    }

    /// Execute one instruction; `Some` on return.
    fn step(&mut self, insn: &Insn) -> Result<Option<Option<Value>>, Trap> {
        match insn {
            Insn::Load { kind, slot } => {
                let value = self
                    .locals
                    .get(usize::from(*slot))
                    .cloned()
                    .flatten()
                    .ok_or_else(|| Trap::internal(format!("local {} is unset", slot)))?;
                check_kind(&value, *kind)?;
                self.stack.push(value);
            }
            Insn::New(class) => {
                let value = if self.is_self(class) {
                    self.unit.allocate()
                } else {
                    self.runtime.allocate(class)
                };
                self.stack.push(value);
            }
            Insn::Dup => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| Trap::internal("dup on empty stack"))?;
                self.stack.push(top);
            }
            Insn::CheckCast(class) => {
                let top = self
                    .stack
                    .last()
                    .ok_or_else(|| Trap::internal("checkcast on empty stack"))?;
                if let Value::Ref(obj) = top {
                    if !self.runtime.is_instance(obj, class) {
                        return Err(Trap::throw(
                            CLASS_CAST_EXCEPTION,
                            format!(
                                "class {} cannot be cast to class {}",
                                obj.class_name().replace('/', "."),
                                class.replace('/', ".")
                            ),
                        ));
                    }
                }
            }
            Insn::ANewArray(component) => {
                let count = self.pop_int()?;
                let len = usize::try_from(count)
                    .map_err(|_| Trap::throw(NEGATIVE_ARRAY_SIZE, count.to_string()))?;
                self.stack.push(Value::Ref(Arc::new(Object::Array {
                    component: component.clone(),
                    elements: RwLock::new(vec![Value::Null; len]),
                })));
            }
            Insn::AAStore => {
                let value = self.pop()?;
                let index = self.pop_int()?;
                let array = self.pop()?;
                store_element(&array, index, value)?;
            }
            Insn::AThrow => {
                return match self.pop()? {
                    Value::Ref(obj) => Err(Trap::Thrown(obj)),
                    _ => Err(Trap::null_pointer("Cannot throw exception because value is null")),
                };
            }
            Insn::GetField(field) => {
                let receiver = self.pop()?;
                let value = instance_of(&receiver, field)?
                    .field(&field.name)
                    .unwrap_or_else(|| Value::zero(&field.ty));
                self.stack.push(value);
            }
            Insn::PutField(field) => {
                let value = self.pop()?;
                let receiver = self.pop()?;
                instance_of(&receiver, field)?.set_field(field.name.clone(), value);
            }
            Insn::GetStatic(field) => {
                self.require_own_static(field)?;
                let value = self.unit.static_field(&field.name, &field.ty);
                self.stack.push(value);
            }
            Insn::PutStatic(field) => {
                self.require_own_static(field)?;
                let value = self.pop()?;
                self.unit.set_static_field(&field.name, value);
            }
            Insn::Invoke { op, method } => {
                let receiver = usize::from(*op != InvokeOp::Static);
                let args = self.pop_n(receiver + method.ty.parameter_count())?;
                let result = self.invoke(*op, method, args)?;
                if let Some(value) = result {
                    self.stack.push(value);
                }
            }
            Insn::Ldc(constant) => {
                let value = match constant {
                    LoadableConstant::Int(v) => Value::Int(*v),
                    LoadableConstant::String(s) => Value::string(s.clone()),
                    LoadableConstant::Class(name) => Value::Ref(Arc::new(Object::Class(name.clone()))),
                    LoadableConstant::ClassData { .. } => {
                        let target = self.unit.class_data().ok_or_else(|| {
                            Trap::internal(format!("{} was defined without class data", self.unit.name()))
                        })?;
                        Value::Ref(Arc::new(Object::MethodHandle(target.clone())))
                    }
                };
                self.stack.push(value);
            }
            Insn::PushInt(v) => self.stack.push(Value::Int(*v)),
            Insn::Convert(op) => {
                let value = self.pop()?;
                check_kind(&value, op.source_kind())?;
                let converted = value
                    .cast_primitive(conversion_target(*op))
                    .ok_or_else(|| Trap::internal(format!("{} on {}", op.mnemonic(), value)))?;
                self.stack.push(converted);
            }
            Insn::Return(kind) => {
                return match kind {
                    None => Ok(Some(None)),
                    Some(kind) => {
                        let value = self.pop()?;
                        check_kind(&value, *kind)?;
                        Ok(Some(Some(value)))
                    }
                };
            }
        }
        Ok(None)
    }

    fn require_own_static(&self, field: &FieldRef) -> Result<(), Trap> {
        if self.is_self(&field.owner) {
            Ok(())
        } else {
            Err(Trap::internal(format!(
                "static field {}.{} is not accessible",
                field.owner, field.name
            )))
        }
    }

    fn invoke(
        &self,
        op: InvokeOp,
        method: &MethodRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        if method.owner == METHOD_HANDLE_CLASS
            && method.name == "invokeExact"
        {
            let mut args = args.into_iter();
            let handle = match args.next() {
                Some(Value::Ref(obj)) => obj,
                _ => return Err(Trap::null_pointer("invokeExact on null handle")),
            };
            let target = match handle.as_ref() {
                Object::MethodHandle(target) => target,
                other => return Err(Trap::internal(format!("invokeExact on {}", other))),
            };
            if target.handle_type() != method.ty {
                return Err(Trap::throw(
                    "java/lang/invoke/WrongMethodTypeException",
                    format!("expected {} but found {}", target.handle_type(), method.ty),
                ));
            }
            return self.runtime.invoke_handle(target, args.collect());
        }

        match op {
            InvokeOp::Static | InvokeOp::Special if self.is_self(&method.owner) => {
                let target = self
                    .unit
                    .model()
                    .method_with_type(&method.name, &method.ty)
                    .ok_or_else(|| Trap::internal(format!("no method {}{}", method.name, method.ty)))?;
                execute(self.runtime, self.unit, target, args)
            }
            InvokeOp::Static | InvokeOp::Special => {
                self.runtime
                    .dispatch_exact(&method.owner, &method.name, &method.ty, &args)
            }
            InvokeOp::Virtual | InvokeOp::Interface => {
                self.runtime
                    .dispatch_virtual(&method.owner, &method.name, &method.ty, args)
            }
        }
    }
}

fn check_kind(value: &Value, kind: ValueKind) -> Result<(), Trap> {
    let ok = match kind {
        ValueKind::Int => matches!(value, Value::Int(_)),
        ValueKind::Long => matches!(value, Value::Long(_)),
        ValueKind::Float => matches!(value, Value::Float(_)),
        ValueKind::Double => matches!(value, Value::Double(_)),
        ValueKind::Reference => matches!(value, Value::Ref(_) | Value::Null),
    };
    if ok {
        Ok(())
    } else {
        Err(Trap::internal(format!("expected {:?}, found {}", kind, value)))
    }
}

fn conversion_target(op: PrimitiveOp) -> PrimitiveKind {
    match op {
        PrimitiveOp::I2B => PrimitiveKind::Byte,
        PrimitiveOp::I2C => PrimitiveKind::Char,
        PrimitiveOp::I2S => PrimitiveKind::Short,
        _ => match op.target_kind() {
            ValueKind::Long => PrimitiveKind::Long,
            ValueKind::Float => PrimitiveKind::Float,
            ValueKind::Double => PrimitiveKind::Double,
            ValueKind::Int | ValueKind::Reference => PrimitiveKind::Int,
        },
    }
}

fn instance_of<'v>(receiver: &'v Value, field: &FieldRef) -> Result<&'v Instance, Trap> {
    match receiver {
        Value::Ref(obj) => obj.as_instance().ok_or_else(|| {
            Trap::internal(format!("field {} on non-instance {}", field.name, obj))
        }),
        Value::Null => Err(Trap::null_pointer(format!(
            "Cannot access field \"{}\" because value is null",
            field.name
        ))),
        other => Err(Trap::internal(format!("field {} on {}", field.name, other))),
    }
}

fn store_element(array: &Value, index: i32, value: Value) -> Result<(), Trap> {
    let obj = match array {
        Value::Ref(obj) => obj,
        Value::Null => return Err(Trap::null_pointer("Cannot store to object array because it is null")),
        other => return Err(Trap::internal(format!("aastore into {}", other))),
    };
    let Object::Array { elements, .. } = obj.as_ref() else {
        return Err(Trap::internal(format!("aastore into {}", obj)));
    };
    let mut elements = elements.write();
    let len = elements.len();
    let slot = usize::try_from(index)
        .ok()
        .and_then(|i| elements.get_mut(i))
        .ok_or_else(|| {
            Trap::throw(
                ARRAY_INDEX_OUT_OF_BOUNDS,
                format!("Index {} out of bounds for length {}", index, len),
            )
        })?;
    *slot = value;
    Ok(())
}
