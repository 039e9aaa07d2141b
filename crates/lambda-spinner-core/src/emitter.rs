//! Proxy class emission.
//!
//! Layout of a synthesized unit:
//!
//! ```text
//! final synthetic class <name> implements I, Alt...
//!   private final T1 arg$1; ...                  one per captured value
//!   private static final I LAMBDA_INSTANCE$      only lazy, non-capturing
//!   private <init>(T1, ...)                      stores the captures
//!   static <clinit>                              only lazy, non-capturing
//!   public R m(P...)                             primary + one per bridge
//!   private final Object writeReplace()          serializable sites
//!   private final void writeObject/readObject    accidentally serializable
//! ```

use anyhow::{anyhow, Context, Result};
use lambda_classfile::model::{
    ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ACC_SYNTHETIC,
};
use lambda_classfile::{
    encode_class, ClassModel, FieldModel, FieldRef, Insn, InvokeOp, LoadableConstant,
    MethodModel, MethodRef,
};
use lambda_types::{
    package_of, CallSiteSpec, InvocationKind, JavaType, MemberAccess, MethodType, OBJECT_CLASS,
    STRING_CLASS,
};
use tracing::trace;

use crate::conversion::{box_insn, lower, plan_conversion};
use crate::error::LambdaConversionError;

pub const LAMBDA_INSTANCE_FIELD: &str = "LAMBDA_INSTANCE$";
pub const METHOD_HANDLE_CLASS: &str = "java/lang/invoke/MethodHandle";
pub const SERIALIZED_LAMBDA_CLASS: &str = "java/lang/invoke/SerializedLambda";
pub const NOT_SERIALIZABLE_EXCEPTION: &str = "java/io/NotSerializableException";
pub const NON_SERIALIZABLE_MESSAGE: &str = "Non-serializable lambda";

/// Descriptor of the `SerializedLambda` constructor.
pub const SERIALIZED_LAMBDA_CTOR: &str = "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;ILjava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;[Ljava/lang/Object;)V";

/// How the generated forwarding methods reach the implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Invocation kind after private-`special` normalization.
    pub kind: InvocationKind,
    /// Call through the class-data method handle instead of a direct invoke.
    pub indirect: bool,
}

impl Dispatch {
    pub fn resolve(site: &CallSiteSpec) -> Self {
        let implementation = &site.implementation;
        let caller = site.caller.internal_name();
        let kind = match implementation.kind {
            InvocationKind::Special
                if implementation.access == MemberAccess::Private
                    && implementation.declaring_class == caller =>
            {
                if implementation.declaring_is_interface {
                    InvocationKind::Interface
                } else {
                    InvocationKind::Virtual
                }
            }
            kind => kind,
        };
        let cross_package_protected = implementation.access == MemberAccess::Protected
            && package_of(&implementation.declaring_class) != site.caller.package();
        Self {
            kind,
            indirect: cross_package_protected || kind == InvocationKind::Special,
        }
    }
}

/// A spun class: its model, its bytes, and how it dispatches.
#[derive(Debug, Clone)]
pub struct EmittedUnit {
    pub name: String,
    pub model: ClassModel,
    pub bytes: Vec<u8>,
    pub dispatch: Dispatch,
}

/// Build and encode the proxy class for a validated site.
pub fn emit_unit(
    site: &CallSiteSpec,
    name: &str,
    disable_eager_initialization: bool,
) -> Result<EmittedUnit, LambdaConversionError> {
    let dispatch = Dispatch::resolve(site);
    let builder = ProxyClassBuilder {
        site,
        name,
        dispatch,
        lazy_singleton: site.capture_arity() == 0 && disable_eager_initialization,
    };
    let model = builder
        .build()
        .map_err(|e| LambdaConversionError::internal(name, format!("{:#}", e)))?;
    let bytes =
        encode_class(&model).map_err(|e| LambdaConversionError::internal(name, format!("{:#}", e)))?;
    trace!(
        unit = %name,
        bytes = bytes.len(),
        methods = model.methods.len(),
        indirect = dispatch.indirect,
        "emitted proxy class"
    );
    Ok(EmittedUnit {
        name: name.to_string(),
        model,
        bytes,
        dispatch,
    })
}

fn capture_field_name(index: usize) -> String {
    format!("arg${}", index + 1)
}

struct ProxyClassBuilder<'a> {
    site: &'a CallSiteSpec,
    name: &'a str,
    dispatch: Dispatch,
    lazy_singleton: bool,
}

impl ProxyClassBuilder<'_> {
    fn build(&self) -> Result<ClassModel> {
        let site = self.site;
        let mut class = ClassModel::new(ACC_SUPER | ACC_FINAL | ACC_SYNTHETIC, self.name);

        for iface in std::iter::once(&site.interface).chain(&site.alt_interfaces) {
            if !class.interfaces.contains(&iface.name) {
                class.interfaces.push(iface.name.clone());
            }
        }

        for (i, ty) in site.captured_types().iter().enumerate() {
            class.fields.push(FieldModel::new(
                ACC_PRIVATE | ACC_FINAL,
                capture_field_name(i),
                ty.clone(),
            ));
        }

        class.methods.push(self.constructor());

        if self.lazy_singleton {
            class.fields.push(FieldModel::new(
                ACC_PRIVATE | ACC_STATIC | ACC_FINAL,
                LAMBDA_INSTANCE_FIELD,
                site.interface.as_type(),
            ));
            class.methods.push(self.class_initializer());
        }

        for method_type in std::iter::once(&site.interface_method_type).chain(&site.alt_methods) {
            let body = self
                .forwarding_body(method_type)
                .with_context(|| format!("forwarding {}{}", site.interface_method_name, method_type))?;
            class.methods.push(MethodModel::new(
                ACC_PUBLIC,
                site.interface_method_name.clone(),
                method_type.clone(),
                body,
            ));
        }

        if site.serializable {
            class.methods.push(self.write_replace());
        } else if site.is_accidentally_serializable() {
            class.methods.push(hostile_method(
                "writeObject",
                "(Ljava/io/ObjectOutputStream;)V",
            )?);
            class.methods.push(hostile_method(
                "readObject",
                "(Ljava/io/ObjectInputStream;)V",
            )?);
        }
        Ok(class)
    }

    fn capture_ref(&self, index: usize) -> FieldRef {
        FieldRef::new(
            self.name,
            capture_field_name(index),
            self.site.captured_types()[index].clone(),
        )
    }

    fn constructor(&self) -> MethodModel {
        let mut code = vec![
            Insn::aload(0),
            Insn::Invoke {
                op: InvokeOp::Special,
                method: MethodRef::new(OBJECT_CLASS, "<init>", MethodType::void()),
            },
        ];
        let mut slot = 1;
        for (i, ty) in self.site.captured_types().iter().enumerate() {
            code.push(Insn::aload(0));
            if let Some(kind) = ty.value_kind() {
                code.push(Insn::Load { kind, slot });
            }
            code.push(Insn::PutField(self.capture_ref(i)));
            slot += ty.slot_size();
        }
        code.push(Insn::Return(None));
        MethodModel::new(
            ACC_PRIVATE,
            "<init>",
            self.site.factory_type.with_return(JavaType::Void),
            code,
        )
    }

    fn class_initializer(&self) -> MethodModel {
        let code = vec![
            Insn::New(self.name.to_string()),
            Insn::Dup,
            Insn::Invoke {
                op: InvokeOp::Special,
                method: MethodRef::new(self.name, "<init>", MethodType::void()),
            },
            Insn::PutStatic(FieldRef::new(
                self.name,
                LAMBDA_INSTANCE_FIELD,
                self.site.interface.as_type(),
            )),
            Insn::Return(None),
        ];
        MethodModel::new(ACC_STATIC, "<clinit>", MethodType::void(), code)
    }

    fn forwarding_body(&self, method_type: &MethodType) -> Result<Vec<Insn>> {
        let site = self.site;
        let implementation = &site.implementation;
        let impl_type = implementation.handle_type();
        let captured = site.capture_arity();
        let mut code = Vec::new();

        if self.dispatch.indirect {
            code.push(Insn::Ldc(LoadableConstant::ClassData {
                name: "_".to_string(),
                ty: JavaType::class(METHOD_HANDLE_CLASS),
            }));
        } else if self.dispatch.kind == InvocationKind::NewInvokeSpecial {
            code.push(Insn::New(implementation.declaring_class.clone()));
            code.push(Insn::Dup);
        }

        for (i, ty) in site.captured_types().iter().enumerate() {
            code.push(Insn::aload(0));
            code.push(Insn::GetField(self.capture_ref(i)));
            let target = impl_param(&impl_type, i)?;
            let plan = plan_conversion(ty, target, ty)
                .with_context(|| format!("captured value {}", i))?;
            code.extend(lower(&plan));
        }

        let mut slot = 1;
        for (i, ty) in method_type.params.iter().enumerate() {
            let kind = ty
                .value_kind()
                .ok_or_else(|| anyhow!("void parameter {}", i))?;
            code.push(Insn::Load { kind, slot });
            slot += ty.slot_size();
            let functional = site
                .dynamic_method_type
                .param(i)
                .ok_or_else(|| anyhow!("dynamic method type has no parameter {}", i))?;
            let plan = plan_conversion(ty, impl_param(&impl_type, captured + i)?, functional)
                .with_context(|| format!("parameter {}", i))?;
            code.extend(lower(&plan));
        }

        code.push(if self.dispatch.indirect {
            Insn::Invoke {
                op: InvokeOp::Virtual,
                method: MethodRef::new(METHOD_HANDLE_CLASS, "invokeExact", impl_type.clone()),
            }
        } else {
            Insn::Invoke {
                op: invoke_op(self.dispatch.kind),
                method: MethodRef {
                    owner: implementation.declaring_class.clone(),
                    name: implementation.name.clone(),
                    ty: implementation.method_type.clone(),
                    is_interface: implementation.declaring_is_interface,
                },
            }
        });

        let plan = plan_conversion(&impl_type.ret, &method_type.ret, &method_type.ret)
            .context("return value")?;
        code.extend(lower(&plan));
        code.push(Insn::Return(method_type.ret.value_kind()));
        Ok(code)
    }

    fn write_replace(&self) -> MethodModel {
        let site = self.site;
        let implementation = &site.implementation;
        let string = |s: &str| Insn::Ldc(LoadableConstant::String(s.to_string()));

        let mut code = vec![
            Insn::New(SERIALIZED_LAMBDA_CLASS.to_string()),
            Insn::Dup,
            Insn::Ldc(LoadableConstant::Class(site.caller.internal_name())),
            string(&site.interface.name),
            string(&site.interface_method_name),
            string(&site.interface_method_type.descriptor()),
            Insn::PushInt(i32::from(implementation.kind.reference_kind())),
            string(&implementation.declaring_class),
            string(&implementation.name),
            string(&implementation.method_type.descriptor()),
            string(&site.dynamic_method_type.descriptor()),
            Insn::PushInt(site.capture_arity() as i32),
            Insn::ANewArray(OBJECT_CLASS.to_string()),
        ];
        for (i, ty) in site.captured_types().iter().enumerate() {
            code.push(Insn::Dup);
            code.push(Insn::PushInt(i as i32));
            code.push(Insn::aload(0));
            code.push(Insn::GetField(self.capture_ref(i)));
            if let Some(kind) = ty.primitive() {
                code.push(box_insn(kind));
            }
            code.push(Insn::AAStore);
        }
        code.push(Insn::Invoke {
            op: InvokeOp::Special,
            method: MethodRef::new(
                SERIALIZED_LAMBDA_CLASS,
                "<init>",
                serialized_lambda_ctor_type(),
            ),
        });
        code.push(Insn::Return(Some(lambda_types::ValueKind::Reference)));

        MethodModel::new(
            ACC_PRIVATE | ACC_FINAL,
            "writeReplace",
            MethodType::new(Vec::new(), JavaType::object()),
            code,
        )
    }
}

fn impl_param(impl_type: &MethodType, index: usize) -> Result<&JavaType> {
    impl_type
        .param(index)
        .ok_or_else(|| anyhow!("implementation has no parameter {}", index))
}

fn invoke_op(kind: InvocationKind) -> InvokeOp {
    match kind {
        InvocationKind::Static => InvokeOp::Static,
        InvocationKind::Virtual => InvokeOp::Virtual,
        InvocationKind::Interface => InvokeOp::Interface,
        InvocationKind::Special | InvocationKind::NewInvokeSpecial => InvokeOp::Special,
    }
}

fn serialized_lambda_ctor_type() -> MethodType {
    let string = JavaType::class(STRING_CLASS);
    MethodType::new(
        vec![
            JavaType::class("java/lang/Class"),
            string.clone(),
            string.clone(),
            string.clone(),
            JavaType::INT,
            string.clone(),
            string.clone(),
            string.clone(),
            string,
            JavaType::array_of(JavaType::object()),
        ],
        JavaType::Void,
    )
}

fn hostile_method(name: &str, descriptor: &str) -> Result<MethodModel> {
    let code = vec![
        Insn::New(NOT_SERIALIZABLE_EXCEPTION.to_string()),
        Insn::Dup,
        Insn::Ldc(LoadableConstant::String(NON_SERIALIZABLE_MESSAGE.to_string())),
        Insn::Invoke {
            op: InvokeOp::Special,
            method: MethodRef::new(
                NOT_SERIALIZABLE_EXCEPTION,
                "<init>",
                MethodType::new(vec![JavaType::class(STRING_CLASS)], JavaType::Void),
            ),
        },
        Insn::AThrow,
    ];
    Ok(MethodModel::new(
        ACC_PRIVATE | ACC_FINAL,
        name,
        MethodType::parse_descriptor(descriptor)?,
        code,
    )
    .with_exception(NOT_SERIALIZABLE_EXCEPTION))
}
