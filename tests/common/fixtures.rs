//! Call sites used across tests.
//!
//! Implementation methods named here are registered by
//! [`super::setup::acme_runtime`].

use std::path::PathBuf;

use lambda_spinner::types::{
    CallSiteSpec, CallerClass, FunctionalInterface, ImplMethod, InvocationKind, JavaType,
    MemberAccess, MethodType,
};

/// Request files for CLI tests, relative to the project root.
pub const FIXTURE_DIR: &str = "tests/fixtures";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(FIXTURE_DIR)
        .join(name)
}

pub fn mt(descriptor: &str) -> MethodType {
    MethodType::parse_descriptor(descriptor).expect("valid method descriptor")
}

fn main_caller() -> CallerClass {
    CallerClass::new("com.acme.Main")
}

/// `IntFunction<String> f = String::valueOf;`
pub fn int_function_value_of() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/IntFunction"),
        "apply",
        mt("(I)Ljava/lang/Object;"),
        vec![],
        ImplMethod::new(
            "java/lang/String",
            "valueOf",
            mt("(I)Ljava/lang/String;"),
            InvocationKind::Static,
        ),
    )
    .with_dynamic_method_type(mt("(I)Ljava/lang/String;"))
}

/// `int base = ...; IntSupplier s = () -> base + 10;`
pub fn capturing_int_supplier() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/IntSupplier"),
        "getAsInt",
        mt("()I"),
        vec![JavaType::INT],
        ImplMethod::new("com/acme/Main", "lambda$main$0", mt("(I)I"), InvocationKind::Static)
            .with_access(MemberAccess::Private),
    )
}

/// A serializable `Supplier` capturing an int.
pub fn serializable_supplier() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::serializable("com/acme/SerializableSupplier"),
        "get",
        mt("()Ljava/lang/Object;"),
        vec![JavaType::INT],
        ImplMethod::new("com/acme/Main", "lambda$main$0", mt("(I)I"), InvocationKind::Static)
            .with_access(MemberAccess::Private),
    )
    .with_dynamic_method_type(mt("()Ljava/lang/Integer;"))
    .with_serializable(true)
}

/// A lambda whose interface is serializable although the site did not ask
/// for serialization.
pub fn accidentally_serializable() -> CallSiteSpec {
    serializable_supplier().with_serializable(false)
}

/// `Runnable r = Main::tick;`, non-capturing with a void implementation.
pub fn runnable_tick() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/lang/Runnable"),
        "run",
        MethodType::void(),
        vec![],
        ImplMethod::new("com/acme/Main", "tick", MethodType::void(), InvocationKind::Static),
    )
}

/// `Function<Integer, Long> f = Main::twice;` with `static long twice(long)`.
pub fn integer_to_long_function() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/Function"),
        "apply",
        mt("(Ljava/lang/Object;)Ljava/lang/Object;"),
        vec![],
        ImplMethod::new("com/acme/Main", "twice", mt("(J)J"), InvocationKind::Static),
    )
    .with_dynamic_method_type(mt("(Ljava/lang/Integer;)Ljava/lang/Long;"))
}

/// `IntToLongFunction f = Main::twice;`
pub fn int_to_long_function() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/IntToLongFunction"),
        "applyAsLong",
        mt("(I)J"),
        vec![],
        ImplMethod::new("com/acme/Main", "twice", mt("(J)J"), InvocationKind::Static),
    )
}

/// `LongToIntFunction f = l -> Main.echoByte((byte) l);` with `static int echoByte(byte)`.
pub fn long_to_byte_function() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/LongToIntFunction"),
        "applyAsInt",
        mt("(J)I"),
        vec![],
        ImplMethod::new("com/acme/Main", "echoByte", mt("(B)I"), InvocationKind::Static),
    )
}

/// `IntFunction<String> f = Main::label;` with `static String label(Integer)`.
pub fn int_to_boxed_function() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/IntFunction"),
        "apply",
        mt("(I)Ljava/lang/Object;"),
        vec![],
        ImplMethod::new(
            "com/acme/Main",
            "label",
            mt("(Ljava/lang/Integer;)Ljava/lang/String;"),
            InvocationKind::Static,
        ),
    )
    .with_dynamic_method_type(mt("(I)Ljava/lang/String;"))
}

/// `Function<String, String> f = String::valueOf;` resolved to
/// `valueOf(Object)`: reference to reference only.
pub fn string_identity_function() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/Function"),
        "apply",
        mt("(Ljava/lang/Object;)Ljava/lang/Object;"),
        vec![],
        ImplMethod::new(
            "java/lang/String",
            "valueOf",
            mt("(Ljava/lang/Object;)Ljava/lang/String;"),
            InvocationKind::Static,
        ),
    )
    .with_dynamic_method_type(mt("(Ljava/lang/String;)Ljava/lang/String;"))
}

/// `Function<Child, String> f = Base::describe;` from another package, where
/// `describe` is protected in `com.acme.Base`.
pub fn cross_package_protected() -> CallSiteSpec {
    CallSiteSpec::new(
        CallerClass::new("com.other.Child"),
        FunctionalInterface::new("java/util/function/Function"),
        "apply",
        mt("(Ljava/lang/Object;)Ljava/lang/Object;"),
        vec![],
        ImplMethod::new(
            "com/acme/Base",
            "describe",
            mt("()Ljava/lang/String;"),
            InvocationKind::Virtual,
        )
        .with_access(MemberAccess::Protected),
    )
    .with_dynamic_method_type(mt("(Lcom/other/Child;)Ljava/lang/String;"))
}

/// `Supplier<Widget> s = Widget::new;`
pub fn widget_constructor() -> CallSiteSpec {
    CallSiteSpec::new(
        main_caller(),
        FunctionalInterface::new("java/util/function/Supplier"),
        "get",
        mt("()Ljava/lang/Object;"),
        vec![],
        ImplMethod::new(
            "com/acme/Widget",
            "<init>",
            MethodType::void(),
            InvocationKind::NewInvokeSpecial,
        ),
    )
    .with_dynamic_method_type(mt("()Lcom/acme/Widget;"))
}
