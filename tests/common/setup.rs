//! Runtimes and metafactories for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lambda_spinner::spinner::SpinnerConfig;
use lambda_spinner::runtime::{Object, Runtime, Trap, Value};
use lambda_spinner::{in_process_metafactory, InProcessMetafactory};

/// Calls to `com.acme.Main.tick()`, per runtime.
pub struct TickCounter(pub Arc<AtomicU64>);

impl TickCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A runtime with the `com.acme` implementation methods used by the fixtures:
///
/// - `Main.lambda$main$0(int)int`: adds 10
/// - `Main.twice(long)long`
/// - `Main.echoByte(byte)int`: returns its argument
/// - `Main.label(Integer)String`: `"#<n>"`
/// - `Main.tick()void`: counted
/// - `Base.describe()String` with `com.other.Child extends Base`
/// - `Widget.<init>()` setting `ready = 1`
pub fn acme_runtime() -> (Arc<Runtime>, TickCounter) {
    let runtime = Runtime::new();
    runtime.declare_class("com/acme/Base", None, &[]);
    runtime.declare_class("com/other/Child", Some("com/acme/Base"), &[]);
    runtime.declare_class("com/acme/Widget", None, &[]);

    runtime.register_native("com/acme/Main", "lambda$main$0", "(I)I", |_, args| {
        let n = int_arg(args, 0)?;
        Ok(Some(Value::Int(n.wrapping_add(10))))
    });
    runtime.register_native("com/acme/Main", "twice", "(J)J", |_, args| {
        let n = args
            .first()
            .and_then(Value::as_long)
            .ok_or_else(|| Trap::internal("twice: expected long"))?;
        Ok(Some(Value::Long(n.wrapping_mul(2))))
    });
    runtime.register_native("com/acme/Main", "echoByte", "(B)I", |_, args| {
        Ok(Some(Value::Int(int_arg(args, 0)?)))
    });
    runtime.register_native(
        "com/acme/Main",
        "label",
        "(Ljava/lang/Integer;)Ljava/lang/String;",
        |_, args| {
            let n = match args.first().and_then(Value::as_object).map(|o| o.as_ref()) {
                Some(Object::Boxed(_, v)) => v.as_int(),
                _ => None,
            }
            .ok_or_else(|| Trap::internal("label: expected Integer"))?;
            Ok(Some(Value::string(format!("#{}", n))))
        },
    );

    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ticks);
    runtime.register_native("com/acme/Main", "tick", "()V", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    });

    runtime.register_native("com/acme/Base", "describe", "()Ljava/lang/String;", |_, args| {
        let receiver = args
            .first()
            .and_then(Value::as_object)
            .ok_or_else(|| Trap::null_pointer("describe: null receiver"))?;
        Ok(Some(Value::string(format!("described {}", receiver.class_name()))))
    });
    runtime.register_native("com/acme/Widget", "<init>", "()V", |_, args| {
        let instance = args
            .first()
            .and_then(Value::as_object)
            .and_then(|o| o.as_instance())
            .ok_or_else(|| Trap::internal("Widget.<init>: missing receiver"))?;
        instance.set_field("ready", Value::Int(1));
        Ok(None)
    });

    (Arc::new(runtime), TickCounter(ticks))
}

fn int_arg(args: &[Value], index: usize) -> Result<i32, Trap> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| Trap::internal(format!("expected int argument {}", index)))
}

/// Default-configured metafactory over [`acme_runtime`].
pub fn metafactory() -> (InProcessMetafactory, TickCounter) {
    metafactory_with(SpinnerConfig::default())
}

pub fn metafactory_with(config: SpinnerConfig) -> (InProcessMetafactory, TickCounter) {
    let (runtime, ticks) = acme_runtime();
    (in_process_metafactory(config, runtime), ticks)
}
