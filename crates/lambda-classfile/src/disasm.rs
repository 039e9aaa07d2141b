//! Textual listing of a class model, in the spirit of `javap -c -p`.

use std::fmt::Write;

use crate::model::{access_to_string, ClassModel};

pub fn disassemble(class: &ClassModel) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} class {} extends {}",
        access_to_string(class.access, true),
        class.name,
        class.super_class
    );
    if !class.interfaces.is_empty() {
        let _ = writeln!(out, "  implements {}", class.interfaces.join(", "));
    }
    let _ = writeln!(out, "  version {}", class.version);

    for field in &class.fields {
        let _ = writeln!(
            out,
            "\n  {} {} {}",
            access_to_string(field.access, false),
            field.ty.descriptor(),
            field.name
        );
    }

    for method in &class.methods {
        let _ = writeln!(
            out,
            "\n  {} {}{}",
            access_to_string(method.access, false),
            method.name,
            method.ty.descriptor()
        );
        if !method.exceptions.is_empty() {
            let _ = writeln!(out, "    throws {}", method.exceptions.join(", "));
        }
        if let Some(code) = &method.code {
            let _ = writeln!(
                out,
                "    stack={} locals={}",
                method.max_stack(),
                method.max_locals()
            );
            for (i, insn) in code.iter().enumerate() {
                let _ = writeln!(out, "    {:>3}: {}", i, insn);
            }
        }
    }
    out
}
