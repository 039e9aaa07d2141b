//! Class-file support for synthesized lambda proxy classes.
//!
//! | Module     | Role                                                     |
//! |------------|----------------------------------------------------------|
//! | `insn`     | symbolic instruction subset used by proxy classes        |
//! | `model`    | class / field / method model, access flags               |
//! | `pool`     | constant pool builder and modified UTF-8                 |
//! | `writer`   | model → bytes (`max_stack`, `BootstrapMethods`, ...)     |
//! | `reader`   | bytes → model, lifting code back into [`Insn`]           |
//! | `disasm`   | human-readable listing                                   |

pub mod disasm;
pub mod insn;
pub mod model;
pub mod opcodes;
pub mod pool;
pub mod reader;
pub mod writer;

pub use disasm::disassemble;
pub use insn::{FieldRef, Insn, InvokeOp, LoadableConstant, MethodRef, PrimitiveOp};
pub use model::{ClassModel, FieldModel, MethodModel, CLASSFILE_VERSION};
pub use reader::decode_class;
pub use writer::encode_class;
