//! Shared runtime value model and evaluation semantics.
//!
//! Both execution engines use this module: the bytecode VM and the
//! tree-walking interpreter share one `Value` type, one set of
//! prefix/infix/index/truthiness rules (`ops`) and one builtin registry
//! (`builtins`), so their observable behavior cannot drift apart.

pub mod builtins;
pub mod ops;
pub mod value;

pub use builtins::{BuiltinDef, BUILTINS};
pub use value::{Closure, CompiledFunction, Function, HashKey, HashPair, Value};
