//! Value representation for the scripted environment

mod callable;
mod display;
mod foreign;
mod impls;
mod key;
mod table;

pub use callable::{BuiltinFn, Closure, Coroutine};
pub use foreign::{Describer, ForeignObject};
pub use key::TableKey;
pub use table::Table;

use std::sync::Arc;

use crate::heap::ObjectId;

/// Runtime value of the scripted environment.
///
/// Values are organized into two tiers:
/// - Tier 1: Primitives, compared and serialized by value
/// - Tier 2: Heap handles, compared by identity ([`ObjectId`])
#[derive(Clone, Default)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Tier 1: Primitives
    // ═══════════════════════════════════════════════════════════════════
    /// Absence of a value
    #[default]
    Nil,

    /// Boolean: `true` or `false`
    Bool(bool),

    /// 64-bit integer
    Integer(i64),

    /// 64-bit float
    Number(f64),

    /// Immutable byte string (not necessarily UTF-8)
    String(Arc<[u8]>),

    // ═══════════════════════════════════════════════════════════════════
    // Tier 2: Heap Handles
    // ═══════════════════════════════════════════════════════════════════
    /// Plain composite value
    Table(ObjectId),

    /// Closure or builtin
    Function(ObjectId),

    /// Opaque native object
    Foreign(ObjectId),

    /// Coroutine handle
    Thread(ObjectId),
}
