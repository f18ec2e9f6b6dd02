//! exvi: a vi/ex modal command interpreter.
//!
//! This library implements the command layer of a vi-style editor with
//! no rendering of its own: ex command parsing with address ranges,
//! address resolution against a host buffer, the substitute and global
//! commands, registers and markers, macro recording and playback, and
//! the modal state machine. A host supplies the buffer (through the
//! `TextBuffer` trait) and optional callbacks; the interpreter supplies
//! byte-for-byte command semantics.

pub mod buffer;
pub mod error;
pub mod ex;
pub mod interpreter;
pub mod interrupt;
pub mod macros;
pub mod normal;
pub mod options;
pub mod search;
pub mod store;
pub mod substitute;
pub mod template;
pub mod vi;

pub use buffer::{LineBuffer, Selection, TextBuffer};
pub use error::{ErrorKind, ExviError, Result};
pub use ex::{
    parse_ex, AddressBase, AddressRange, AddressSpec, Arity, Command, CommandKind, ParseKind,
};
pub use interpreter::{HostHooks, Interpreter, NoopHooks, Outcome};
pub use interrupt::InterruptToken;
pub use macros::{MacroEngine, MacroMode};
pub use normal::{NormalAction, NormalParser};
pub use options::Options;
pub use search::{FindState, SearchDirection};
pub use store::{Markers, RegisterContent, Registers};
pub use substitute::{SubstituteFlags, SubstituteSpec, Substitutor};
pub use template::{expand, expand_text, VariableResolver};
pub use vi::{Hook, KeyMatch, Transition, ViKey, ViMachine, ViState};
