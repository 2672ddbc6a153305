//! In-chat command interpreter.
//!
//! Group conversations carry a small command language (`#laporan`,
//! `#jurnal`) that triggers calls to an external report/journal API and
//! replies back into the originating conversation. Parsing is a separate
//! tokenizer/grammar so it stays testable without any I/O; execution
//! lives in the [`CommandInterpreter`].

pub mod alias;
pub mod api;
pub mod error;
pub mod interpreter;
pub mod parser;

pub use alias::canonical_class;
pub use api::{ApiConfig, JournalData, JournalPayload, SchoolApi};
pub use error::{CommandError, Result};
pub use interpreter::{replies, CommandInterpreter, InterpreterConfig};
pub use parser::{
    build_report_query, month_number, parse, Command, CommandName, JournalArgs, ParseError,
    ReportArgs, ReportKind, ReportQuery,
};
