//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Store | Store management | `init`, `prune` |
//! | Task | Work item lifecycle | `add`, `claim`, `close`, `dep` |
//! | Query | Derived views | `ready`, `blocked`, `graph` |
//! | Session | Agent hook integration | `session claim`, `session hook`, `drain claim` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Session and drain commands always answer in JSON.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output on stderr:
//! ```bash
//! bits --verbose ready
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod query;
mod session_cmd;
mod task;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
