//! # Storage Layer
//!
//! Persistence for bits with plain, human-editable files.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | Markdown + YAML frontmatter | `<store>/{id}.md` |
//! | Session | Pretty JSON | `<store>/session.json` |
//! | Config | TOML | `~/.config/bits/config.toml` |
//!
//! ## Store Location
//!
//! ```text
//! ~/.bits/
//! └── home-me-myproject/      # one store per git repository
//!     ├── k3f.md              # task files
//!     ├── a9x.md
//!     └── session.json        # session owner + drain flag
//! ```
//!
//! `--store <DIR>` (or `BITS_STORE`) points a command at an explicit store
//! directory instead.
//!
//! ## Concurrency
//!
//! There is no file locking. Task writes are atomic (temp file + rename),
//! but read-then-write sequences from concurrent processes can race.
//!
//! ## Key Types
//!
//! - [`Project`] - Resolves the store directory and hands out stores
//! - [`TaskStore`] - Read/write tasks as markdown files
//! - [`Config`] - Global configuration

mod config;
mod markdown;
mod project;

pub use config::{Config, ConfigError, OutputFormat};
pub use markdown::TaskStore;
pub use project::{find_project_root, sanitize_path, Project, ProjectError};
