//! `htk_core` converts between a workspace of trading-terminal hotkey
//! scripts and the single `Hotkey.htk` file the terminal loads.
//!
//! ## Compile pipeline
//!
//! ```text
//! workspace root
//!   → Discovery (keymap.yaml + every .das script)
//!   → Keymap parser (entries with resolved script paths)
//!   → Loader (script text, `\n` line endings)
//!   → Ignore filter + duplicate id/key check
//!   → Placeholder substitution (%%LIVE%%, %%SIMULATED%%)
//!   → Model builder + aggregator
//!   → Codec (escape, wrap, header)
//!   → Writer (temp file + rename, CRLF)
//! ```
//!
//! ## Import pipeline
//!
//! ```text
//! Hotkey.htk
//!   → Parser (headers + encoded bodies)
//!   → Codec decoder (bytes, length check)
//!   → Naming (unique ids and file names)
//!   → Keymap writer (YAML with group headings)
//!   → Import writer (conflict policy, all-or-nothing write)
//! ```
//!
//! [`verify_round_trip`] rebuilds an imported workspace and compares it byte
//! for byte with the file it came from.
//!
//! ## Configuration
//!
//! Pipelines take explicit option structs. [`Settings`] builds them from an
//! optional `htk.toml` plus command-line overrides:
//!
//! ```toml
//! output = "build/Hotkey.htk"
//!
//! [accounts]
//! live = "U1234567"
//! simulated = "TRPAPER1"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use htk_core::CompileOptions;
//! use htk_core::TracingReporter;
//! use htk_core::compile_hotkeys;
//!
//! let options = CompileOptions::new(".", "build/Hotkey.htk");
//! let result = compile_hotkeys(&options, &mut TracingReporter).unwrap();
//! println!("{} hotkeys written", result.hotkeys.len());
//! ```

pub use codec::*;
pub use compile::*;
pub use config::*;
pub use discovery::*;
pub use error::*;
pub use format::*;
pub use import::*;
pub use import_writer::*;
pub use keymap::*;
pub use keymap_writer::*;
pub use loader::*;
pub use model::*;
pub use naming::*;
pub use parser::*;
pub use placeholders::*;
pub use report::*;
pub use tags::*;
pub use verify::*;
pub use writer::*;

mod codec;
mod compile;
mod config;
mod discovery;
#[allow(unused_assignments)]
mod error;
mod format;
mod import;
mod import_writer;
mod keymap;
mod keymap_writer;
mod loader;
mod model;
mod naming;
mod parser;
mod placeholders;
mod report;
mod tags;
mod verify;
mod writer;

#[cfg(test)]
mod __fixtures;
