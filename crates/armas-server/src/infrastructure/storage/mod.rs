//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file, writes a
//! default one on request (`--init-config`), and supplies defaults when the
//! file does not exist yet.
//!
//! Operator-assigned device names are also persisted to disk, but they belong
//! to discovery; see `infrastructure::discovery::name_store`.

pub mod config;
