//! CLI subcommand implementations for the `modstats` binary.

pub mod bundles_cmd;
pub mod collect_cmd;
pub mod doctor;
pub mod history_cmd;
pub mod migrate_cmd;
pub mod output;
