//! CLI command implementations.

pub(crate) mod diff;
pub(crate) mod settings;
pub(crate) mod update;

pub(crate) use diff::DiffArgs;
pub(crate) use settings::SettingsArgs;
pub(crate) use update::UpdateArgs;
