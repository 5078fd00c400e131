pub mod check;
pub mod diff;
pub mod sync;

use anyhow::Result;
use arrclient::{Backend, HttpBackend};
use declarative::SyncError;

use crate::Context;
use crate::config::{Config, InstanceConfig};
use crate::ui;

/// Load and validate the config named by `--config` or the default location
pub fn load_config(ctx: &Context) -> Result<Config> {
    let config = Config::load(ctx.config.as_deref())?;
    config.validate()?;
    log::debug!("Loaded {} instance(s) from {}", config.instances.len(), config.source.display());
    Ok(config)
}

/// HTTP backend for a validated instance
pub fn connect(instance: &InstanceConfig) -> Result<Box<dyn Backend>> {
    let dialect = instance.dialect()?;
    let backend = HttpBackend::new(dialect, &instance.base_url, instance.api_key()?);
    Ok(Box::new(backend))
}

/// Whether an error must stop every remaining instance
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SyncError>()
        .is_some_and(SyncError::is_dependency_error)
}

/// Print an error with the advice for its backend failure, if any
pub fn report_error(label: &str, err: &anyhow::Error) {
    ui::error(&format!("{label}: {err:#}"));
    let backend_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<arrclient::Error>());
    if let Some(backend_error) = backend_error {
        let category = backend_error.category();
        ui::kv(category.description(), category.advice());
    }
}
