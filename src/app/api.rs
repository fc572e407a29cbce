use crate::app::errors::{AppError, AppResult};
use crate::app::registry;
use crate::app::types::{AppConfig, AppOptions, AppSettings, ClientApp};
use crate::component::{ComponentContainer, DEFAULT_ENTRY_NAME};

pub static SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

fn normalize_name(settings: &AppSettings) -> AppResult<String> {
    let name = settings
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_ENTRY_NAME.to_string());
    if name.trim().is_empty() {
        return Err(AppError::BadAppName { app_name: name });
    }
    Ok(name)
}

fn options_are_defined(options: &AppOptions) -> bool {
    options.api_base_url.is_some() || options.sender_id.is_some() || options.app_id.is_some()
}

/// Creates (or returns) the app registered under the settings' name.
///
/// Re-initializing an existing name with identical options returns the
/// existing handle; different options are an error rather than a silent
/// replacement.
pub fn initialize_app(options: AppOptions, settings: Option<AppSettings>) -> AppResult<ClientApp> {
    let settings = settings.unwrap_or_default();
    let name = normalize_name(&settings)?;

    if !options_are_defined(&options) {
        return Err(AppError::NoOptions);
    }

    let config = AppConfig::new(name.clone());

    {
        let apps = registry::apps_guard();
        if let Some(existing) = apps.get(&name) {
            if existing.options() == options && existing.config() == config {
                return Ok(existing.clone());
            }
            return Err(AppError::DuplicateApp { app_name: name });
        }
    }

    let container = ComponentContainer::new(name.clone());
    let app = ClientApp::new(options, config, container.clone());

    let components: Vec<_> = crate::component::global_components()
        .lock()
        .unwrap()
        .values()
        .cloned()
        .collect();
    for component in components {
        let _ = container.add_component(component);
    }

    registry::apps_guard().insert(name, app.clone());
    Ok(app)
}

pub fn get_app(name: Option<&str>) -> AppResult<ClientApp> {
    let lookup = name.unwrap_or(DEFAULT_ENTRY_NAME);
    registry::apps_guard()
        .get(lookup)
        .cloned()
        .ok_or_else(|| AppError::NoApp {
            app_name: lookup.to_string(),
        })
}

pub fn get_apps() -> Vec<ClientApp> {
    registry::apps_guard().values().cloned().collect()
}

/// Removes the app from the registry and drops every cached service
/// instance. Existing handles keep working only for `name()`/`is_deleted()`.
pub fn delete_app(app: &ClientApp) -> AppResult<()> {
    let removed = registry::apps_guard().remove(app.name());

    if removed.is_some() {
        for provider in app.container().get_providers() {
            let _ = provider.delete();
        }
        app.set_is_deleted(true);
    }

    Ok(())
}
