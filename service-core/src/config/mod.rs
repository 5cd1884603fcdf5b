use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment prefix shared by every service (`APP_SERVER__PORT=8080`).
pub const ENV_PREFIX: &str = "APP";

/// Resolve a service's `config/` directory whether the process runs from the
/// workspace root or from the crate directory itself.
pub fn configuration_directory(base_path: &Path, crate_dir: &str) -> PathBuf {
    if base_path.ends_with(crate_dir) {
        base_path.join("config")
    } else {
        base_path.join(crate_dir).join("config")
    }
}

/// Load layered settings: `<dir>/base.yaml` first, then `APP_*` environment
/// variables with `__` as the nesting separator.
pub fn load_layered<T: DeserializeOwned>(configuration_directory: &Path) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let settings = Cfg::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_directory_from_workspace_root() {
        let dir = configuration_directory(Path::new("/srv/app"), "ledger-frontend");
        assert_eq!(dir, PathBuf::from("/srv/app/ledger-frontend/config"));
    }

    #[test]
    fn resolves_directory_from_crate_dir() {
        let dir = configuration_directory(Path::new("/srv/app/ledger-frontend"), "ledger-frontend");
        assert_eq!(dir, PathBuf::from("/srv/app/ledger-frontend/config"));
    }
}
