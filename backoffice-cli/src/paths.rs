//! Platform-specific directory paths.
//!
//! Uses XDG on Linux, standard locations on macOS/Windows.

use std::path::PathBuf;

use directories::ProjectDirs;

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "fliiinker";
const APPLICATION: &str = "backoffice";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Get the cache directory for regenerable data.
///
/// - Linux: `$XDG_CACHE_HOME/backoffice` or `~/.cache/backoffice`
/// - macOS: `~/Library/Caches/dev.fliiinker.backoffice`
/// - Windows: `C:\Users\<User>\AppData\Local\fliiinker\backoffice\cache`
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Get the config directory.
///
/// - Linux: `$XDG_CONFIG_HOME/backoffice` or `~/.config/backoffice`
/// - macOS: `~/Library/Application Support/dev.fliiinker.backoffice`
/// - Windows: `C:\Users\<User>\AppData\Roaming\fliiinker\backoffice\config`
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the default config file.
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the durable count cache.
pub fn cache_db() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("counts.db"))
}
