//! Data-directory resolution.
//!
//! Packaged installs and development runs get disjoint locations so their
//! data never collides: packaged mode resolves the platform data dir,
//! `--dev` uses a directory next to the working tree.

use std::path::PathBuf;

use directories::ProjectDirs;

pub const APP_NAME: &str = "plinth";

/// Resolve where both stores live. An explicit override wins, otherwise
/// dev mode maps to `./plinth-data` and packaged mode to the per-user
/// platform data directory.
pub fn resolve_data_dir(dev: bool, explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if dev {
        return PathBuf::from(format!("{APP_NAME}-data"));
    }
    match ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        // No resolvable home directory; fall back to the dev location.
        None => PathBuf::from(format!("{APP_NAME}-data")),
    }
}
