use std::env;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";
const STORAGE_FILE_NAME: &str = "storage.json";

/// Directory holding the config: next to the executable when a config is
/// there, else the working directory when it has one, else the executable's.
pub fn get_base_dir() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if has_config_candidate(&exe_dir) {
        return exe_dir;
    }

    if let Ok(cwd) = env::current_dir() {
        if has_config_candidate(&cwd) {
            return cwd;
        }
    }

    exe_dir
}

pub fn resolve_config_path(raw: Option<String>, base_dir: &Path) -> PathBuf {
    if let Some(path) = raw {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return path;
        }
        if let Ok(cwd) = env::current_dir() {
            return cwd.join(path);
        }
        return path;
    }

    config_candidates(base_dir)
        .into_iter()
        .find(|path| path.exists())
        .unwrap_or_else(|| base_dir.join(CONFIG_FILE_NAME))
}

/// The storage file lives beside the config file.
pub fn storage_path(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(STORAGE_FILE_NAME),
        _ => PathBuf::from(STORAGE_FILE_NAME),
    }
}

fn config_candidates(base_dir: &Path) -> [PathBuf; 2] {
    [
        base_dir.join(CONFIG_FILE_NAME),
        base_dir.join("config").join(CONFIG_FILE_NAME),
    ]
}

fn has_config_candidate(base_dir: &Path) -> bool {
    config_candidates(base_dir).iter().any(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::{resolve_config_path, storage_path};
    use crate::local_storage::tests::fixture_dir;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[test]
    fn prefers_nested_config_dir_when_only_it_exists() {
        let base = fixture_dir("paths_nested");
        assert_eq!(resolve_config_path(None, &base), base.join("config.toml"));

        fs::create_dir_all(base.join("config")).expect("mkdir");
        fs::write(base.join("config").join("config.toml"), "").expect("write");
        assert_eq!(
            resolve_config_path(None, &base),
            base.join("config").join("config.toml")
        );

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn explicit_absolute_path_wins() {
        let base = fixture_dir("paths_explicit");
        let explicit = base.join("elsewhere.toml");
        assert_eq!(
            resolve_config_path(Some(explicit.display().to_string()), Path::new("/unused")),
            explicit
        );
        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn storage_sits_next_to_config() {
        assert_eq!(
            storage_path(Path::new("/opt/forge/config.toml")),
            PathBuf::from("/opt/forge/storage.json")
        );
        assert_eq!(storage_path(Path::new("config.toml")), PathBuf::from("storage.json"));
    }
}
