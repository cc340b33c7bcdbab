use std::path::PathBuf;

const DB_FILE_NAME: &str = "annotrack.sqlite";
const DATA_DIR_NAME: &str = "annotrack";

#[derive(Debug, Clone)]
pub struct DataDirResolution {
    pub dir: PathBuf,
    pub matched_existing: bool,
}

/// An explicit directory wins; otherwise `$XDG_DATA_HOME/annotrack`, falling
/// back to `~/.local/share/annotrack`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<DataDirResolution, String> {
    let dir = match explicit {
        Some(dir) => dir,
        None => default_base()?.join(DATA_DIR_NAME),
    };
    let matched_existing = dir.join(DB_FILE_NAME).exists();
    Ok(DataDirResolution {
        dir,
        matched_existing,
    })
}

fn default_base() -> Result<PathBuf, String> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME")
        && !xdg.is_empty()
    {
        return Ok(PathBuf::from(xdg));
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home).join(".local").join("share"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_reports_existing_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fresh = resolve_data_dir(Some(dir.path().to_path_buf())).expect("resolve");
        assert!(!fresh.matched_existing);

        std::fs::write(dir.path().join(DB_FILE_NAME), b"").expect("touch");
        let existing = resolve_data_dir(Some(dir.path().to_path_buf())).expect("resolve");
        assert!(existing.matched_existing);
        assert_eq!(existing.dir, dir.path());
    }
}
