pub mod logging;

use std::path::Path;

use anyhow::bail;

pub fn check_file_valid(s: impl AsRef<Path>) -> anyhow::Result<()> {
    let s = s.as_ref();

    if s.is_dir() {
        bail!("'{}' is a folder, not a file", s.display());
    }

    if !s.is_file() {
        bail!("file '{}' doesn't exist", s.display());
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_checks() {
        let dir = std::env::temp_dir();
        let err = check_file_valid(&dir).unwrap_err();
        assert!(err.to_string().contains("is a folder"));

        let missing = dir.join("genosync-no-such-file.tsv");
        let err = check_file_valid(&missing).unwrap_err();
        assert!(err.to_string().contains("doesn't exist"));

        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        assert!(check_file_valid(manifest).is_ok());
    }
}
