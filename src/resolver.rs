//! Include-file resolution for `#include`, `file_exists` and friends.
//!
//! Search order:
//! - relative to the directory of the including file
//! - the same name with an `.inc` suffix
//! - each library directory, plain then with `.inc`

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SceneError};
use crate::lexer;
use crate::token::Spanned;

/// Resolve an include name to an existing file, if any.
pub fn find_file(name: &str, base_dir: &Path, lib_dirs: &[PathBuf]) -> Option<PathBuf> {
    let candidates = std::iter::once(base_dir).chain(lib_dirs.iter().map(PathBuf::as_path));
    for dir in candidates {
        let plain = dir.join(name);
        if plain.is_file() {
            return Some(plain);
        }
        let with_ext = dir.join(format!("{name}.inc"));
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    None
}

/// Resolve an include name or fail with the usual message.
pub fn resolve_path(name: &str, base_dir: &Path, lib_dirs: &[PathBuf]) -> Result<PathBuf> {
    find_file(name, base_dir, lib_dirs)
        .ok_or_else(|| SceneError::parse(&format!("Cannot open include file {name}.")))
}

/// Read and tokenize a resolved include file.
pub fn load(path: &Path) -> Result<Vec<Spanned>> {
    let source = fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
    lexer::lex(&source).map_err(|e| e.in_file(Some(path.to_path_buf())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-lang-resolver-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn resolves_relative_then_extension_then_lib() {
        let base = scratch_dir("base");
        let lib = scratch_dir("lib");
        fs::write(base.join("colors.inc"), "#declare Red = rgb <1,0,0>;").expect("write");
        fs::write(lib.join("shapes.inc"), "").expect("write");

        let found = resolve_path("colors.inc", &base, &[]).expect("plain name");
        assert_eq!(found, base.join("colors.inc"));
        let found = resolve_path("colors", &base, &[]).expect("with suffix");
        assert_eq!(found, base.join("colors.inc"));
        let found = resolve_path("shapes", &base, &[lib.clone()]).expect("lib dir");
        assert_eq!(found, lib.join("shapes.inc"));

        let err = resolve_path("missing.inc", &base, &[lib]).unwrap_err();
        assert_eq!(err.message(), "Cannot open include file missing.inc.");
    }

    #[test]
    fn load_tags_lex_errors_with_file() {
        let base = scratch_dir("lex");
        let path = base.join("bad.inc");
        fs::write(&path, "#declare A = @;").expect("write");
        let err = load(&path).unwrap_err();
        assert_eq!(err.file, Some(path));
    }
}
