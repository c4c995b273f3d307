#![allow(dead_code)]

use std::path::{Path, PathBuf};

use covnorm::model::{Assembly, Class, CodeFile, LineVisitStatus};
use tempfile::TempDir;

pub const FOO_CS: &str = include_str!("../fixtures/src/Foo.cs");
pub const LONELY_CS: &str = include_str!("../fixtures/src/Lonely.cs");

/// Create a temporary directory with the C# fixture sources under `src/`.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn source_tree() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("Foo.cs"), FOO_CS).unwrap();
    std::fs::write(src.join("Lonely.cs"), LONELY_CS).unwrap();
    (dir, src)
}

/// Write a report fixture into `dir`, pointing its `{src}` placeholders at
/// `src`.
pub fn write_report(dir: &Path, name: &str, fixture: &[u8], src: &Path) -> PathBuf {
    let text = String::from_utf8_lossy(fixture).replace("{src}", &src.to_string_lossy());
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// A code file whose statuses are derived from its visit counts.
pub fn code_file(path: &str, coverage: &[i64]) -> CodeFile {
    let statuses = coverage
        .iter()
        .map(|&v| LineVisitStatus::derive(v, None))
        .collect();
    CodeFile::new(path, coverage.to_vec(), statuses).unwrap()
}

/// One assembly with one class holding `files`.
pub fn assembly(name: &str, class: &str, files: Vec<CodeFile>) -> Assembly {
    let mut c = Class::new(class);
    for file in files {
        c.add_file(file);
    }
    let mut assembly = Assembly::new(name);
    assembly.add_class(c);
    assembly
}
