use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Builds the fixture test suite.
/// A test is generated for each `.s` file in the `test` subdirectory;
/// nested directories become nested modules.
fn main() {
    println!("cargo::rerun-if-changed=test/");

    let out_dir = std::env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("tests.rs");
    let mut file = BufWriter::new(File::create(dest_path).unwrap());

    let root = PathBuf::from("test");
    if root.is_dir() {
        traverse(&mut file, &root);
    }

    file.flush().unwrap();
}

fn traverse(file: &mut impl Write, path: &Path) {
    let mut entries = std::fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect::<Vec<_>>();
    entries.sort();

    for entry in entries {
        let name = identifier(&entry);
        if entry.is_dir() {
            writeln!(file, "mod {name} {{").unwrap();
            traverse(file, &entry);
            writeln!(file, "}}").unwrap();
        } else if entry.extension().is_some_and(|ext| ext == "s") {
            writeln!(file, "#[test]").unwrap();
            writeln!(file, "fn {name}() -> Result<(), crate::test::TestError> {{").unwrap();
            writeln!(
                file,
                "let src = std::fs::read_to_string({:?}).map_err(|x| crate::test::TestError::FileError(x.to_string()))?;",
                entry
            )
            .unwrap();
            writeln!(file, "crate::test::test(&src)").unwrap();
            writeln!(file, "}}").unwrap();
            writeln!(file).unwrap();
        }
    }
}

/// The file stem, made into a valid Rust identifier.
fn identifier(path: &Path) -> String {
    let stem = path.file_stem().unwrap().to_string_lossy();
    let mut name = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}
