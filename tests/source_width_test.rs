use std::{fs, path::Path};

const MAX_WIDTH: usize = 100;

fn collect_rust_files(dir: &Path, files: &mut Vec<std::path::PathBuf>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}

#[test]
fn sources_stay_within_the_rustfmt_width() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&root.join("src"), &mut files);
    collect_rust_files(&root.join("tests"), &mut files);

    let mut too_wide = Vec::new();
    for file in &files {
        let text = fs::read_to_string(file).unwrap();
        for (number, line) in text.lines().enumerate() {
            if line.chars().count() > MAX_WIDTH {
                too_wide.push(format!("{}:{}", file.display(), number + 1));
            }
        }
    }
    assert!(too_wide.is_empty(), "lines wider than {}: {:?}", MAX_WIDTH, too_wide);
}
