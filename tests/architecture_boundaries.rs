use std::fs;
use std::path::{Path, PathBuf};

/// Only the sweep runner may catch panics; everything else propagates.
const ALLOWED_PANIC_CATCHERS: &[&str] = &["src/sweep/runner.rs"];

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// Lines of `content` before its `#[cfg(test)]` module
fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .take_while(|(_, line)| !line.starts_with("#[cfg(test)]"))
}

fn scan(dir: &str, matches: impl Fn(&str) -> bool) -> Vec<(String, usize, String)> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join(dir), &mut files);

    let mut hits = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (line_no, line) in production_lines(&content) {
            if matches(line) {
                hits.push((rel.clone(), line_no, line.to_string()));
            }
        }
    }
    hits
}

#[test]
fn sweep_core_does_not_depend_on_concrete_collaborators() {
    let offenders: Vec<String> = scan("src/sweep", |line| {
        line.contains("crate::sim") || line.contains("crate::config")
    })
    .into_iter()
    .map(|(rel, line, text)| format!("{rel}:{line}: {text}"))
    .collect();

    assert!(
        offenders.is_empty(),
        "sweep core reaches into simulated collaborators or app config:\n{}",
        offenders.join("\n")
    );
}

#[test]
fn panics_are_caught_only_at_the_cell_boundary() {
    let offenders: Vec<String> = scan("src", |line| line.contains("catch_unwind"))
        .into_iter()
        .filter(|(rel, _, _)| {
            !ALLOWED_PANIC_CATCHERS
                .iter()
                .any(|allowed| allowed == rel)
        })
        .map(|(rel, line, text)| format!("{rel}:{line}: {text}"))
        .collect();

    assert!(
        offenders.is_empty(),
        "catch_unwind used outside the sweep runner:\n{}",
        offenders.join("\n")
    );
}

#[test]
fn scans_stop_at_test_modules() {
    let source = concat!(
        "fn run() {}\n",
        "\n",
        "#[cfg(test)]\n",
        "mod tests {\n",
        "    fn t() { std::panic::catch_unwind(|| ()); }\n",
        "}\n",
    );
    let lines: Vec<(usize, &str)> = production_lines(source).collect();
    assert_eq!(lines, vec![(1, "fn run() {}"), (2, "")]);
    assert!(!lines.iter().any(|(_, line)| line.contains("catch_unwind")));
}
