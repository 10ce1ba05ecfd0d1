use std::path::{Path, PathBuf};

const MAX_LINES: usize = 750;

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set");
    let root = PathBuf::from(&manifest_dir);

    let mut files = Vec::new();
    walk_directory(&root.join("src"), &mut files);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }

    enforce_line_limits(&root, &files);
    enforce_no_dead_code_allows(&root, &files);
    enforce_serial_for_env_mutations(&root, &files);
}

fn walk_directory(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_directory(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
            files.push(path);
        }
    }
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn count_non_empty_lines(content: &str) -> usize {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count()
}

fn enforce_line_limits(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        match std::fs::read_to_string(file) {
            Ok(content) => {
                let line_count = count_non_empty_lines(&content);
                if line_count > MAX_LINES {
                    violations.push((relative(root, file), line_count));
                }
            }
            Err(e) => println!(
                "cargo:warning=Could not read file {}: {}",
                relative(root, file).display(),
                e
            ),
        }
    }

    let report: Vec<String> = violations
        .iter()
        .map(|(path, lines)| format!("{}: {} non-empty lines", path.display(), lines))
        .collect();
    fail_if_any(
        &format!("source files over {} non-empty lines", MAX_LINES),
        &report,
        "split the module",
    );
}

fn enforce_no_dead_code_allows(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();

    for file in files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
                && trimmed.contains("dead_code")
            {
                violations.push((relative(root, file), line_num + 1, trimmed.to_string()));
            }
        }
    }

    let report: Vec<String> = violations
        .iter()
        .map(|(path, line_num, line)| format!("{}:{}: {}", path.display(), line_num, line))
        .collect();
    fail_if_any(
        "dead_code allowances",
        &report,
        "delete the unused item or gate it with #[cfg(test)]",
    );
}

/// Requires #[serial] for tests that mutate environment variables.
fn enforce_serial_for_env_mutations(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();

    for file in files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();

        let mut in_test_fn = false;
        let mut test_fn_start = 0;
        let mut test_fn_name = String::new();
        let mut has_serial = false;
        let mut brace_depth = 0;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();

            if trimmed == "#[serial]" || trimmed == "#[serial_test::serial]" {
                has_serial = true;
            }

            if trimmed == "#[test]" || trimmed.starts_with("#[tokio::test") {
                for next in lines.iter().skip(i + 1).take(4) {
                    if let Some(fn_pos) = next.find("fn ") {
                        let after_fn = &next[fn_pos + 3..];
                        if let Some(paren) = after_fn.find('(') {
                            test_fn_name = after_fn[..paren].trim().to_string();
                        }
                        test_fn_start = i + 1;
                        in_test_fn = true;
                        brace_depth = 0;
                        break;
                    }
                }
            }

            if !in_test_fn {
                continue;
            }

            for c in line.chars() {
                if c == '{' {
                    brace_depth += 1;
                } else if c == '}' {
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        in_test_fn = false;
                        has_serial = false;
                    }
                }
            }

            let mutates_env = !trimmed.starts_with("//")
                && (trimmed.contains("env::set_var") || trimmed.contains("env::remove_var"));
            if mutates_env && !has_serial {
                violations.push((
                    relative(root, file),
                    test_fn_start,
                    test_fn_name.clone(),
                ));
                in_test_fn = false;
            }
        }
    }

    let report: Vec<String> = violations
        .iter()
        .map(|(path, line_num, name)| {
            format!("{}:{}: `{}` sets env vars", path.display(), line_num, name)
        })
        .collect();
    fail_if_any(
        "env-mutating tests without #[serial]",
        &report,
        "annotate the test with #[serial_test::serial]",
    );
}

/// Prints each offending entry and aborts the build when there are any.
fn fail_if_any(problem: &str, entries: &[String], remedy: &str) {
    if entries.is_empty() {
        return;
    }
    eprintln!("\nclaude-stats hygiene check: {}", problem);
    for entry in entries {
        eprintln!("  {}", entry);
    }
    eprintln!("fix: {}\n", remedy);
    panic!("{} ({} found)", problem, entries.len());
}
