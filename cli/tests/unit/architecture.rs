//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries hold:
//! domain is pure, application talks to ports only, infra never renders.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-test lines of a file with their 1-based line numbers.
fn non_test_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            (!in_test && !trimmed.starts_with("//")).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

/// Count non-test, non-comment, non-empty lines in a file.
fn count_non_test_lines(path: &Path) -> usize {
    non_test_lines(path)
        .iter()
        .filter(|(_, l)| !l.trim().is_empty())
        .count()
}

/// Lines of `layer` containing any of `patterns`, outside tests and comments.
fn find_in_layer(layer: &str, patterns: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir(layer)) {
        let rel = relative(&file);
        for (lineno, line) in non_test_lines(&file) {
            for pattern in patterns {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{lineno}: `{pattern}`: {}", line.trim()));
                }
            }
        }
    }
    violations
}

// ── Layer boundaries ──────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = find_in_layer(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

/// application/ must not import from infra/ or output/ layers.
#[test]
fn application_has_no_infra_or_output_imports() {
    let violations = find_in_layer("application", &["crate::infra::", "crate::output::"]);
    assert!(
        violations.is_empty(),
        "application/ must not import from infra/ or output/:\n{}",
        violations.join("\n")
    );
}

/// application/ reaches the outside world through ports only.
#[test]
fn application_has_no_blocking_io() {
    let violations = find_in_layer("application", &["std::fs::", "std::process::Command", "std::net::"]);
    assert!(
        violations.is_empty(),
        "application/ must go through port traits for I/O:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_concrete_adapters_in_service_signatures() {
    let concrete = ["LocalPlatform", "FileDeploymentStore", "YamlConfigStore"];
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("application")) {
        let rel = relative(&file);
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            for name in concrete {
                if line.contains(name) {
                    violations.push(format!("{rel}:{}: concrete adapter `{name}`: {line}", i + 1));
                }
            }
        }
    }
    assert!(
        violations.is_empty(),
        "services must take trait bounds, not adapters:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_in_layer("infra", &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_in_layer("infra", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

/// No module-level `#![allow(dead_code)]` in domain/, application/, or infra/.
#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations = Vec::new();
    for layer in ["domain", "application", "infra"] {
        for file in collect_rs_files(&src_dir(layer)) {
            let Ok(content) = std::fs::read_to_string(&file) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                if line.trim() == "#![allow(dead_code)]" {
                    violations.push(format!("{}:{}", relative(&file), i + 1));
                }
            }
        }
    }
    assert!(
        violations.is_empty(),
        "module-level #![allow(dead_code)] found in architecture layers:\n{}",
        violations.join("\n")
    );
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("commands")) {
        let rel = relative(&file);
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            let lineno = i + 1;
            if line.contains("json: bool") {
                violations.push(format!("{rel}:{lineno}: found `json: bool` parameter: {line}"));
            }
            let trimmed = line.trim();
            if trimmed.starts_with("if json")
                || trimmed.starts_with("if !json")
                || trimmed.contains("is_json()")
            {
                violations.push(format!("{rel}:{lineno}: found inline JSON branch: {line}"));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Found inline JSON branching in commands/: use app.renderer() instead:\n{}",
        violations.join("\n")
    );
}

/// Command files that run must receive `&AppContext`.
#[test]
fn command_handlers_accept_app_context() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if !(content.contains("pub async fn run(") || content.contains("pub fn run(")) {
            continue;
        }
        if !content.contains("app: &AppContext") {
            violations.push(relative(&file));
        }
    }
    assert!(
        violations.is_empty(),
        "Command handlers must accept &AppContext:\n{}",
        violations.join("\n")
    );
}

#[test]
fn command_handlers_are_reasonably_sized() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        let line_count = count_non_test_lines(&file);
        if line_count > 125 {
            violations.push(format!("{}: {line_count} non-test lines (limit: 125)", relative(&file)));
        }
    }
    assert!(
        violations.is_empty(),
        "Command handler files exceed 125-line limit: extract logic to application services:\n{}",
        violations.join("\n")
    );
}

/// All confirmation prompts in `commands/` must go through `app.confirm()`.
#[test]
fn commands_use_standardized_confirmation() {
    let violations = find_in_layer("commands", &["io::stdin().lock()", "Confirm::new()"]);
    assert!(
        violations.is_empty(),
        "Commands must use app.confirm() for user prompts:\n{}",
        violations.join("\n")
    );
}

/// Commands open backends through one helper so tests and the CLI agree on
/// where platform state lives.
#[test]
fn commands_do_not_construct_adapters_inline() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        if file.ends_with("mod.rs") {
            continue;
        }
        let rel = relative(&file);
        for (lineno, line) in non_test_lines(&file) {
            if line.contains("LocalPlatform::") || line.contains("FileDeploymentStore::") {
                violations.push(format!("{rel}:{lineno}: {}", line.trim()));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "use commands::open_backends instead:\n{}",
        violations.join("\n")
    );
}

// ── Blocking I/O safety ───────────────────────────────────────────────────────

/// Track whether a line is inside an async fn and outside `spawn_blocking`.
struct AsyncContextTracker {
    in_async_fn: bool,
    in_spawn_blocking: bool,
    brace_depth: i32,
    async_fn_start_depth: i32,
    spawn_blocking_start_depth: i32,
}

impl AsyncContextTracker {
    fn new() -> Self {
        Self {
            in_async_fn: false,
            in_spawn_blocking: false,
            brace_depth: 0,
            async_fn_start_depth: 0,
            spawn_blocking_start_depth: 0,
        }
    }

    /// Process a line. Returns `true` if the line is in an async fn but NOT in `spawn_blocking`.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("async fn ") && !trimmed.starts_with("//") {
            self.in_async_fn = true;
            self.async_fn_start_depth = self.brace_depth;
        } else if trimmed.contains("fn ") && !trimmed.contains("async ") && !trimmed.starts_with("//")
        {
            self.in_async_fn = false;
            self.in_spawn_blocking = false;
        }
        if self.in_async_fn && line.contains("spawn_blocking") {
            self.in_spawn_blocking = true;
            self.spawn_blocking_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_spawn_blocking && self.brace_depth <= self.spawn_blocking_start_depth
                    {
                        self.in_spawn_blocking = false;
                    }
                    if self.in_async_fn && self.brace_depth <= self.async_fn_start_depth {
                        self.in_async_fn = false;
                    }
                }
                _ => {}
            }
        }
        self.in_async_fn && !self.in_spawn_blocking
    }
}

#[test]
fn infra_async_functions_do_not_use_blocking_fs() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src_dir("infra")) {
        let rel = relative(&file);
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };

        let mut tracker = AsyncContextTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_unguarded_async = tracker.process_line(line);
            if !in_unguarded_async || line.trim().starts_with("//") {
                continue;
            }
            if line.contains("std::fs::") {
                violations.push(format!(
                    "{rel}:{}: std::fs in async fn outside spawn_blocking: {line}",
                    i + 1
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "infra/ async functions must not use blocking std::fs outside spawn_blocking:\n{}",
        violations.join("\n")
    );
}

/// Name of the function declared on `line`, if any.
fn declared_fn(line: &str) -> Option<(String, bool)> {
    let (prefix, rest) = line.trim().split_once("fn ")?;
    if !prefix
        .split_whitespace()
        .all(|w| w == "pub" || w.starts_with("pub(") || w == "async")
    {
        return None;
    }
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then(|| (name, prefix.contains("async")))
}

/// `true` when `line` calls `name(` as a function or method.
fn calls(line: &str, name: &str) -> bool {
    let needle = format!("{name}(");
    line.match_indices(&needle).any(|(i, _)| {
        line[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    })
}

#[test]
fn infra_async_functions_do_not_call_blocking_helpers() {
    let files = collect_rs_files(&src_dir("infra"));

    // Sync functions whose bodies touch the filesystem.
    let mut helpers: Vec<String> = Vec::new();
    for file in &files {
        let mut current: Option<String> = None;
        for (_, line) in non_test_lines(file) {
            if let Some((name, is_async)) = declared_fn(&line) {
                current = (!is_async).then_some(name);
            }
            if let Some(name) = &current
                && (line.contains("std::fs::") || calls(&line, "write_atomic"))
                && !helpers.contains(name)
            {
                helpers.push(name.clone());
            }
        }
    }
    assert!(
        helpers.iter().any(|h| h == "write_atomic"),
        "helper scan found nothing: {helpers:?}"
    );

    let mut violations: Vec<String> = Vec::new();
    for file in &files {
        let rel = relative(file);
        let mut tracker = AsyncContextTracker::new();
        for (n, line) in non_test_lines(file) {
            if !tracker.process_line(&line) {
                continue;
            }
            for helper in helpers.iter().filter(|h| calls(&line, h)) {
                violations.push(format!("{rel}:{n}: calls blocking `{helper}`: {}", line.trim()));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "infra/ async functions must reach blocking helpers through spawn_blocking:\n{}",
        violations.join("\n")
    );
}
