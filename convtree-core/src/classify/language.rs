//! Syntax language inference for file content.
//!
//! A path from the originating tool call is authoritative; content sniffing
//! is only a fallback when no path is known.

use std::path::Path;

/// Language for a file path, by extension or well-known file name.
pub fn from_path(path: &str) -> Option<&'static str> {
    let path = Path::new(path);

    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            "Makefile" | "makefile" | "GNUmakefile" => return Some("make"),
            "Dockerfile" => return Some("dockerfile"),
            "CMakeLists.txt" => return Some("cmake"),
            "Cargo.lock" => return Some("toml"),
            _ => {}
        }
    }

    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let lang = match ext.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "lua" => "lua",
        "sh" | "bash" | "zsh" => "bash",
        "fish" => "fish",
        "json" | "jsonl" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "vim" => "vim",
        "ex" | "exs" => "elixir",
        "hs" => "haskell",
        "ml" | "mli" => "ocaml",
        "scala" => "scala",
        "r" => "r",
        "txt" | "log" => "text",
        _ => return None,
    };
    Some(lang)
}

/// Strip the `   12→` / `   12\t` line-number gutter the Read tool prepends.
pub fn strip_line_numbers(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
            if digits == 0 {
                return line;
            }
            let rest = &trimmed[digits..];
            rest.strip_prefix('→')
                .or_else(|| rest.strip_prefix('\t'))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Guess a language from content alone.
pub fn sniff(content: &str) -> Option<&'static str> {
    let body = strip_line_numbers(content);
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(first) = trimmed.lines().next() {
        if let Some(shebang) = first.strip_prefix("#!") {
            return shebang_language(shebang);
        }
    }

    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Some("json");
    }

    if trimmed.starts_with("<?php") {
        return Some("php");
    }
    if trimmed.starts_with("<!DOCTYPE html") || trimmed.starts_with("<html") {
        return Some("html");
    }
    if trimmed.starts_with("<?xml") {
        return Some("xml");
    }

    let lines: Vec<&str> = trimmed.lines().map(str::trim_start).collect();
    let any = |pred: &dyn Fn(&str) -> bool| lines.iter().any(|l| pred(l));

    if any(&|l: &str| {
        l.starts_with("fn ") || l.starts_with("pub fn ") || l.starts_with("use std::")
    }) {
        return Some("rust");
    }
    if any(&|l: &str| l.starts_with("package ")) && any(&|l: &str| l.starts_with("func ")) {
        return Some("go");
    }
    if any(&|l: &str| l.starts_with("#include")) {
        return Some("c");
    }
    if any(&|l: &str| l.starts_with("def ") || (l.starts_with("class ") && l.ends_with(':')))
        || any(&|l: &str| l.starts_with("from ") && l.contains(" import "))
    {
        return Some("python");
    }
    if any(&|l: &str| {
        l.starts_with("function ")
            || l.starts_with("const ")
            || l.starts_with("export ")
            || l.contains("=> {")
    }) {
        return Some("javascript");
    }
    if any(&|l: &str| l.starts_with("import ") && !l.ends_with(';')) {
        return Some("python");
    }

    None
}

fn shebang_language(shebang: &str) -> Option<&'static str> {
    let interpreter = shebang
        .split_whitespace()
        .flat_map(|part| part.rsplit('/').next())
        .find(|part| *part != "env")?;

    match interpreter {
        i if i.starts_with("python") => Some("python"),
        "bash" | "sh" | "zsh" | "dash" => Some("bash"),
        "node" | "deno" | "bun" => Some("javascript"),
        "ruby" => Some("ruby"),
        "perl" => Some("perl"),
        "lua" => Some("lua"),
        _ => None,
    }
}
