//! A minimal Go source scanner: package clause, import list, leading doc
//! comment, and build-tag filtering (`spec.md` §4.6–§4.7, §8 P8).
//!
//! This does not link against a Go toolchain. It is a purpose-built
//! recursive-descent reader over package clauses, import
//! declarations/blocks, and leading `// +build` / `//go:build` comment
//! lines — sufficient for "imports-and-comments only" parsing, not a
//! general Go parser.

/// The crawler's fixed build-target tag set, plus any `go1.*`-shaped
/// version tag (`original_source/spider/github/github.go`'s `buildTags`).
const TARGET_TAGS: &[&str] = &["linux", "386", "darwin", "cgo"];

/// Outcome of scanning one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Parsed cleanly; build tags (if any) matched the target set.
    Success(ParsedFile),
    /// Excluded by a build tag, or parsing failed on a test file.
    ShouldIgnore,
    /// Parsing failed on a non-test file.
    Failed,
}

/// The fields extracted from a successfully parsed file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFile {
    /// The declared package name.
    pub package_name: String,
    /// Import paths, in declaration order.
    pub imports: Vec<String>,
    /// The leading doc comment, if any, with comment markers stripped.
    pub doc_comment: String,
}

/// Parse `body` (the contents of `filename`). `filename`'s `_test.go`
/// suffix governs whether a parse failure degrades to `ShouldIgnore`
/// (`spec.md` §4.6).
#[must_use]
pub fn parse_source(filename: &str, body: &str) -> ParseOutcome {
    let is_test = filename.ends_with("_test.go");

    let header = scan_header(body);

    if build_ignored(&header.build_lines) {
        return ParseOutcome::ShouldIgnore;
    }

    let Some(package_name) = header.package_name else {
        return if is_test {
            ParseOutcome::ShouldIgnore
        } else {
            ParseOutcome::Failed
        };
    };

    let imports = scan_imports(&body[header.after_package_offset..]);

    ParseOutcome::Success(ParsedFile {
        package_name,
        imports,
        doc_comment: header.doc_comment,
    })
}

struct Header {
    package_name: Option<String>,
    doc_comment: String,
    build_lines: Vec<String>,
    after_package_offset: usize,
}

/// Scan everything up to and including the `package` clause: leading
/// comments (doc comment + build-tag lines) and the package name.
fn scan_header(body: &str) -> Header {
    let mut doc_lines: Vec<&str> = Vec::new();
    let mut build_lines: Vec<String> = Vec::new();
    let mut package_name = None;
    let mut after_package_offset = body.len();

    let mut in_block_comment = false;
    let mut offset = 0usize;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        let line_start = offset;
        offset += line.len();

        if in_block_comment {
            if let Some(end) = trimmed.find("*/") {
                in_block_comment = false;
                let rest = trimmed[end + 2..].trim();
                if let Some(name) = package_clause(rest) {
                    package_name = Some(name);
                    after_package_offset = line_start + line.len();
                    break;
                }
            }
            continue;
        }

        if trimmed.is_empty() {
            doc_lines.clear();
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("/*") {
            if let Some(end) = rest.find("*/") {
                let inner = &rest[..end];
                doc_lines.push(inner);
            } else {
                in_block_comment = true;
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("//") {
            let rest_trimmed = rest.trim_start();
            if let Some(tags) = rest_trimmed.strip_prefix("+build ") {
                build_lines.push(tags.to_string());
                doc_lines.clear();
                continue;
            }
            if let Some(expr) = trimmed.strip_prefix("//go:build ") {
                build_lines.push(format!("go:build {expr}"));
                doc_lines.clear();
                continue;
            }
            doc_lines.push(rest.trim_start_matches(' '));
            continue;
        }

        if let Some(name) = package_clause(trimmed) {
            package_name = Some(name);
            after_package_offset = line_start + line.len();
            break;
        }

        // Any other top-level content before `package` means this isn't a
        // normal Go file; stop scanning for a package clause.
        doc_lines.clear();
        break;
    }

    let doc_comment = if package_name.is_some() {
        doc_lines.join("\n")
    } else {
        String::new()
    };

    Header {
        package_name,
        doc_comment,
        build_lines,
        after_package_offset,
    }
}

fn package_clause(line: &str) -> Option<String> {
    let rest = line.strip_prefix("package ")?;
    let name = rest.split_whitespace().next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Scan `import "x"` single statements and `import (...)` blocks until a
/// non-import, non-comment, non-blank top-level line is found.
fn scan_imports(body: &str) -> Vec<String> {
    let mut imports = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            lines.next();
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("import ") {
            lines.next();
            let rest = rest.trim();
            if let Some(block) = rest.strip_prefix('(') {
                if let Some(path) = extract_quoted(block) {
                    imports.push(path);
                }
                for line in lines.by_ref() {
                    let trimmed = line.trim();
                    if trimmed.starts_with(')') {
                        break;
                    }
                    if let Some(path) = extract_quoted(trimmed) {
                        imports.push(path);
                    }
                }
            } else if let Some(path) = extract_quoted(rest) {
                imports.push(path);
            }
            continue;
        }
        if trimmed.starts_with("import(") {
            lines.next();
            for line in lines.by_ref() {
                let trimmed = line.trim();
                if trimmed.starts_with(')') {
                    break;
                }
                if let Some(path) = extract_quoted(trimmed) {
                    imports.push(path);
                }
            }
            continue;
        }
        break;
    }

    imports
}

fn extract_quoted(s: &str) -> Option<String> {
    let s = s.trim();
    let s = s.strip_prefix("_ ").unwrap_or(s);
    let s = s.strip_prefix('"')?;
    let end = s.find('"')?;
    Some(s[..end].to_string())
}

fn build_ignored(lines: &[String]) -> bool {
    for line in lines {
        if let Some(expr) = line.strip_prefix("go:build ") {
            if !eval_go_build(expr) {
                return true;
            }
            continue;
        }
        // Legacy `// +build` line: space-separated OR groups of
        // comma-separated AND terms. Matches
        // `original_source/spider/github/github.go`'s `buildIgnored`: a
        // single tag outside the target set anywhere on the line marks the
        // whole file ignored, without distinguishing negation — replicated
        // faithfully rather than "fixed", since that is this system's
        // actual build-tag behavior.
        for item in line.split(' ') {
            for tag in item.split(',') {
                let tag = tag.strip_prefix('!').unwrap_or(tag);
                if tag.is_empty() || tag.starts_with("go") || TARGET_TAGS.contains(&tag) {
                    continue;
                }
                return true;
            }
        }
    }
    false
}

/// Evaluate a `//go:build` boolean expression (`&&`, `||`, `!`, parens)
/// against the target tag set.
fn eval_go_build(expr: &str) -> bool {
    let tokens = tokenize_build_expr(expr);
    let mut pos = 0;
    parse_or(&tokens, &mut pos)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize_build_expr(expr: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '!' => {
                toks.push(Tok::Not);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                toks.push(Tok::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                toks.push(Tok::Or);
                i += 2;
            }
            _ => {
                let start = i;
                while i < chars.len() && !" \t()!&|".contains(chars[i]) {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
        }
    }
    toks
}

fn parse_or(toks: &[Tok], pos: &mut usize) -> bool {
    let mut value = parse_and(toks, pos);
    while *pos < toks.len() && toks[*pos] == Tok::Or {
        *pos += 1;
        let rhs = parse_and(toks, pos);
        value = value || rhs;
    }
    value
}

fn parse_and(toks: &[Tok], pos: &mut usize) -> bool {
    let mut value = parse_unary(toks, pos);
    while *pos < toks.len() && toks[*pos] == Tok::And {
        *pos += 1;
        let rhs = parse_unary(toks, pos);
        value = value && rhs;
    }
    value
}

fn parse_unary(toks: &[Tok], pos: &mut usize) -> bool {
    if *pos < toks.len() && toks[*pos] == Tok::Not {
        *pos += 1;
        return !parse_unary(toks, pos);
    }
    parse_primary(toks, pos)
}

fn parse_primary(toks: &[Tok], pos: &mut usize) -> bool {
    match toks.get(*pos) {
        Some(Tok::LParen) => {
            *pos += 1;
            let value = parse_or(toks, pos);
            if toks.get(*pos) == Some(&Tok::RParen) {
                *pos += 1;
            }
            value
        }
        Some(Tok::Ident(name)) => {
            *pos += 1;
            name.starts_with("go") || TARGET_TAGS.contains(&name.as_str())
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_package_and_import() {
        let body = "package a\n\nimport \"fmt\"\n\nfunc main() {}\n";
        match parse_source("a.go", body) {
            ParseOutcome::Success(p) => {
                assert_eq!(p.package_name, "a");
                assert_eq!(p.imports, vec!["fmt".to_string()]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn import_block_and_doc_comment() {
        let body = "// Package a does things.\npackage a\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n";
        match parse_source("a.go", body) {
            ParseOutcome::Success(p) => {
                assert_eq!(p.doc_comment, "Package a does things.");
                assert_eq!(p.imports, vec!["fmt".to_string(), "net/http".to_string()]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn empty_name_non_test_is_failed() {
        let body = "func main() {}\n";
        assert_eq!(parse_source("bad.go", body), ParseOutcome::Failed);
    }

    #[test]
    fn empty_name_test_file_is_ignored() {
        let body = "func main() {}\n";
        assert_eq!(parse_source("bad_test.go", body), ParseOutcome::ShouldIgnore);
    }

    #[test]
    fn legacy_build_tag_windows_excluded() {
        let body = "// +build windows\n\npackage a\n";
        assert_eq!(parse_source("a.go", body), ParseOutcome::ShouldIgnore);
    }

    #[test]
    fn legacy_build_tag_linux_accepted() {
        let body = "// +build linux\n\npackage a\n";
        match parse_source("a.go", body) {
            ParseOutcome::Success(p) => assert_eq!(p.package_name, "a"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn go_build_expression_evaluated() {
        let body = "//go:build linux && !windows\n\npackage a\n";
        match parse_source("a.go", body) {
            ParseOutcome::Success(p) => assert_eq!(p.package_name, "a"),
            other => panic!("expected success, got {other:?}"),
        }

        let body2 = "//go:build windows\n\npackage a\n";
        assert_eq!(parse_source("a.go", body2), ParseOutcome::ShouldIgnore);
    }
}
