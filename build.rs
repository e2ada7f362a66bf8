use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are policed.
const SOURCE_DIRS: [&str; 4] = ["simulate", "cli", "tests", "benches"];

// One line-level policy: a regex that finds candidate lines, a filter that
// decides which candidates are real violations, and the advice printed on failure.
struct Rule {
    title: &'static str,
    pattern: &'static str,
    is_violation: fn(&str) -> bool,
    advice: &'static str,
}

const RULES: [Rule; 5] = [
    Rule {
        title: "underscore-prefixed identifiers",
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        is_violation: underscore_outside_comments_and_strings,
        advice: "Underscore-prefixed names are not allowed in this project.\n   \
                 Either use the binding (removing the underscore) or remove it completely.",
    },
    Rule {
        title: "forbidden comment words",
        pattern: r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        is_violation: always,
        advice: "Comments narrating edits ('FIX', 'NEW', 'CHANGED', 'UPDATE', ...) are STRICTLY FORBIDDEN.\n   \
                 Remove them completely rather than commenting them out.",
    },
    Rule {
        title: "'**' in non-doc comments",
        pattern: r"(//|/\*).*\*\*",
        is_violation: stars_outside_doc_comments,
        advice: "The '**' pattern is not allowed in regular comments (but is allowed in doc comments).",
    },
    Rule {
        title: "comments with all alphabetic characters uppercase",
        pattern: r"(//|/\*).*",
        is_violation: shouting_comment,
        advice: "Comments where every letter is uppercase are STRICTLY FORBIDDEN.\n   \
                 STRONGLY CONSIDER deleting the comment completely.",
    },
    Rule {
        title: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        is_violation: always,
        advice: "#[allow(dead_code)] attributes are STRICTLY FORBIDDEN in this project.\n   \
                 Either use the code (removing the attribute) or remove it completely.",
    },
];

// Collects the violating lines of one file for one rule.
struct RuleCollector<'a> {
    rule: &'a Rule,
    violations: Vec<String>,
}

impl Sink for RuleCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.rule.is_violation)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

impl RuleCollector<'_> {
    fn error_message(&self, path: &Path) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.title,
            path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", self.rule.advice));
        Some(message)
    }
}

fn always(_: &str) -> bool {
    true
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//")
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

fn underscore_outside_comments_and_strings(line: &str) -> bool {
    if is_comment(line) || line.contains("/*") {
        return false;
    }
    // Odd-numbered pieces between quotes are string contents.
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !in_string
}

fn stars_outside_doc_comments(line: &str) -> bool {
    !is_doc_comment(line)
}

fn shouting_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    let comment = if let Some(rest) = trimmed.strip_prefix("//") {
        rest.trim_start_matches(['/', '!']).trim()
    } else if let Some(start) = line.find("/*") {
        let rest = &line[start + 2..];
        rest.find("*/").map_or(rest, |end| &rest[..end]).trim()
    } else {
        return false;
    };
    let mut letters = comment.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(char::is_uppercase)
}

fn source_files() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn enforce(rule: &Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = RuleCollector {
            rule,
            violations: Vec::new(),
        };
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(message) = collector.error_message(path) {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let files = source_files();
    for rule in &RULES {
        if let Err(e) = enforce(rule, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
