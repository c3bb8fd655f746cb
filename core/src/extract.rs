//! Extraction of compiler diagnostics from raw Maven build logs.
//!
//! Maven interleaves the compiler's output with its own `[INFO]`/`[WARNING]` chatter and repeats
//! the same errors in its final summary. [DiagnosticStream] walks the log line by line:
//!
//! 1. Nothing is collected before the first line that starts with `[ERROR]`.
//! 2. `[INFO]` and `[WARNING]` lines are skipped from then on.
//! 3. A line matching `[ERROR] /path/File.java:[line,col] message` starts a new diagnostic.
//! 4. Other lines are continuations of the diagnostic being accumulated, if there is one.
//! 5. Scanning stops at Maven's "-> [Help 1]" trailer, before the repeated summary.

use crate::diagnostic::{Diagnostic, DiagnosticLocation, FileDiagnosticMap, normalize_message};
use regex::Regex;
use std::mem;
use std::str::Lines;
use std::sync::LazyLock;
use tracing::debug;

const ERROR_MARKER: &str = "[ERROR]";
const NOISE_MARKERS: [&str; 2] = ["[INFO]", "[WARNING]"];
const TERMINAL_MARKERS: [&str; 2] = ["-> [Help 1]", "To see the full stack trace of the errors"];
const GOAL_FAILURE: &str = "Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin";

static DIAGNOSTIC_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[ERROR\]\s+(/.*?\.java):\[(\d+),(\d+)\](.*)$").expect("invalid regex")
});

/// Extracts every diagnostic in `raw_log`, grouped by file and de-duplicated.
///
/// Never fails: a log with no recognizable diagnostics yields an empty map.
pub fn extract(raw_log: &str) -> FileDiagnosticMap {
    let map: FileDiagnosticMap = diagnostics(raw_log).collect();
    debug!(
        files = map.file_count(),
        diagnostics = map.diagnostic_count(),
        "extracted diagnostics"
    );
    map
}

/// Lazily yields the diagnostics in `raw_log` in log order. Duplicates are not removed.
pub fn diagnostics(raw_log: &str) -> DiagnosticStream<'_> {
    DiagnosticStream {
        lines: raw_log.lines(),
        state: ScanState::Preamble,
    }
}

/// Iterator over the diagnostics of a log. See the module documentation for the rules.
pub struct DiagnosticStream<'a> {
    lines: Lines<'a>,
    state: ScanState,
}

enum ScanState {
    /// No `[ERROR]` line seen yet.
    Preamble,
    /// Inside the error region, no diagnostic open.
    Scanning,
    Accumulating(PendingDiagnostic),
    /// Past the terminal marker.
    Done,
}

struct PendingDiagnostic {
    location: DiagnosticLocation,
    text: String,
}

impl PendingDiagnostic {
    fn start(location: DiagnosticLocation, head: String) -> PendingDiagnostic {
        PendingDiagnostic {
            location,
            text: head,
        }
    }

    /// Appends a continuation fragment unless it is empty or already part of the message.
    fn push(&mut self, fragment: &str) {
        let fragment = normalize_message(fragment);
        if fragment.is_empty() || self.text.contains(&fragment) {
            return;
        }
        self.text.push(' ');
        self.text.push_str(&fragment);
    }

    fn finish(self) -> Option<Diagnostic> {
        Diagnostic::new(self.location, &self.text)
    }
}

impl Iterator for DiagnosticStream<'_> {
    type Item = Diagnostic;

    fn next(&mut self) -> Option<Diagnostic> {
        loop {
            if let ScanState::Done = self.state {
                return None;
            }
            let Some(line) = self.lines.next() else {
                return match mem::replace(&mut self.state, ScanState::Done) {
                    ScanState::Accumulating(pending) => pending.finish(),
                    _ => None,
                };
            };
            let state = mem::replace(&mut self.state, ScanState::Done);
            let (next, emitted) = transition(state, line);
            self.state = next;
            if emitted.is_some() {
                return emitted;
            }
        }
    }
}

fn transition(state: ScanState, line: &str) -> (ScanState, Option<Diagnostic>) {
    let marked = line.trim_start();
    let state = match state {
        ScanState::Done => return (ScanState::Done, None),
        ScanState::Preamble if !marked.starts_with(ERROR_MARKER) => {
            return (ScanState::Preamble, None);
        }
        ScanState::Preamble => ScanState::Scanning,
        state => state,
    };
    let pending = match state {
        ScanState::Accumulating(pending) => Some(pending),
        _ => None,
    };

    if TERMINAL_MARKERS.iter().any(|m| line.contains(m)) {
        return (ScanState::Done, pending.and_then(PendingDiagnostic::finish));
    }
    if NOISE_MARKERS.iter().any(|m| marked.starts_with(m)) {
        return (resume(pending), None);
    }
    if let Some((location, head)) = parse_start(marked) {
        let started = ScanState::Accumulating(PendingDiagnostic::start(location, head));
        return (started, pending.and_then(PendingDiagnostic::finish));
    }
    let Some(mut pending) = pending else {
        return (ScanState::Scanning, None);
    };
    let fragment = marked.strip_prefix(ERROR_MARKER).unwrap_or(marked);
    let fragment = match fragment.find(GOAL_FAILURE) {
        Some(i) => &fragment[..i],
        None => fragment,
    };
    pending.push(fragment);
    (ScanState::Accumulating(pending), None)
}

fn resume(pending: Option<PendingDiagnostic>) -> ScanState {
    match pending {
        Some(pending) => ScanState::Accumulating(pending),
        None => ScanState::Scanning,
    }
}

/// Recognizes a diagnostic start line, returning its location and the message head
/// (`[line,col]` or `[line,col]: text`).
fn parse_start(line: &str) -> Option<(DiagnosticLocation, String)> {
    let captures = DIAGNOSTIC_START.captures(line)?;
    let line_number: u32 = captures[2].parse().ok()?;
    let column: u32 = captures[3].parse().ok()?;
    let rest = captures[4].trim();
    let rest = rest.strip_prefix(':').map(str::trim_start).unwrap_or(rest);
    let locator = format!("[{line_number},{column}]");
    let head = match rest {
        "" => locator,
        rest => format!("{locator}: {rest}"),
    };
    let location = DiagnosticLocation {
        file_path: captures[1].to_string(),
        line: line_number,
        column,
    };
    Some((location, head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAVEN_LOG: &str = "\
[INFO] Scanning for projects...
[INFO] --- maven-compiler-plugin:3.8.1:compile (default-compile) @ demo ---
[WARNING] /app/src/main/java/demo/Old.java: uses unchecked or unsafe operations.
[INFO] -------------------------------------------------------------
[ERROR] COMPILATION ERROR :
[INFO] -------------------------------------------------------------
[ERROR] /app/src/main/java/demo/Bar.java:[3,5] cannot find symbol
  symbol:   method foo()
  location: class Bar
[ERROR] /app/src/main/java/demo/Baz.java:[10,1] package org.lib does not exist
[INFO] 2 errors
[INFO] -------------------------------------------------------------
[INFO] BUILD FAILURE
[ERROR] Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin:3.8.1:compile (default-compile) on project demo: Compilation failure: Compilation failure:
[ERROR] /app/src/main/java/demo/Bar.java:[3,5] cannot find symbol
[ERROR]   symbol:   method foo()
[ERROR]   location: class Bar
[ERROR] /app/src/main/java/demo/Baz.java:[10,1] package org.lib does not exist
[ERROR] -> [Help 1]
[ERROR] /app/src/main/java/demo/Ignored.java:[1,1] after the trailer
";

    #[test]
    fn full_maven_log() {
        let map = extract(MAVEN_LOG);
        assert_eq!(
            map.file_paths().collect::<Vec<_>>(),
            [
                "/app/src/main/java/demo/Bar.java",
                "/app/src/main/java/demo/Baz.java"
            ]
        );
        let bar = map.get("/app/src/main/java/demo/Bar.java").unwrap();
        assert_eq!(bar.len(), 1);
        assert_eq!(
            bar[0].message,
            "[3,5]: cannot find symbol symbol: method foo() location: class Bar"
        );
        assert_eq!((bar[0].location.line, bar[0].location.column), (3, 5));
        let baz = map.get("/app/src/main/java/demo/Baz.java").unwrap();
        assert_eq!(baz[0].message, "[10,1]: package org.lib does not exist");
        assert!(!map.contains_file("/app/src/main/java/demo/Ignored.java"));
    }

    #[test]
    fn stream_yields_summary_repeats() {
        // Only the map removes duplicates.
        assert_eq!(diagnostics(MAVEN_LOG).count(), 4);
    }

    #[test]
    fn nothing_before_first_error_line() {
        let log = "\
/app/src/main/java/demo/Bar.java:[3,5] cannot find symbol
[INFO] BUILD FAILURE
";
        assert!(extract(log).is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn info_lines_do_not_break_accumulation() {
        let log = "\
[ERROR] /a/B.java:[1,2] incompatible types
[INFO] noise
  required: int
[WARNING] more noise
  found:    java.lang.String
";
        let map = extract(log);
        assert_eq!(
            map.get("/a/B.java").unwrap()[0].message,
            "[1,2]: incompatible types required: int found: java.lang.String"
        );
    }

    #[test]
    fn empty_body_keeps_locator() {
        let map = extract("[ERROR] /a/B.java:[7,9]\n");
        assert_eq!(map.get("/a/B.java").unwrap()[0].message, "[7,9]");
    }

    #[test]
    fn goal_failure_text_is_truncated() {
        let log = "\
[ERROR] /a/B.java:[1,1] cannot find symbol
[ERROR] symbol: class X Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin:3.8.1
";
        let map = extract(log);
        assert_eq!(
            map.get("/a/B.java").unwrap()[0].message,
            "[1,1]: cannot find symbol symbol: class X"
        );
    }

    #[test]
    fn standalone_goal_failure_line_adds_nothing() {
        let log = "\
[ERROR] /a/B.java:[1,1] cannot find symbol
[ERROR] Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin:3.8.1:compile
";
        assert_eq!(
            extract(log).get("/a/B.java").unwrap()[0].message,
            "[1,1]: cannot find symbol"
        );
    }

    #[test]
    fn repeated_continuation_is_not_appended_twice() {
        let log = "\
[ERROR] /a/B.java:[1,1] cannot find symbol
  symbol: class X
[ERROR]   symbol: class X
";
        assert_eq!(
            extract(log).get("/a/B.java").unwrap()[0].message,
            "[1,1]: cannot find symbol symbol: class X"
        );
    }

    #[test]
    fn nothing_after_help_trailer() {
        let log = "\
[ERROR] /a/B.java:[3,5] cannot find symbol
[ERROR] -> [Help 1]
[ERROR] /a/C.java:[1,1] unused
";
        let map = extract(log);
        assert_eq!(map.file_paths().collect::<Vec<_>>(), ["/a/B.java"]);
        assert_eq!(map.diagnostic_count(), 1);
    }

    #[test]
    fn unmarked_continuation_lines_are_joined() {
        let log = "\
[ERROR] /a/B.java:[3,5] cannot find symbol
  symbol: method foo()
  location: class Bar
";
        let map = extract(log);
        assert_eq!(map.diagnostic_count(), 1);
        assert_eq!(
            map.get("/a/B.java").unwrap()[0].message,
            "[3,5]: cannot find symbol symbol: method foo() location: class Bar"
        );
    }

    #[test]
    fn stops_at_stack_trace_hint() {
        let log = "\
[ERROR] /a/B.java:[1,1] first
[ERROR] To see the full stack trace of the errors, re-run Maven with the -e switch.
[ERROR] /a/C.java:[1,1] second
";
        let map = extract(log);
        assert_eq!(map.file_count(), 1);
        assert!(map.contains_file("/a/B.java"));
    }

    #[test]
    fn non_java_paths_are_not_diagnostics() {
        let log = "[ERROR] /a/pom.xml:[1,1] malformed\n[ERROR] /a/B.java:[2,3] real\n";
        let map = extract(log);
        assert_eq!(map.file_paths().collect::<Vec<_>>(), ["/a/B.java"]);
    }

    #[test]
    fn concatenated_summary_adds_nothing() {
        let start = MAVEN_LOG.find("[ERROR] Failed to execute goal").unwrap();
        let end = MAVEN_LOG.find("[ERROR] -> [Help 1]").unwrap();
        let summary = &MAVEN_LOG[start..end];
        let once = extract(summary);
        assert_eq!(once.diagnostic_count(), 2);
        assert_eq!(once, extract(&format!("{summary}{summary}")));
    }

    fn diagnostic_line() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["/a/A.java", "/a/B.java", "/c/d/E.java"]),
            1u32..500,
            1u32..80,
            prop::sample::select(vec![
                "cannot find symbol",
                "package org.x does not exist",
                "incompatible types",
                "",
            ]),
        )
            .prop_map(|(path, line, col, text)| format!("[ERROR] {path}:[{line},{col}] {text}\n"))
    }

    fn log_line() -> impl Strategy<Value = String> {
        prop_oneof![
            diagnostic_line(),
            Just("  symbol:   class Foo\n".to_string()),
            Just("  location: package org.x\n".to_string()),
            Just("[INFO] BUILD FAILURE\n".to_string()),
            Just("[WARNING] deprecated\n".to_string()),
        ]
    }

    fn preamble_line() -> impl Strategy<Value = String> {
        prop_oneof![
            log_line(),
            Just("Downloading org.lib:lib:2.0\n".to_string()),
            Just("  symbol:   class Widget\n".to_string()),
        ]
    }

    #[test]
    fn leading_continuation_without_trailer_changes_on_doubling() {
        let log = "  symbol:   class Widget\n[ERROR] /a/A.java:[1,1] cannot find symbol\n";
        let once = extract(log);
        let twice = extract(&format!("{log}{log}"));
        assert_eq!(
            once.get("/a/A.java").unwrap()[0].message,
            "[1,1]: cannot find symbol"
        );
        assert_ne!(once, twice);

        let trailed = format!("{log}[ERROR] -> [Help 1]\n");
        assert_eq!(once, extract(&format!("{trailed}{trailed}")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn doubling_a_log_is_idempotent(
            first in diagnostic_line(),
            rest in prop::collection::vec(log_line(), 0..20),
        ) {
            // Without the trailer, a log must open with a diagnostic: leading continuation text
            // would attach to the last diagnostic of the first copy.
            let log: String = std::iter::once(first).chain(rest).collect();
            let once = extract(&log);
            let twice = extract(&format!("{log}{log}"));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn doubling_a_log_with_trailer_is_idempotent(
            preamble in prop::collection::vec(preamble_line(), 0..4),
            body in prop::collection::vec(log_line(), 0..20),
        ) {
            let log = format!("{}{}[ERROR] -> [Help 1]\n", preamble.concat(), body.concat());
            let once = extract(&log);
            let twice = extract(&format!("{log}{log}"));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn every_file_has_a_diagnostic(lines in prop::collection::vec(log_line(), 0..30)) {
            let map = extract(&lines.concat());
            for (path, diagnostics) in map.iter() {
                prop_assert!(!diagnostics.is_empty());
                prop_assert!(diagnostics.iter().all(|d| d.file_path() == path));
            }
        }
    }
}
