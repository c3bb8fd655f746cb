//! Construction of the repair request for one file.

use crate::release_notes::ReleaseNote;
use bumpfix_core::diagnostic::Diagnostic;
use bumpfix_core::repair::LibraryContext;
use serde::Serialize;

#[derive(Serialize)]
struct FileBody<'a> {
    target_file: &'a str,
    current_content: &'a str,
}

/// Returns the user messages of the request, in order: task, errors, release notes (when
/// any), file.
pub fn messages(
    file_content: &str,
    file_name: &str,
    diagnostics: &[Diagnostic],
    library: &LibraryContext,
    notes: &[ReleaseNote],
) -> Result<Vec<String>, serde_json::Error> {
    let mut messages = vec![format!(
        "The project stopped compiling after the dependency {} was upgraded from {} to {}. \
         Fix the compilation errors in the target Java file specified below.",
        library.name, library.base_version, library.new_version
    )];

    let mut errors = format!("Compilation errors in {file_name}:\n");
    for diagnostic in diagnostics {
        errors.push_str(&format!("- {}\n", diagnostic.message));
    }
    messages.push(errors);

    if !notes.is_empty() {
        let mut section = format!(
            "Release notes of {} for versions after {} up to {}:\n",
            library.name, library.base_version, library.new_version
        );
        for note in notes {
            section.push_str(&format!("\n## {}\n{}\n", note.version, note.details.trim()));
        }
        messages.push(section);
    }

    messages.push(serde_json::to_string(&FileBody {
        target_file: file_name,
        current_content: file_content,
    })?);
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpfix_core::diagnostic::DiagnosticLocation;

    fn library() -> LibraryContext {
        LibraryContext {
            name: "org.example".into(),
            base_version: "1.0".into(),
            new_version: "2.0".into(),
        }
    }

    fn diagnostic(message: &str) -> Diagnostic {
        let location = DiagnosticLocation {
            file_path: "/app/src/Foo.java".into(),
            line: 3,
            column: 5,
        };
        Diagnostic::new(location, message).unwrap()
    }

    #[test]
    fn without_release_notes() {
        let messages = messages(
            "class Foo {}",
            "Foo.java",
            &[diagnostic("[3,5]: cannot find symbol")],
            &library(),
            &[],
        )
        .unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("org.example was upgraded from 1.0 to 2.0"));
        assert_eq!(messages[1], "Compilation errors in Foo.java:\n- [3,5]: cannot find symbol\n");
        let body: serde_json::Value = serde_json::from_str(&messages[2]).unwrap();
        assert_eq!(body["target_file"], "Foo.java");
        assert_eq!(body["current_content"], "class Foo {}");
    }

    #[test]
    fn release_notes_come_before_the_file() {
        let notes = [ReleaseNote {
            version: "1.5".into(),
            details: "Widget.old() was removed; use Widget.current().\n".into(),
        }];
        let messages = messages("class Foo {}", "Foo.java", &[], &library(), &notes).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(messages[2].contains("## 1.5\nWidget.old() was removed; use Widget.current().\n"));
    }
}
