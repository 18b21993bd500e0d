use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashSet, fmt, io::BufRead};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("lint report could not be read")]
    Io(#[from] std::io::Error),
}

/// Messages that are known noise for this codebase and never annotated.
static SUPPRESSED: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Class '.*' has a constructor with 1 argument that is not explicit",
        r"Consider using std::transform",
        r"The function '.*' is never used",
        r"Class '.*' does not have a .* which is recommended since it has dynamic memory",
        r"Member variable '.*' is in the wrong place in the initializer list",
        r"^\(information\)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// One report line: `[file:line]` callstack (optionally a second frame),
/// then `(severity) message`.
static DIAGNOSTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^:\]]+):([0-9]+)\](?:.*\[([^:\]]+):([0-9]+)\])?.*(\([^)]+\))\s(.*?)$").unwrap()
});

/// A diagnostic surviving suppression, attributed to the first callstack
/// frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Annotation {
    /// CI-consumable annotation line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "::warning file={},line={}::{}",
            self.file, self.line, self.message
        )
    }
}

/// Everything a report scan produced: annotations to emit and the noise
/// that was filtered out.
#[derive(Debug, Default)]
pub struct ReportOutcome {
    pub annotations: Vec<Annotation>,
    pub suppressed: Vec<String>,
}

impl ReportOutcome {
    /// the verdict: a report passes when nothing was annotated
    pub fn passed(&self) -> bool {
        self.annotations.is_empty()
    }
}

fn is_suppressed(line: &str) -> bool {
    SUPPRESSED.iter().any(|pattern| pattern.is_match(line))
}

/// Parse one report line into an annotation, filtered by the files of
/// interest. Lines touching none of them produce nothing.
fn parse_line(line: &str, files_of_interest: &HashSet<String>) -> Option<Annotation> {
    let captures = match DIAGNOSTIC.captures(line) {
        Some(captures) => captures,
        None => {
            warn!(%line, "Line did not match the diagnostic shape");
            return None;
        }
    };

    let first_file = captures.get(1)?.as_str();
    let first_line: u32 = captures.get(2)?.as_str().parse().ok()?;
    let category = captures.get(5)?.as_str();
    let message = captures.get(6)?.as_str();

    let second = match (captures.get(3), captures.get(4)) {
        (Some(file), Some(line)) => Some((file.as_str(), line.as_str())),
        _ => None,
    };

    let relevant = files_of_interest.contains(first_file)
        || second.is_some_and(|(file, _)| files_of_interest.contains(file));
    if !relevant {
        return None;
    }

    // a second frame is carried in the message, the annotation sticks to
    // the first one
    let message = match second {
        Some((file, line)) => format!("[{file}:{line}]: {category} {message}"),
        None => format!("{category} {message}"),
    };

    Some(Annotation {
        file: first_file.to_owned(),
        line: first_line,
        message,
    })
}

/// Scan a lint report: suppress known noise, keep diagnostics touching the
/// files of interest.
pub fn scan_report(
    reader: impl BufRead,
    files_of_interest: &HashSet<String>,
) -> Result<ReportOutcome, ReportError> {
    let mut outcome = ReportOutcome::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        if is_suppressed(&line) {
            outcome.suppressed.push(line);
        } else if let Some(annotation) = parse_line(&line, files_of_interest) {
            outcome.annotations.push(annotation);
        }
    }

    Ok(outcome)
}

/// Files of interest from CSV lists of modified and added paths; the first
/// row of each list is a header and skipped.
pub fn files_of_interest(lists: &[&str]) -> HashSet<String> {
    let mut files = HashSet::new();

    for list in lists {
        for row in list.lines().skip(1) {
            files.extend(
                row.split(',')
                    .map(str::trim)
                    .filter(|cell| !cell.is_empty())
                    .map(str::to_owned),
            );
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn interest(files: &[&str]) -> HashSet<String> {
        files.iter().map(|file| file.to_string()).collect()
    }

    #[test]
    fn single_frame_diagnostics_annotate_the_named_file() {
        let report = "[src/Engine/Audio/SoundPlayer.cpp:42]: (style) Variable 'volume' is assigned a value that is never used.\n";
        let outcome = scan_report(
            Cursor::new(report),
            &interest(&["src/Engine/Audio/SoundPlayer.cpp"]),
        )
        .unwrap();

        assert_eq!(outcome.annotations.len(), 1);
        let annotation = &outcome.annotations[0];
        assert_eq!(annotation.file, "src/Engine/Audio/SoundPlayer.cpp");
        assert_eq!(annotation.line, 42);
        assert_eq!(
            annotation.to_string(),
            "::warning file=src/Engine/Audio/SoundPlayer.cpp,line=42::(style) Variable 'volume' is assigned a value that is never used."
        );
        assert!(!outcome.passed());
    }

    #[test]
    fn two_frame_diagnostics_attach_to_the_first_frame() {
        let report = "[src/Engine/EngineCore.cpp:10] -> [src/Engine/EngineCore.hpp:55]: (warning) Member variable 'm_Timer' is not initialized in the constructor.\n";
        let outcome =
            scan_report(Cursor::new(report), &interest(&["src/Engine/EngineCore.hpp"])).unwrap();

        assert_eq!(outcome.annotations.len(), 1);
        let annotation = &outcome.annotations[0];
        assert_eq!(annotation.file, "src/Engine/EngineCore.cpp");
        assert_eq!(annotation.line, 10);
        assert!(annotation
            .message
            .starts_with("[src/Engine/EngineCore.hpp:55]: (warning)"));
    }

    #[test]
    fn known_noise_is_suppressed_not_annotated() {
        let report = "\
[src/a.cpp:1]: (style) Class 'Vec3' has a constructor with 1 argument that is not explicit\n\
[src/a.cpp:2]: (style) The function 'Unused' is never used\n\
(information) Cppcheck cannot find all the include files\n";
        let outcome = scan_report(Cursor::new(report), &interest(&["src/a.cpp"])).unwrap();

        assert!(outcome.passed());
        assert_eq!(outcome.suppressed.len(), 3);
    }

    #[test]
    fn uninteresting_files_produce_no_annotations() {
        let report = "[vendor/imgui/imgui.cpp:9]: (style) C-style pointer casting\n";
        let outcome = scan_report(Cursor::new(report), &interest(&["src/a.cpp"])).unwrap();

        assert!(outcome.passed());
        assert!(outcome.suppressed.is_empty());
    }

    #[test]
    fn csv_lists_skip_headers_and_merge() {
        let modified = "path\nsrc/a.cpp,src/b.cpp\nsrc/c.cpp\n";
        let added = "path\nsrc/d.cpp\n";

        let files = files_of_interest(&[modified, added]);
        assert_eq!(
            files,
            interest(&["src/a.cpp", "src/b.cpp", "src/c.cpp", "src/d.cpp"])
        );
    }

    #[test]
    fn empty_lists_mean_no_files_of_interest() {
        assert!(files_of_interest(&[]).is_empty());
        assert!(files_of_interest(&["path\n"]).is_empty());
    }
}
