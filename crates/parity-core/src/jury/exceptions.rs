//! Detection of unhandled-exception banners in captured agent output.
//!
//! Only fatal idioms count. A bare "error" word is ignored unless it is part
//! of one of the stronger markers below.

use std::sync::OnceLock;

use regex::Regex;

const MARKERS: &[(&str, &str)] = &[
    ("java unhandled exception", r#"Exception in thread "[^"]*""#),
    ("java stack frame", r"(?m)^\s+at [\w$.<>]+\([\w$]+\.java:\d+\)"),
    ("python traceback", r"Traceback \(most recent call last\):"),
    ("rust panic", r"thread '[^']*' panicked at"),
    ("node uncaught", r"(?m)^Uncaught \w*(Error|Exception)\b"),
    ("unhandled exception", r"(?im)^\s*unhandled (?:exception|rejection)\s*[.:]"),
    ("qualified exception", r"(?m)^\s*(?:[a-z_][\w$]*\.)+[A-Z]\w*(?:Exception|Error): "),
    ("python error line", r"(?m)^[A-Z]\w*(?:Exception|Error): "),
    ("segfault", r"(?i)segmentation fault( \(core dumped\))?"),
    ("fatal error", r"(?m)^FATAL ERROR\b"),
];

fn compiled() -> &'static [(&'static str, Regex)] {
    static MATCHERS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        MARKERS
            .iter()
            .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
            .collect()
    })
}

/// A recognised exception marker and the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionMarker {
    pub label: &'static str,
    pub line: String,
}

/// First exception marker in `output`, if any.
pub fn find_exception(output: &str) -> Option<ExceptionMarker> {
    compiled().iter().find_map(|(label, re)| {
        re.find(output).map(|m| {
            let line_start = output[..m.start()].rfind('\n').map_or(0, |i| i + 1);
            let line_end = output[m.end()..]
                .find('\n')
                .map_or(output.len(), |i| m.end() + i);
            ExceptionMarker {
                label,
                line: output[line_start..line_end].trim().to_string(),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_exception_banner() {
        let out = "compiling\nException in thread \"main\" java.lang.NullPointerException\n\tat App.main(App.java:3)\n";
        let marker = find_exception(out).unwrap();
        assert_eq!(marker.label, "java unhandled exception");
        assert!(marker.line.contains("NullPointerException"));
    }

    #[test]
    fn test_python_traceback() {
        let out = "Traceback (most recent call last):\n  File \"x.py\", line 1\nValueError: bad";
        assert_eq!(find_exception(out).unwrap().label, "python traceback");
    }

    #[test]
    fn test_rust_panic() {
        let out = "thread 'main' panicked at src/main.rs:2:5:\nboom";
        assert_eq!(find_exception(out).unwrap().label, "rust panic");
    }

    #[test]
    fn test_bare_error_word_is_not_fatal() {
        assert!(find_exception("0 errors, 0 warnings").is_none());
        assert!(find_exception("Error handling looks fine. error: none").is_none());
        assert!(find_exception("Fixed the error in parser.rs").is_none());
    }

    #[test]
    fn test_unhandled_banner_needs_line_start() {
        let out = "build ok\nUnhandled exception. System.NullReferenceException: oops\n";
        let marker = find_exception(out).unwrap();
        assert_eq!(marker.label, "unhandled exception");
        assert!(marker.line.starts_with("Unhandled exception."));
        assert_eq!(
            find_exception("Unhandled rejection: timeout\n").unwrap().label,
            "unhandled exception"
        );

        assert!(find_exception("added handling for the unhandled exception case").is_none());
        assert!(find_exception("Unhandled exception paths are now logged").is_none());
    }
}
