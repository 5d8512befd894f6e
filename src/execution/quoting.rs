//! Conversion between argument vectors and shell command lines.
//!
//! Only what is needed to move a command between its two forms: POSIX
//! quoting and splitting through `shell-words`, plus MSVCRT-style joining on
//! Windows. No expansion of any kind is performed.

use std::borrow::Cow;

use crate::error::CmdError;
use crate::Result;

/// Quote a single argument for a POSIX shell.
pub fn quote(arg: &str) -> Cow<'_, str> {
    shell_words::quote(arg)
}

/// Join an argument vector into a POSIX shell command line.
pub fn join_posix<S: AsRef<str>>(argv: &[S]) -> String {
    shell_words::join(argv)
}

/// Join an argument vector following the MSVCRT parsing rules.
pub fn join_windows<S: AsRef<str>>(argv: &[S]) -> String {
    let mut line = String::new();

    for (i, arg) in argv.iter().enumerate() {
        let arg = arg.as_ref();
        if i > 0 {
            line.push(' ');
        }

        let needs_quotes = arg.is_empty() || arg.contains([' ', '\t']);
        if needs_quotes {
            line.push('"');
        }

        let mut backslashes = 0usize;
        for c in arg.chars() {
            match c {
                '\\' => backslashes += 1,
                '"' => {
                    // Backslashes preceding a quote are doubled, then the quote escaped.
                    line.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                    line.push('"');
                    backslashes = 0;
                }
                _ => {
                    line.extend(std::iter::repeat('\\').take(backslashes));
                    backslashes = 0;
                    line.push(c);
                }
            }
        }

        if needs_quotes {
            line.extend(std::iter::repeat('\\').take(backslashes * 2));
            line.push('"');
        } else {
            line.extend(std::iter::repeat('\\').take(backslashes));
        }
    }

    line
}

/// Join an argument vector for the host shell.
pub fn join<S: AsRef<str>>(argv: &[S]) -> String {
    if crate::platform::WIN32 {
        join_windows(argv)
    } else {
        join_posix(argv)
    }
}

/// Split a command line into words using POSIX quoting rules.
///
/// Fails on an unterminated quote or a trailing escape.
pub fn split(line: &str) -> Result<Vec<String>> {
    if ends_with_escape(line) {
        return Err(CmdError::InvalidArgument(format!(
            "trailing backslash in command line: {line}"
        )));
    }
    shell_words::split(line)
        .map_err(|e| CmdError::InvalidArgument(format!("{e} in command line: {line}")))
}

/// Whether the line ends in a backslash that escapes nothing.
///
/// `shell-words` keeps such a backslash as a literal character.
fn ends_with_escape(line: &str) -> bool {
    let mut single = false;
    let mut double = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !single => escaped = true,
            '\'' if !double => single = !single,
            '"' if !single => double = !double,
            _ => {}
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_safe_word() {
        assert_eq!(quote("hello"), "hello");
        assert_eq!(quote("/usr/bin/env"), "/usr/bin/env");
    }

    #[test]
    fn test_quote_special() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("hello world"), "'hello world'");
        assert_eq!(quote("$HOME"), "'$HOME'");
        assert_eq!(split(&quote("it's")).unwrap(), vec!["it's"]);
    }

    #[test]
    fn test_join_posix() {
        let line = join_posix(&["echo", "a b", "c"]);
        assert_eq!(line, "echo 'a b' c");
    }

    #[test]
    fn test_join_windows() {
        assert_eq!(join_windows(&["dir", "C:\\Program Files"]), r#"dir "C:\Program Files""#);
        assert_eq!(join_windows(&["echo", ""]), r#"echo """#);
        assert_eq!(join_windows(&[r#"say"hi"#]), r#"say\"hi"#);
        assert_eq!(join_windows(&["a b\\"]), r#""a b\\""#);
        assert_eq!(join_windows(&["a\\b"]), r#"a\b"#);
    }

    #[test]
    fn test_split_plain() {
        assert_eq!(split("ls -la  /tmp").unwrap(), vec!["ls", "-la", "/tmp"]);
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_quotes() {
        assert_eq!(
            split(r#"echo 'a b' "c d" e\ f"#).unwrap(),
            vec!["echo", "a b", "c d", "e f"]
        );
        assert_eq!(split(r#"echo "x\"y""#).unwrap(), vec!["echo", "x\"y"]);
        assert_eq!(split("echo ''").unwrap(), vec!["echo", ""]);
        assert_eq!(split("a'b'c").unwrap(), vec!["abc"]);
    }

    #[test]
    fn test_split_errors() {
        assert!(split("echo 'open").is_err());
        assert!(split("echo \"open").is_err());
        assert!(split("echo \\").is_err());
        assert!(split("a\\\\\\").is_err());
    }

    #[test]
    fn test_split_escaped_backslash_is_fine() {
        assert_eq!(split(r"echo a\\").unwrap(), vec!["echo", "a\\"]);
        assert_eq!(split(r"echo '\'").unwrap(), vec!["echo", "\\"]);
        assert_eq!(split(r#"echo "it's""#).unwrap(), vec!["echo", "it's"]);
    }

    #[test]
    fn test_split_inverts_join() {
        let argv = vec!["printf", "%s\n", "it's", "", "$x y"];
        assert_eq!(split(&join_posix(&argv)).unwrap(), argv);
    }
}
