// src/command/args.rs

//! Argument quoting, joining and splitting for the two command line
//! conventions: POSIX shell words on Unix hosts, and the MSVC runtime rules
//! (as implemented by `CommandLineToArgvW`) on Windows.

use std::borrow::Cow;

use crate::command::os::OsType;
use crate::errors::{ProcctlError, Result};

/// Quote a single argument so that `split_args` on the same OS yields it back
/// unchanged.
pub fn quote_arg(arg: &str, os: OsType) -> Cow<'_, str> {
    if os.is_windows() {
        quote_windows(arg)
    } else {
        shell_words::quote(arg)
    }
}

/// Join arguments into one command line string for `os`.
pub fn join_args<S: AsRef<str>>(args: &[S], os: OsType) -> String {
    args.iter()
        .map(|a| quote_arg(a.as_ref(), os))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a user-entered argument string into separate arguments.
///
/// Unbalanced quotes are reported as `ProcctlError::CommandLine`.
pub fn split_args(input: &str, os: OsType) -> Result<Vec<String>> {
    if os.is_windows() {
        split_windows(input)
    } else {
        shell_words::split(input)
            .map_err(|e| ProcctlError::CommandLine(format!("cannot split '{input}': {e}")))
    }
}

fn quote_windows(arg: &str) -> Cow<'_, str> {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return Cow::Borrowed(arg);
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Escape every pending backslash plus the quote itself.
                out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    // Trailing backslashes would otherwise escape the closing quote.
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    Cow::Owned(out)
}

fn split_windows(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut have_arg = false;
    let mut in_quotes = false;
    let mut backslashes = 0usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                current.extend(std::iter::repeat_n('\\', backslashes / 2));
                if backslashes % 2 == 1 {
                    current.push('"');
                } else if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
                backslashes = 0;
                have_arg = true;
            }
            ' ' | '\t' if !in_quotes => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                if have_arg || !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
                have_arg = false;
            }
            _ => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                current.push(c);
                have_arg = true;
            }
        }
    }

    if in_quotes {
        return Err(ProcctlError::CommandLine(format!(
            "unterminated quote in '{input}'"
        )));
    }

    current.extend(std::iter::repeat_n('\\', backslashes));
    if have_arg || !current.is_empty() {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_quotes_only_when_needed() {
        assert_eq!(quote_arg("plain", OsType::Linux), "plain");
        assert_eq!(quote_arg("two words", OsType::Linux), "'two words'");
        assert_eq!(quote_arg("", OsType::Linux), "''");
    }

    #[test]
    fn unix_split_honours_quotes() {
        let args = split_args(r#"a 'b c' "d e" f\ g"#, OsType::Linux).unwrap();
        assert_eq!(args, vec!["a", "b c", "d e", "f g"]);
    }

    #[test]
    fn unix_split_rejects_unbalanced_quote() {
        assert!(split_args("echo 'oops", OsType::Linux).is_err());
    }

    #[test]
    fn windows_quoting_escapes_quotes_and_trailing_backslashes() {
        assert_eq!(quote_arg("plain", OsType::Windows), "plain");
        assert_eq!(quote_arg("a b", OsType::Windows), "\"a b\"");
        assert_eq!(quote_arg(r#"say "hi""#, OsType::Windows), r#""say \"hi\"""#);
        assert_eq!(quote_arg(r"C:\dir with space\", OsType::Windows), r#""C:\dir with space\\""#);
        assert_eq!(quote_arg("", OsType::Windows), "\"\"");
    }

    #[test]
    fn windows_split_follows_argv_rules() {
        let args = split_windows(r#"prog "a b" c\d "e\"f" g\\"h i" """#).unwrap();
        assert_eq!(args, vec!["prog", "a b", r"c\d", "e\"f", r"g\h i", ""]);
    }

    #[test]
    fn windows_join_then_split_restores_args() {
        let original = vec!["C:\\Program Files\\x.exe", "quote\"inside", "", "tail\\"];
        let joined = join_args(&original, OsType::Windows);
        assert_eq!(split_args(&joined, OsType::Windows).unwrap(), original);
    }
}
