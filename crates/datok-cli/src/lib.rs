// datok-cli: shared utilities for the `datok-convert` and `datok-tokenize`
// command-line tools.

use std::process;

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}

/// Check if a boolean toggle flag (either spelling) is present.
pub fn has_flag(args: &[String], long: &str, short: Option<&str>) -> bool {
    args.iter().any(|a| a == long || short.is_some_and(|s| a == s))
}

/// Extract a `--flag value` or `-f value` argument's value, along with the
/// args with both the flag and its value removed.
pub fn take_value(args: &[String], long: &str, short: Option<&str>) -> (Option<String>, Vec<String>) {
    let mut value = None;
    let mut remaining = Vec::with_capacity(args.len());
    let mut skip_next = false;

    for (i, arg) in args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if let Some(v) = arg.strip_prefix(&format!("{long}=")) {
            value = Some(v.to_string());
        } else if arg == long || short.is_some_and(|s| arg == s) {
            if i + 1 < args.len() {
                value = Some(args[i + 1].clone());
                skip_next = true;
            } else {
                fatal(&format!("{arg} requires a value"));
            }
        } else {
            remaining.push(arg.clone());
        }
    }

    (value, remaining)
}
