//! # CLI
//!
//! This module defines the command-line interface of `tether` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`
//! and arguments are valid JSON).
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tether",
    version,
    about = "Call HTTP APIs from a declarative JSON description"
)]
pub struct Cli {
    /// Overrides the base URL declared in the description (e.g. http://localhost:3000/api)
    #[arg(long, global = true, env = "TETHER_BASE_URL")]
    pub base_url: Option<String>,

    /// Header sent with every call, as 'name:value'. May be repeated.
    #[arg(short = 'H', long = "header", global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a service description and list its methods
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// tether describe api.json
    /// tether describe api.json echo
    /// ```
    Describe {
        /// Path to the JSON service description
        file: PathBuf,
        /// Only describe this method
        method: Option<String>,
    },

    /// Call one method of a service
    ///
    /// Arguments are given in declaration order, one `--arg` per parameter. Callback
    /// parameters are supplied by tether and must be left out.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// tether call api.json echo --arg 1
    /// tether call api.json upload --arg '"notes"' --arg @./report.pdf
    /// ```
    Call {
        /// Path to the JSON service description
        file: PathBuf,
        /// Name of the method to call
        method: String,
        /// A JSON argument, or '@path' to send a file as raw content
        #[arg(long = "arg", value_parser = parse_arg)]
        args: Vec<CliArg>,
    },
}

/// One `--arg` value.
#[derive(Debug, Clone, PartialEq)]
pub enum CliArg {
    Json(serde_json::Value),
    File(PathBuf),
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_arg(value: &str) -> Result<CliArg, String> {
    if let Some(path) = value.strip_prefix('@') {
        if path.is_empty() {
            return Err("Expected a file path after '@'".to_string());
        }
        return Ok(CliArg::File(PathBuf::from(path)));
    }

    serde_json::from_str(value)
        .map(CliArg::Json)
        .map_err(|e| format!("Invalid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_split_on_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b"),
            Ok(("Authorization".to_string(), "Bearer a:b".to_string()))
        );
        assert!(parse_header("no separator").is_err());
    }

    #[test]
    fn args_are_json_or_files() {
        assert_eq!(parse_arg("1"), Ok(CliArg::Json(json!(1))));
        assert_eq!(
            parse_arg(r#"{"a": [1, 2]}"#),
            Ok(CliArg::Json(json!({"a": [1, 2]})))
        );
        assert_eq!(
            parse_arg("@./report.pdf"),
            Ok(CliArg::File(PathBuf::from("./report.pdf")))
        );
        assert!(parse_arg("@").is_err());
        assert!(parse_arg("not json").is_err());
    }

    #[test]
    fn global_options_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "tether",
            "call",
            "api.json",
            "echo",
            "--arg",
            "1",
            "-H",
            "x-a: 1",
            "--base-url",
            "http://h",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://h"));
        assert_eq!(cli.headers, [("x-a".to_string(), "1".to_string())]);
        assert_eq!(cli.verbose, 2);
        let Commands::Call { method, args, .. } = cli.command else {
            panic!("expected a call");
        };
        assert_eq!(method, "echo");
        assert_eq!(args, [CliArg::Json(json!(1))]);
    }
}
