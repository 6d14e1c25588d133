//! Worker argument vectors
//!
//! Common flags come first, then the subcommand and its arguments:
//!
//! ```text
//! --number <N> --winwidth <W> --case-matching <smart|ignore> [--par-run] [--icon <kind>]
//!     filter <query> [--sync] [--cmd <shell-cmd> | --input <file>] --cmd-dir <dir>
//!     grep <query> (--cmd <grep-cmd> | --input <file>) --cmd-dir <dir>
//!     tags <query> --files=<tagfile>... --cmd-dir <dir>
//! ```
//!
//! The working directory is always passed, whatever the input.

use super::SearchMode;
use crate::config::{FinderConfig, SessionOptions};
use crate::error::SpawnError;
use std::path::Path;

/// The result cap grows by this factor when the worker runs in parallel
const PAR_RUN_FACTOR: usize = 2;

/// Where the worker reads its candidates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobInput<'a> {
    /// Run the source command itself
    Enumerate,
    /// Read a forerunner temp file
    TempFile(&'a Path),
    /// Read candidates piped to stdin
    Stdin,
}

/// Number of results requested from the worker
pub fn result_cap(options: &SessionOptions, config: &FinderConfig) -> usize {
    let lines = options
        .display_lines
        .unwrap_or(config.default_display_lines)
        .max(1);
    let cap = if config.par_run {
        lines.saturating_mul(PAR_RUN_FACTOR)
    } else {
        lines
    };
    cap.min(config.max_results)
}

/// Builds the worker argument vector for `query`
pub fn build_worker_args(
    query: &str,
    options: &SessionOptions,
    config: &FinderConfig,
    input: JobInput<'_>,
) -> Result<Vec<String>, SpawnError> {
    let winwidth = options.winwidth.unwrap_or(config.default_winwidth);

    let mut args = vec![
        "--number".to_string(),
        result_cap(options, config).to_string(),
        "--winwidth".to_string(),
        winwidth.to_string(),
        "--case-matching".to_string(),
        options.case_matching().as_str().to_string(),
    ];

    if config.par_run {
        args.push("--par-run".to_string());
    }

    if options.enable_icon {
        args.push("--icon".to_string());
        args.push(options.mode.icon().to_string());
    }

    args.push(options.mode.subcommand().to_string());
    args.push(query.to_string());

    let cmd_dir = options.working_dir.display().to_string();

    match &options.mode {
        SearchMode::StaticFilter(source) => {
            args.push("--sync".to_string());
            match input {
                JobInput::Enumerate => {
                    push_pair(&mut args, "--cmd", source.shell_command(config));
                }
                JobInput::TempFile(path) => {
                    push_pair(&mut args, "--input", &path.display().to_string());
                }
                JobInput::Stdin => {}
            }
            push_pair(&mut args, "--cmd-dir", &cmd_dir);
        }
        SearchMode::DynamicList => {
            let source_cmd = options
                .source_cmd
                .as_deref()
                .filter(|cmd| !cmd.trim().is_empty())
                .ok_or_else(|| SpawnError::InvalidArgs {
                    message: "dynamic list requires a source command".to_string(),
                })?;
            push_pair(&mut args, "--cmd", source_cmd);
            push_pair(&mut args, "--cmd-dir", &cmd_dir);
        }
        SearchMode::LiveGrep => {
            match input {
                JobInput::Enumerate => push_pair(&mut args, "--cmd", &config.grep_command),
                JobInput::TempFile(path) => {
                    push_pair(&mut args, "--input", &path.display().to_string())
                }
                JobInput::Stdin => {}
            }
            push_pair(&mut args, "--cmd-dir", &cmd_dir);
        }
        SearchMode::Tags => {
            if options.tag_files.is_empty() {
                return Err(SpawnError::InvalidArgs {
                    message: "tags search requires at least one tag file".to_string(),
                });
            }
            args.extend(
                options
                    .tag_files
                    .iter()
                    .map(|file| format!("--files={}", file.display())),
            );
            push_pair(&mut args, "--cmd-dir", &cmd_dir);
        }
    }

    Ok(args)
}

/// The complete worker command line for `query`, program first.
///
/// Checks the configuration before building anything.
pub fn worker_command(
    query: &str,
    options: &SessionOptions,
    config: &FinderConfig,
) -> crate::Result<Vec<String>> {
    config.validate()?;
    let mut argv = vec![config.worker_program.clone()];
    argv.extend(build_worker_args(query, options, config, JobInput::Enumerate)?);
    Ok(argv)
}

fn push_pair(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SourceKind;
    use std::path::PathBuf;

    fn files_options() -> SessionOptions {
        SessionOptions::new("/repo", SearchMode::StaticFilter(SourceKind::Files))
            .with_winwidth(80)
            .with_display_lines(20)
    }

    #[test]
    fn test_static_filter_enumerates_with_cmd_and_dir() {
        let config = FinderConfig::default();
        let args = build_worker_args("fo", &files_options(), &config, JobInput::Enumerate).unwrap();

        assert_eq!(
            args,
            vec![
                "--number",
                "20",
                "--winwidth",
                "80",
                "--case-matching",
                "smart",
                "filter",
                "fo",
                "--sync",
                "--cmd",
                config.files_command.as_str(),
                "--cmd-dir",
                "/repo",
            ]
        );
    }

    #[test]
    fn test_cached_source_reads_tempfile() {
        let config = FinderConfig::default();
        let args = build_worker_args(
            "fo",
            &files_options(),
            &config,
            JobInput::TempFile(Path::new("/tmp/cache")),
        )
        .unwrap();

        assert_eq!(
            &args[args.len() - 4..],
            ["--input", "/tmp/cache", "--cmd-dir", "/repo"]
        );
        assert!(!args.contains(&"--cmd".to_string()));
    }

    #[test]
    fn test_stdin_source_has_no_source_flags() {
        let config = FinderConfig::default();
        let args = build_worker_args("x", &files_options(), &config, JobInput::Stdin).unwrap();
        assert_eq!(&args[args.len() - 3..], ["--sync", "--cmd-dir", "/repo"]);
        assert!(!args.contains(&"--input".to_string()));
    }

    #[test]
    fn test_par_run_raises_cap_within_bound() {
        let config = FinderConfig {
            par_run: true,
            max_results: 30,
            ..Default::default()
        };
        let options = files_options();

        assert_eq!(result_cap(&options, &config), 30);

        let args = build_worker_args("q", &options, &config, JobInput::Enumerate).unwrap();
        assert!(args.contains(&"--par-run".to_string()));

        let roomy = FinderConfig {
            par_run: true,
            ..Default::default()
        };
        assert_eq!(result_cap(&options, &roomy), 40);
    }

    #[test]
    fn test_ignore_case_and_icon() {
        let config = FinderConfig::default();
        let options = files_options().with_ignore_case(true).with_icon(true);
        let args = build_worker_args("q", &options, &config, JobInput::Enumerate).unwrap();

        let pos = args.iter().position(|a| a == "--case-matching").unwrap();
        assert_eq!(args[pos + 1], "ignore");
        let pos = args.iter().position(|a| a == "--icon").unwrap();
        assert_eq!(args[pos + 1], "file");
    }

    #[test]
    fn test_live_grep_carries_query_and_command() {
        let config = FinderConfig::default();
        let options = SessionOptions::new("/repo", SearchMode::LiveGrep);
        let args = build_worker_args("fn main", &options, &config, JobInput::Enumerate).unwrap();

        let pos = args.iter().position(|a| a == "grep").unwrap();
        assert_eq!(args[pos + 1], "fn main");
        assert_eq!(
            &args[pos + 2..],
            [
                "--cmd",
                config.grep_command.as_str(),
                "--cmd-dir",
                "/repo"
            ]
        );
    }

    #[test]
    fn test_tags_lists_every_tag_file() {
        let config = FinderConfig::default();
        let options = SessionOptions::new("/repo", SearchMode::Tags).with_tag_files(vec![
            PathBuf::from("/repo/tags"),
            PathBuf::from("/repo/sub/tags"),
        ]);
        let args = build_worker_args("Foo", &options, &config, JobInput::Enumerate).unwrap();

        assert_eq!(
            &args[args.len() - 6..],
            [
                "tags",
                "Foo",
                "--files=/repo/tags",
                "--files=/repo/sub/tags",
                "--cmd-dir",
                "/repo"
            ]
        );
    }

    #[test]
    fn test_tags_without_files_is_rejected() {
        let config = FinderConfig::default();
        let options = SessionOptions::new("/repo", SearchMode::Tags);
        assert!(matches!(
            build_worker_args("Foo", &options, &config, JobInput::Enumerate),
            Err(SpawnError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_worker_command_starts_with_program() {
        let config = FinderConfig::default().with_worker_program("/opt/maple");
        let argv = worker_command("fo", &files_options(), &config).unwrap();

        assert_eq!(argv[0], "/opt/maple");
        assert_eq!(&argv[1..3], ["--number", "20"]);
    }

    #[test]
    fn test_worker_command_reports_config_and_argument_errors() {
        let blank = FinderConfig::default().with_worker_program(" ");
        assert!(matches!(
            worker_command("fo", &files_options(), &blank),
            Err(crate::Error::Config(_))
        ));

        let tags = SessionOptions::new("/repo", SearchMode::Tags);
        assert!(matches!(
            worker_command("Foo", &tags, &FinderConfig::default()),
            Err(crate::Error::Spawn(SpawnError::InvalidArgs { .. }))
        ));
    }

    #[test]
    fn test_dynamic_list_streams_without_sync() {
        let config = FinderConfig::default();
        let options =
            SessionOptions::new("/repo", SearchMode::DynamicList).with_source_cmd("git log --oneline");
        let args = build_worker_args("fix", &options, &config, JobInput::Enumerate).unwrap();

        assert!(!args.contains(&"--sync".to_string()));
        assert_eq!(
            &args[args.len() - 4..],
            ["--cmd", "git log --oneline", "--cmd-dir", "/repo"]
        );
    }
}
