use std::io::Write;
use std::path::PathBuf;

use wpp_ast::FileId;
use wpp_diag::Diagnostic;
use wpp_eval::{EvalConfig, Evaluator};

mod repl;

fn main() {
    if let Err(message) = run() {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = std::env::args().collect::<Vec<_>>();
    let options = parse_cli(&args)?;

    let search_root = std::env::current_dir()
        .map_err(|err| format!("failed to resolve the working directory: {err}"))?;
    let config = EvalConfig {
        enable_exec: !options.disable_run,
        search_root,
    };
    let mut evaluator = Evaluator::new(config);

    for path in &options.files {
        let source = std::fs::read(path)
            .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?;
        let name = path.display().to_string();

        // A failing document produces no output at all; files already
        // evaluated have been flushed, so atomicity is per file.
        match evaluator.eval_source(&name, &source) {
            Ok(output) => {
                std::io::stdout()
                    .write_all(&output)
                    .map_err(|err| format!("failed to write output: {err}"))?;
            }
            Err(diag) => return Err(render_diagnostic(&evaluator, &diag)),
        }
    }

    if options.repl {
        repl::run(&mut evaluator).map_err(|err| format!("repl failed: {err}"))?;
    }

    Ok(())
}

/// Render a diagnostic as `file:line:col: error[CODE]: message`.
fn render_diagnostic(evaluator: &Evaluator, diag: &Diagnostic) -> String {
    match diag.location {
        Some(loc) => format!(
            "{}:{}:{}: {diag}",
            evaluator.file_name(FileId(loc.file_id)),
            loc.line,
            loc.column
        ),
        None => diag.to_string(),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Options {
    files: Vec<PathBuf>,
    repl: bool,
    disable_run: bool,
}

fn parse_cli(args: &[String]) -> Result<Options, String> {
    let mut files = Vec::new();
    let mut repl = false;
    let mut disable_run = false;
    let mut flags_done = false;

    for arg in &args[1..] {
        if flags_done {
            files.push(PathBuf::from(arg));
            continue;
        }
        match arg.as_str() {
            "--" => flags_done = true,
            "--repl" => repl = true,
            "--disable-run" => disable_run = true,
            "-h" | "--help" => return Err(usage()),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown argument `{flag}`\n{}", usage()));
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }

    if files.is_empty() && !repl {
        return Err(usage());
    }
    Ok(Options {
        files,
        repl,
        disable_run,
    })
}

fn usage() -> String {
    "usage:\n  wpp [--repl] [--disable-run] [--] <file.wpp>...".to_string()
}
