//! Line-oriented interactive prompt.
//!
//! Each input line is evaluated as a document against a persistent
//! environment. A failing line restores the environment snapshot taken
//! before it ran, so a bad input never leaves definitions half-applied.

use std::io::{self, BufRead, Write};

use wpp_eval::Evaluator;

pub fn run(evaluator: &mut Evaluator) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input_number = 0u32;

    loop {
        write!(stdout, ">>> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(stdout)?;
            return Ok(());
        }
        let input = line.trim_end_matches(['\n', '\r']);
        if input.is_empty() {
            continue;
        }
        if input == ":quit" {
            return Ok(());
        }

        input_number += 1;
        let snapshot = evaluator.snapshot();
        let name = format!("<repl:{input_number}>");
        match evaluator.eval_source(&name, input.as_bytes()) {
            Ok(output) => {
                stdout.write_all(&output)?;
                if !output.is_empty() && !output.ends_with(b"\n") {
                    writeln!(stdout)?;
                }
            }
            Err(diag) => {
                evaluator.restore(snapshot);
                match diag.location {
                    Some(loc) => eprintln!("{}:{}:{}: {diag}", name, loc.line, loc.column),
                    None => eprintln!("{diag}"),
                }
            }
        }
    }
}
