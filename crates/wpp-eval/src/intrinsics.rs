//! Built-in operations dispatched by the evaluator.
//!
//! Arguments reach an intrinsic fully evaluated. Subprocesses run through
//! `sh -c` in the configured search root and block until exit; their handles
//! are released before the intrinsic returns, on success and failure alike.

use std::io::Write;
use std::process::{Command, Stdio};

use wpp_ast::{IntrinsicKind, NodeId, Position};
use wpp_diag::Diagnostic;

use crate::Evaluator;

impl Evaluator {
    pub(crate) fn eval_intrinsic(
        &mut self,
        kind: IntrinsicKind,
        name: &str,
        args: &[NodeId],
        pos: Position,
    ) -> Result<Vec<u8>, Diagnostic> {
        if args.len() != kind.arity() {
            return Err(self.runtime_error(
                pos,
                format!(
                    "intrinsic `{name}` expects {} argument(s), found {}",
                    kind.arity(),
                    args.len()
                ),
            ));
        }

        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            values.push(self.eval(arg)?);
        }

        match kind {
            IntrinsicKind::Source | IntrinsicKind::Eval => {
                let source = std::mem::take(&mut values[0]);
                self.eval_fragment("<source>", &source)
            }

            IntrinsicKind::File => {
                let path = self.utf8_arg(&values[0], name, pos)?;
                let full = self.config.search_root.join(&path);
                std::fs::read(&full)
                    .map_err(|err| self.runtime_error(pos, format!("failed to read `{path}`: {err}")))
            }

            IntrinsicKind::Assert => {
                if values[0] != values[1] {
                    let left = String::from_utf8_lossy(&escape_bytes(&values[0])).into_owned();
                    let right = String::from_utf8_lossy(&escape_bytes(&values[1])).into_owned();
                    return Err(self
                        .runtime_error(pos, format!("assertion failed: `{left}` != `{right}`")));
                }
                Ok(Vec::new())
            }

            IntrinsicKind::Error => {
                let message = String::from_utf8_lossy(&values[0]).into_owned();
                Err(self.runtime_error(pos, message))
            }

            IntrinsicKind::Run => {
                let command = self.utf8_arg(&values[0], name, pos)?;
                self.run_command(&command, None, name, pos)
            }

            IntrinsicKind::Pipe => {
                let command = self.utf8_arg(&values[0], name, pos)?;
                let stdin = std::mem::take(&mut values[1]);
                self.run_command(&command, Some(&stdin), name, pos)
            }

            IntrinsicKind::Slice => {
                let start = self.int_arg(&values[1], name, pos)?;
                let length = self.int_arg(&values[2], name, pos)?;
                let value = &values[0];
                let total = value.len() as i64;
                let begin = if start < 0 { total + start } else { start };
                if begin < 0 || length < 0 || begin + length > total {
                    return Err(self.runtime_error(
                        pos,
                        format!(
                            "slice out of range: start {start}, length {length}, in {total} bytes"
                        ),
                    ));
                }
                Ok(value[begin as usize..(begin + length) as usize].to_vec())
            }

            IntrinsicKind::Find => {
                let haystack = &values[0];
                let needle = &values[1];
                let index = if needle.is_empty() {
                    Some(0)
                } else {
                    haystack
                        .windows(needle.len())
                        .position(|window| window == needle.as_slice())
                };
                match index {
                    Some(index) => Ok(index.to_string().into_bytes()),
                    None => Ok(b"-1".to_vec()),
                }
            }

            IntrinsicKind::Length => Ok(values[0].len().to_string().into_bytes()),

            IntrinsicKind::Log => {
                let mut stderr = std::io::stderr().lock();
                stderr
                    .write_all(&values[0])
                    .and_then(|()| stderr.write_all(b"\n"))
                    .map_err(|err| {
                        self.runtime_error(pos, format!("failed to write to stderr: {err}"))
                    })?;
                Ok(Vec::new())
            }

            IntrinsicKind::Escape => Ok(escape_bytes(&values[0])),
        }
    }

    fn run_command(
        &self,
        command: &str,
        stdin_bytes: Option<&[u8]>,
        name: &str,
        pos: Position,
    ) -> Result<Vec<u8>, Diagnostic> {
        if !self.config.enable_exec {
            return Err(self.runtime_error(pos, format!("the `{name}` intrinsic is disabled")));
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.config.search_root)
            .stdin(if stdin_bytes.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| {
                self.runtime_error(pos, format!("failed to spawn `{command}`: {err}"))
            })?;

        if let Some(bytes) = stdin_bytes {
            let mut stdin = child
                .stdin
                .take()
                .expect("stdin was configured as piped above");
            stdin.write_all(bytes).map_err(|err| {
                self.runtime_error(pos, format!("failed to write to `{command}`: {err}"))
            })?;
            // Dropping the handle closes the pipe so the child sees EOF.
        }

        let output = child.wait_with_output().map_err(|err| {
            self.runtime_error(pos, format!("failed to wait for `{command}`: {err}"))
        })?;

        if !output.status.success() {
            return Err(self.runtime_error(
                pos,
                format!("command `{command}` exited with {}", output.status),
            ));
        }
        Ok(output.stdout)
    }

    fn utf8_arg(&self, value: &[u8], name: &str, pos: Position) -> Result<String, Diagnostic> {
        std::str::from_utf8(value)
            .map(str::to_owned)
            .map_err(|_| self.runtime_error(pos, format!("`{name}` argument is not valid UTF-8")))
    }

    fn int_arg(&self, value: &[u8], name: &str, pos: Position) -> Result<i64, Diagnostic> {
        std::str::from_utf8(value)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| {
                self.runtime_error(
                    pos,
                    format!(
                        "`{name}` expects a decimal integer, found `{}`",
                        String::from_utf8_lossy(value)
                    ),
                )
            })
    }
}

/// Render bytes with non-printables escaped: the forms the lexer accepts
/// (`\n \t \r \\ \" \'`) plus `\xHH` for everything else.
pub(crate) fn escape_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\'' => out.extend_from_slice(b"\\'"),
            0x20..=0x7e => out.push(byte),
            _ => out.extend(format!("\\x{byte:02x}").into_bytes()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_bytes;

    #[test]
    fn escape_maps_control_bytes_to_printable_forms() {
        assert_eq!(escape_bytes(b"a\nb"), b"a\\nb".to_vec());
        assert_eq!(escape_bytes(b"\"hi\""), b"\\\"hi\\\"".to_vec());
        assert_eq!(escape_bytes(&[0x00, 0x1b]), b"\\x00\\x1b".to_vec());
    }

    #[test]
    fn escape_output_is_always_printable_ascii() {
        let input: Vec<u8> = (0u8..=255).collect();
        for byte in escape_bytes(&input) {
            assert!((0x20..=0x7e).contains(&byte), "non-printable byte {byte:#04x}");
        }
    }
}
