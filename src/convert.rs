//! External image conversion.
//!
//! Encoding is delegated to a command-line tool (ImageMagick `convert` by
//! default). The command is a template split with shell-words; `{input}` and
//! `{output}` are replaced per image and appended when the template omits them.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Re-encodes one image file into another.
pub trait ImageConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Converter backed by an external command template.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    argv: Vec<String>,
}

impl CommandConverter {
    pub fn from_template(template: &str) -> Result<Self> {
        let mut argv = shell_words::split(template)
            .with_context(|| format!("parse converter command: {template}"))?;
        if argv.is_empty() {
            return Err(anyhow!("converter command is empty"));
        }
        if !argv.iter().any(|arg| arg.contains(INPUT_PLACEHOLDER)) {
            argv.push(INPUT_PLACEHOLDER.to_string());
        }
        if !argv.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            argv.push(OUTPUT_PLACEHOLDER.to_string());
        }
        Ok(Self { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Resolve the program before any store is touched.
    pub fn preflight(&self) -> Result<PathBuf> {
        which::which(self.program())
            .with_context(|| format!("converter `{}` not found on PATH", self.program()))
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let output = output.display().to_string();
        self.argv[1..]
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl ImageConverter for CommandConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.render_args(input, output);
        let command = shell_words::join(
            std::iter::once(self.program()).chain(args.iter().map(String::as_str)),
        );
        tracing::debug!(command = %command, "executing converter");
        run_tool(self.program(), &args)
    }
}

/// Run a tool to completion, failing with the first stderr line.
pub fn run_tool(program: &str, args: &[String]) -> Result<()> {
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("spawn {program}"))?;
    let elapsed_ms = start.elapsed().as_millis();

    tracing::debug!(
        elapsed_ms,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "{program} complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_line = stderr.trim().lines().next().unwrap_or_default();
        let detail = if stderr_line.is_empty() {
            format!("status {}", output.status)
        } else {
            stderr_line.to_string()
        };
        return Err(anyhow!("{program} failed: {detail}"));
    }
    Ok(())
}

/// Read a converted file and require the JPEG start-of-image prefix.
pub fn verify_jpeg(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if !bytes.starts_with(&JPEG_SOI) {
        return Err(anyhow!(
            "JPEG prefix not found when loading {}",
            path.display()
        ));
    }
    Ok(bytes)
}
