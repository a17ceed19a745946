//! A bulk file renaming utility that uses your editor as its UI.

mod error;
mod exec;
mod path;
mod plan;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use structopt::StructOpt;
use tempfile::NamedTempFile;

#[cfg(target_os = "windows")]
const VS_CODE: &str = "code.cmd";

#[cfg(not(target_os = "windows"))]
const VS_CODE: &str = "code";

const DEFAULT_EDITOR: &str = "vi";

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "bumv",
    about = "bumv (bulk move) - A bulk file renaming utility that uses your editor as its UI. Invoke the utility, edit the filenames, save the temporary file, close the editor and confirm changes."
)]
struct BumvConfiguration {
    /// Recursively rename files in subdirectories (only applies when no
    /// explicit file paths are given)
    #[structopt(short, long)]
    recursive: bool,
    /// Do not observe ignore files
    #[structopt(short, long)]
    no_ignore: bool,
    /// Do not write a log file
    #[structopt(long)]
    no_log: bool,
    /// Use VS Code as editor
    #[structopt(short = "c", long)]
    use_vscode: bool,
    /// Print the resolved rename plan and exit without touching the
    /// filesystem
    #[structopt(long = "dry-run")]
    dry_run: bool,
    /// Base directory to walk, or one or more explicit file paths to
    /// rename. With zero or one directory argument, files are discovered
    /// by walking it; with one or more file arguments, exactly those
    /// files are renamed.
    #[structopt(parse(from_os_str))]
    paths: Vec<PathBuf>,
}

impl BumvConfiguration {
    fn file_list(&self) -> Result<Vec<PathBuf>> {
        match self.paths.as_slice() {
            [] => Ok(self.walk(Path::new("."))),
            [only] if only.is_dir() => Ok(self.walk(only)),
            explicit => {
                let mut seen = HashSet::with_capacity(explicit.len());
                for path in explicit {
                    if !seen.insert(path) {
                        anyhow::bail!("{} was given more than once", path.to_string_lossy());
                    }
                }
                let mut result: Vec<_> = explicit.to_vec();
                result.sort_by_key(|path| path.to_string_lossy().to_string());
                Ok(result)
            }
        }
    }

    fn walk(&self, base_path: &Path) -> Vec<PathBuf> {
        let builder = WalkBuilder::new(base_path)
            .standard_filters(!self.no_ignore)
            .build()
            .filter_map(Result::ok)
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file());
        let mut result: Vec<_> = if !self.recursive {
            // non-recursive mode: only include files in the base path
            builder
                .filter(|path| path.parent() == Some(base_path))
                .collect()
        } else {
            builder.collect()
        };
        // ensure deterministic order
        result.sort_by_key(|path| path.to_string_lossy().to_string());
        result
    }
}

struct RenamingPlan {
    request: RenamingRequest,
    steps: Vec<plan::Step>,
}

impl RenamingPlan {
    fn try_new(request: RenamingRequest) -> Result<Self> {
        let steps = plan::plan(request.mapping.iter().cloned())
            .with_context(|| "failed to plan the requested renames")?;
        Ok(RenamingPlan { request, steps })
    }

    fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Create a human readable representation of the rename plan
    fn human_readable_plan(&self) -> String {
        self.steps
            .iter()
            .map(|(old, new)| format!("{} -> {}", old.to_string_lossy(), new.to_string_lossy()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn execute(&self, dry_run: bool) -> Result<String> {
        self.request.ensure_files_did_not_change()?;
        exec::apply(&self.steps, dry_run)?;
        if !dry_run && !self.request.config.no_log {
            self.request.write_renaming_log_file();
        }
        Ok(if dry_run {
            String::new()
        } else {
            "Files renamed successfully.".to_string()
        })
    }
}

/// Create the content of the temp file the user will edit
fn create_editable_temp_file_content(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.to_string_lossy().to_string())
        .collect::<Vec<String>>()
        .join("\n")
}

/// Parse the content of the temp file the user edited
fn parse_temp_file_content(content: String) -> Vec<PathBuf> {
    content
        .lines()
        // skip empty lines (usually the last line)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

struct RenamingRequest {
    config: BumvConfiguration,
    all_files_at_creation_time: Vec<PathBuf>,
    mapping: Vec<(PathBuf, PathBuf)>,
}

impl RenamingRequest {
    fn try_new<F: FnOnce(String) -> Result<String>>(
        config: BumvConfiguration,
        edit_function: F,
    ) -> Result<Self> {
        let original_filenames = config.file_list()?;
        let temp_file_content = create_editable_temp_file_content(&original_filenames);
        let modified_temp_file_content = edit_function(temp_file_content)?;
        let edited_filenames = parse_temp_file_content(modified_temp_file_content);
        if original_filenames.len() != edited_filenames.len() {
            anyhow::bail!("The number of files in the edited file does not match the original.");
        }
        let unique_new_filenames: HashSet<&PathBuf> = edited_filenames.iter().collect();
        if unique_new_filenames.len() != edited_filenames.len() {
            anyhow::bail!("There is a name clash in the edited files.");
        }

        let mapping: Vec<(PathBuf, PathBuf)> = original_filenames
            .iter()
            .zip(edited_filenames.iter())
            .filter(|(old, new)| old != new)
            .map(|(old, new)| (old.clone(), new.clone()))
            .collect();
        Ok(Self {
            config,
            all_files_at_creation_time: original_filenames,
            mapping,
        })
    }

    fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Ensure that the files have not changed since this request was created
    fn ensure_files_did_not_change(&self) -> Result<()> {
        anyhow::ensure!(
            self.all_files_at_creation_time == self.config.file_list()?,
            "The files in the directory changed while you were editing them."
        );
        Ok(())
    }

    // Create a logfile called bumv_{timestamp}.log in the current directory
    // containing the requested renaming mapping.
    // The log file is based on the request, because the user is not
    // interested in the temporary files created in the planning phase.
    fn write_renaming_log_file(&self) {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_file_name = format!("bumv_{}.log", timestamp);
        let log_file_path = Path::new(".").join(log_file_name);
        let mut log_file = match File::create(log_file_path) {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(%err, "failed to create renaming log file");
                return;
            }
        };
        let max_old_filename_length = self
            .mapping
            .iter()
            .map(|(old, _)| old.to_string_lossy().len())
            .max()
            .unwrap_or(0);
        let log_content = self
            .mapping
            .iter()
            .map(|(old, new)| {
                format!(
                    "{:width$}\t{}",
                    old.to_string_lossy(),
                    new.to_string_lossy(),
                    width = max_old_filename_length
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(err) = log_file.write_all(log_content.as_bytes()) {
            tracing::warn!(%err, "failed to write renaming log file");
        }
    }
}

struct TempFileEditor {
    program: String,
    args: Vec<String>,
    wait_flag: bool,
}

impl TempFileEditor {
    fn write_editable_temp_file(content: String) -> Result<NamedTempFile> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "{}", content)?;
        Ok(temp_file)
    }

    /// Let the user edit the temp file
    fn let_user_edit_temp_file(&self, temp_file: &NamedTempFile) -> Result<()> {
        let temp_path = temp_file
            .path()
            .to_str()
            .context("Failed to convert path to string")?;
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        // VS code needs the --wait flag to wait for the user to close the editor
        if self.wait_flag {
            command.arg("--wait");
        }
        let status = command.arg(temp_path).status()?;
        anyhow::ensure!(status.success(), "Editor exited with an error");
        Ok(())
    }

    fn read_temp_file(temp_file: &NamedTempFile) -> Result<String> {
        let mut content = String::new();
        File::open(temp_file.path())?.read_to_string(&mut content)?;
        Ok(content)
    }

    fn edit(&self, content: String) -> Result<String> {
        let temp_file = Self::write_editable_temp_file(content)?;
        self.let_user_edit_temp_file(&temp_file)?;
        Self::read_temp_file(&temp_file)
    }
}

/// Resolve the editor command (and any flags baked into `EDITOR`) per the
/// `EDITOR` environment variable, shell-split so that e.g. `EDITOR="code -w"`
/// works. Falls back to `vi`, or to VS Code if `-c`/`--use-vscode` was given.
fn resolve_editor(use_vscode: bool) -> Result<TempFileEditor> {
    if use_vscode {
        return Ok(TempFileEditor {
            program: VS_CODE.to_string(),
            args: Vec::new(),
            wait_flag: true,
        });
    }
    let editor_var = std::env::var("EDITOR").unwrap_or_else(|_| DEFAULT_EDITOR.to_string());
    let mut parts = shell_words::split(&editor_var).context("failed to parse $EDITOR")?;
    anyhow::ensure!(!parts.is_empty(), "$EDITOR is empty");
    let program = parts.remove(0);
    Ok(TempFileEditor {
        program,
        args: parts,
        wait_flag: false,
    })
}

/// Bulk rename files according to the configuration
/// `edit_function` and `prompt_function` are passed as parameters to allow for testing.
fn bulk_rename(
    config: BumvConfiguration,
    edit_function: impl Fn(String) -> Result<String>,
    prompt_function: impl FnOnce(String) -> bool,
) -> Result<()> {
    let dry_run = config.dry_run;
    let request = RenamingRequest::try_new(config, edit_function)?;

    if request.is_empty() {
        println!("No files to rename.");
        return Ok(());
    }

    let plan = RenamingPlan::try_new(request)?;

    if plan.is_empty() {
        println!("No files to rename.");
    } else if dry_run {
        plan.execute(true)?;
    } else {
        let human_readable_mapping = plan.human_readable_plan();
        if prompt_function(human_readable_mapping) {
            println!("{}", plan.execute(false)?);
        } else {
            println!("Aborted.")
        }
    }
    Ok(())
}

/// Prompt the user for confirmation
fn prompt_for_confirmation(human_readable_mapping: String) -> bool {
    println!("{}", human_readable_mapping);
    let input: String = rprompt::prompt_reply("\nRename: [Y/n]? ").unwrap_or_default();
    matches!(input.to_lowercase().as_str(), "y" | "")
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    init_tracing();
    let config = BumvConfiguration::from_args();
    let editor = resolve_editor(config.use_vscode)?;

    bulk_rename(
        config,
        move |content| editor.edit(content),
        prompt_for_confirmation,
    )
}

fn main() {
    if let Err(err) = run() {
        eprintln!("bumv: {:#}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests;
