//! The bundled example models and the `example` subcommands for using them.
use super::{RunOpts, SensitivityOpts, handle_run_command, handle_sensitivity_command};
use crate::sensitivity::SENSITIVITY_FILE_NAME;
use crate::settings::Settings;
use anyhow::{Context, Result, bail, ensure};
use clap::Subcommand;
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The directory containing the example models.
const EXAMPLES_DIR: Dir = include_dir!("demos");

/// The available subcommands for managing example models.
#[derive(Subcommand)]
pub enum ExampleSubcommands {
    /// List available examples.
    List,
    /// Provide information about the specified example.
    Info {
        /// The name of the example.
        name: String,
    },
    /// Extract an example model configuration to a new directory.
    Extract {
        /// The name of the example to extract.
        name: String,
        /// The destination folder for the example.
        new_path: Option<PathBuf>,
    },
    /// Run an example.
    Run {
        /// The name of the example to run.
        name: String,
        /// Run the example's sensitivity analysis instead of a single simulation
        #[arg(long)]
        sensitivity: bool,
        /// Directory for output files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Whether to overwrite the output directory if it already exists
        #[arg(long)]
        overwrite: bool,
        /// Whether to write additional information to CSV files
        #[arg(long)]
        debug_model: bool,
    },
}

impl ExampleSubcommands {
    /// Execute the supplied example subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::List => {
                for name in list_examples() {
                    println!("{name}");
                }
            }
            Self::Info { name } => println!("{}", example_readme(&name)?),
            Self::Extract { name, new_path } => {
                extract_example(&name, new_path.as_deref().unwrap_or(Path::new(&name)))?;
            }
            Self::Run {
                name,
                sensitivity,
                output_dir,
                overwrite,
                debug_model,
            } => {
                if sensitivity {
                    let opts = SensitivityOpts {
                        output_dir,
                        overwrite,
                    };
                    handle_example_sensitivity_command(&name, &opts, None)?;
                } else {
                    let opts = RunOpts {
                        output_dir,
                        overwrite,
                        debug_model,
                    };
                    handle_example_run_command(&name, &opts, None)?;
                }
            }
        }

        Ok(())
    }
}

/// The names of the bundled examples
fn list_examples() -> impl Iterator<Item = String> {
    EXAMPLES_DIR
        .dirs()
        .map(|dir| dir.path().display().to_string())
}

/// The contents of an example's README file
fn example_readme(name: &str) -> Result<&'static str> {
    let path: PathBuf = [name, "README.txt"].iter().collect();
    EXAMPLES_DIR
        .get_file(path)
        .with_context(|| format!("Example {name} not found."))?
        .contents_utf8()
        .context("README.txt is not UTF-8 encoded")
}

/// Copy the files for the named example into a new directory
fn extract_example(name: &str, new_path: &Path) -> Result<()> {
    let sub_dir = EXAMPLES_DIR
        .get_dir(name)
        .with_context(|| format!("Example {name} not found."))?;

    ensure!(
        !new_path.exists(),
        "Destination directory {} already exists",
        new_path.display()
    );

    fs::create_dir(new_path)?;
    for entry in sub_dir.entries() {
        let DirEntry::File(file) = entry else {
            bail!("Subdirectories in examples are not supported");
        };
        let file_name = file
            .path()
            .file_name()
            .context("Example file has no name")?;
        fs::write(new_path.join(file_name), file.contents())?;
    }

    Ok(())
}

/// Handle the `example run` command.
pub fn handle_example_run_command(
    name: &str,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = temp_dir.path().join(name);
    extract_example(name, &model_path)?;
    handle_run_command(&model_path, opts, settings)
}

/// Handle the `example run --sensitivity` command.
pub fn handle_example_sensitivity_command(
    name: &str,
    opts: &SensitivityOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let temp_dir = TempDir::new().context("Failed to create temporary directory.")?;
    let model_path = temp_dir.path().join(name);
    extract_example(name, &model_path)?;

    let config_path = model_path.join(SENSITIVITY_FILE_NAME);
    ensure!(
        config_path.is_file(),
        "Example {name} does not include a sensitivity analysis"
    );
    handle_sensitivity_command(&config_path, opts, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_examples() {
        let names: Vec<_> = list_examples().collect();
        assert!(names.contains(&"simple".to_string()));
        assert!(names.contains(&"flat".to_string()));
    }

    #[test]
    fn test_example_readme() {
        assert!(!example_readme("simple").unwrap().is_empty());
        assert!(example_readme("missing").is_err());
    }

    #[test]
    fn test_extract_example() {
        let dir = tempdir().unwrap();
        let new_path = dir.path().join("simple");
        extract_example("simple", &new_path).unwrap();
        assert!(new_path.join("model.toml").is_file());
        assert!(new_path.join(SENSITIVITY_FILE_NAME).is_file());

        // Won't overwrite
        assert!(extract_example("simple", &new_path).is_err());
    }
}
