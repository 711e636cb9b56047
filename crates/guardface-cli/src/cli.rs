use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "guardface",
    about = "Verify security guards by face against stored reference embeddings",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable output
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll a first-seen guard or compare a photo against their reference
    Recognize(RecognizeArgs),
    /// Administer stored reference embeddings
    #[command(subcommand)]
    References(ReferencesCommands),
    /// Check configuration, model files, and store connectivity
    Doctor(DoctorArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Read settings from this TOML file instead of the default locations
    #[arg(long = "config", value_name = "PATH")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RecognizeArgs {
    /// Identity key of the guard presenting the photo
    #[arg(long = "guard-id", value_name = "ID")]
    pub guard_id: String,

    /// Encoded photo (PNG, JPEG, ...) to verify
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Override the acceptance threshold (inclusive)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Path to the dlib landmark predictor model
    #[arg(long = "landmark-model", value_name = "PATH")]
    pub landmark_model: Option<PathBuf>,

    /// Path to the dlib face encoding network
    #[arg(long = "encoder-model", value_name = "PATH")]
    pub encoder_model: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Subcommand)]
pub enum ReferencesCommands {
    /// Load precomputed reference vectors from a directory
    Bootstrap(BootstrapArgs),
    /// Show whether a guard has a reference and how long it has left
    Status(GuardArgs),
    /// Delete a guard's reference so the next photo re-enrolls them
    Remove(GuardArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BootstrapArgs {
    /// Directory of `<guard-id>.npy` or raw little-endian f32 files
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Replace references that already exist
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
pub struct GuardArgs {
    #[arg(long = "guard-id", value_name = "ID")]
    pub guard_id: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn recognize_parses_guard_and_overrides() {
        let cli = Cli::try_parse_from([
            "guardface",
            "--json",
            "recognize",
            "--guard-id",
            "EMP-7",
            "photo.jpg",
            "--threshold",
            "0.75",
            "--config",
            "/tmp/guardface.toml",
        ])
        .unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Json);
        match cli.command {
            Commands::Recognize(args) => {
                assert_eq!(args.guard_id, "EMP-7");
                assert_eq!(args.image, PathBuf::from("photo.jpg"));
                assert_eq!(args.threshold, Some(0.75));
                assert_eq!(
                    args.config.config_file,
                    Some(PathBuf::from("/tmp/guardface.toml"))
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn references_remove_requires_guard_id() {
        assert!(Cli::try_parse_from(["guardface", "references", "remove"]).is_err());
    }
}
