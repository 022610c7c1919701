use crate::cli::Args;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Saved conversion settings
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub sort_by_name: Option<bool>,
    pub preserve_ratio: Option<bool>,
    pub split_by_ratio: Option<bool>,
    pub force_gpu: Option<bool>,
    pub auto_clean_temp: Option<bool>,
    pub extensions: Option<String>,
    pub verbose: Option<bool>,
}

fn given(cli_args: &[String], flags: &[&str]) -> bool {
    cli_args.iter().any(|arg| {
        flags
            .iter()
            .any(|flag| arg == flag || arg.starts_with(&format!("{}=", flag)))
    })
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            let cli_args = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config, &cli_args);

            if self.verbose && !self.json_progress {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    /// Apply config values for every option not present in `cli_args`
    pub fn merge_from_config(&mut self, config: ConfigFile, cli_args: &[String]) {
        if !given(cli_args, &["-i", "--input"]) {
            if let Some(input) = config.input_path {
                self.input = Some(PathBuf::from(input));
            }
        }

        if !given(cli_args, &["-o", "--output"]) {
            if let Some(output) = config.output_path {
                self.output = Some(PathBuf::from(output));
            }
        }

        if !given(cli_args, &["--sort-by-name", "--no-sort"]) {
            if let Some(sort) = config.sort_by_name {
                self.sort_by_name = sort;
                self.no_sort = !sort;
            }
        }

        if !given(cli_args, &["--preserve-ratio", "--no-preserve-ratio"]) {
            if let Some(preserve) = config.preserve_ratio {
                self.preserve_ratio = preserve;
                self.no_preserve_ratio = !preserve;
            }
        }

        if !given(cli_args, &["--auto-clean", "--no-auto-clean"]) {
            if let Some(clean) = config.auto_clean_temp {
                self.auto_clean = clean;
                self.no_auto_clean = !clean;
            }
        }

        // Plain switches can only be turned on from the file
        if !self.split_by_ratio {
            self.split_by_ratio = config.split_by_ratio.unwrap_or(false);
        }

        if !self.force_gpu {
            self.force_gpu = config.force_gpu.unwrap_or(false);
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        if !given(cli_args, &["--extensions"]) {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }
    }
}
