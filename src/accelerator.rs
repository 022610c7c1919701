//! Informational GPU probe
//!
//! Nothing in the conversion pipeline is accelerated; the probe only tells
//! the user what hardware was found. It never fails: a missing or broken
//! `nvidia-smi` is reported as "no accelerator".

use serde::Serialize;
use std::fmt;
use std::process::Command;

const NVIDIA_SMI: &str = "nvidia-smi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuDevice {
    pub name: String,
    pub driver_version: Option<String>,
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver_version {
            Some(driver) => write!(f, "{} (driver {})", self.name, driver),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorReport {
    pub devices: Vec<GpuDevice>,
    /// Why the probe came back empty, when it did
    pub note: Option<String>,
}

impl AcceleratorReport {
    pub fn has_gpu(&self) -> bool {
        !self.devices.is_empty()
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        if let Some(first) = self.devices.first() {
            if self.devices.len() == 1 {
                format!("GPU detected: {}", first)
            } else {
                format!("{} GPUs detected, first: {}", self.devices.len(), first)
            }
        } else {
            match &self.note {
                Some(note) => format!("No GPU detected ({}); using CPU", note),
                None => "No GPU detected; using CPU".to_string(),
            }
        }
    }
}

/// Query `nvidia-smi` for installed devices.
pub fn probe() -> AcceleratorReport {
    let output = Command::new(NVIDIA_SMI)
        .args([
            "--query-gpu=gpu_name,driver_version",
            "--format=csv,noheader",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let devices = parse_nvidia_smi(&stdout);
            let note = devices
                .is_empty()
                .then(|| format!("{} listed no devices", NVIDIA_SMI));
            AcceleratorReport { devices, note }
        }
        Ok(output) => AcceleratorReport {
            devices: Vec::new(),
            note: Some(format!("{} exited with {}", NVIDIA_SMI, output.status)),
        },
        Err(_) => AcceleratorReport {
            devices: Vec::new(),
            note: Some(format!("{} not available", NVIDIA_SMI)),
        },
    }
}

/// Parse `csv,noheader` output, one device per non-empty line.
pub fn parse_nvidia_smi(output: &str) -> Vec<GpuDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let name = fields.next().unwrap_or_default().to_string();
            let driver_version = fields
                .next()
                .filter(|field| !field.is_empty())
                .map(str::to_string);
            GpuDevice {
                name,
                driver_version,
            }
        })
        .collect()
}
