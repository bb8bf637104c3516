//! Device configuration check.

use ncbatch_engine::{Credentials, DeviceConfig};
use std::path::Path;

/// Loads a device configuration from a JSON file.
pub fn load(path: &Path) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Describes how a transport would connect with this configuration.
pub fn describe(config: &DeviceConfig) -> Result<String, Box<dyn std::error::Error>> {
    let auth = match config.credentials()? {
        Credentials::KeyFile(path) => format!("public key {}", path.display()),
        Credentials::Password(_) => "password".to_string(),
    };
    Ok(format!(
        "{}@{} (auth: {})",
        config.username,
        config.address(),
        auth
    ))
}

/// Runs the check-device command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(path)?;
    println!("{}", describe(&config)?);
    Ok(())
}
