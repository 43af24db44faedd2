use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

/// Environment variable holding the encryption key (fallback, warned)
pub const KEY_ENV_VAR: &str = "SHROUD_ENCRYPTION_KEY";

/// Modes for encryption key delivery, checked in order
#[derive(Debug, PartialEq, Eq)]
pub enum KeySource {
    /// From --key-file /path/to/key (container-native)
    File(String),
    /// From SHROUD_ENCRYPTION_KEY env var (fallback, warned as insecure)
    EnvVar,
    /// From stdin prompt (interactive, masked input)
    Stdin,
}

/// Determine key source from CLI arguments
///
/// 1. If key_file is Some, use File
/// 2. If SHROUD_ENCRYPTION_KEY is set, use EnvVar
/// 3. Otherwise, use Stdin
pub fn determine_key_source(key_file: Option<String>) -> KeySource {
    if let Some(file) = key_file {
        KeySource::File(file)
    } else if std::env::var_os(KEY_ENV_VAR).is_some() {
        KeySource::EnvVar
    } else {
        KeySource::Stdin
    }
}

/// Read the encryption key from the chosen source. The key is never logged.
pub fn read_encryption_key(
    source: KeySource,
) -> Result<Zeroizing<String>, Box<dyn std::error::Error>> {
    let key = match source {
        KeySource::File(path) => {
            if !Path::new(&path).exists() {
                return Err(format!("Key file not found: {}", path).into());
            }

            let contents = Zeroizing::new(
                fs::read_to_string(&path).map_err(|e| format!("Failed to read key file: {}", e))?,
            );
            Zeroizing::new(contents.trim().to_string())
        }
        KeySource::EnvVar => {
            eprintln!("⚠️  WARNING: Using {} is insecure", KEY_ENV_VAR);
            eprintln!("   The key is visible to other processes of the same user");
            eprintln!("   Consider using --key-file instead");
            eprintln!();

            Zeroizing::new(
                std::env::var(KEY_ENV_VAR).map_err(|_| format!("{} env var not set", KEY_ENV_VAR))?,
            )
        }
        KeySource::Stdin => Zeroizing::new(
            rpassword::prompt_password("Encryption key: ")
                .map_err(|e| format!("Failed to read encryption key from stdin: {}", e))?,
        ),
    };

    if key.is_empty() {
        return Err("Encryption key cannot be empty".into());
    }
    Ok(key)
}
