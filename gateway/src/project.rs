//! Effective project-id derivation

use engram_config::ProjectIdMode;
use sha2::{Digest, Sha256};

/// Derive the owner scope for a request.
///
/// `auto` hashes the caller-provided project path into a stable
/// `prj_<hex8>` id and falls back to the default scope when no path
/// was supplied; `manual` and `global` always use the configured
/// value.
pub fn derive_project_id(
    mode: ProjectIdMode,
    project_path: Option<&str>,
    default_user_id: &str,
) -> String {
    match mode {
        ProjectIdMode::Auto => match project_path {
            Some(path) if !path.trim().is_empty() => {
                let mut hasher = Sha256::new();
                hasher.update(path.trim().as_bytes());
                let digest = hex::encode(hasher.finalize());
                format!("prj_{}", &digest[..8])
            }
            _ => default_user_id.to_string(),
        },
        ProjectIdMode::Manual | ProjectIdMode::Global => default_user_id.to_string(),
    }
}
