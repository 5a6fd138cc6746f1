use std::fs;
use std::path::{Path, PathBuf};

use crate::units::Unit;
use crate::VelaError;

/// Persists a finished unit's artifacts: one source/descriptor pair per
/// generated class, filed under `src/` and `classes/` subtrees with the path
/// derived from the qualified class name (package separators become path
/// separators).
pub fn write_unit_artifacts(unit: &Unit, root: &Path) -> Result<Vec<PathBuf>, VelaError> {
    let mut written = Vec::new();
    for artifact in unit.artifacts() {
        let source_path = root.join("src").join(artifact.name.relative_path("java"));
        let descriptor_path = root
            .join("classes")
            .join(artifact.name.relative_path("json"));
        if let Some(parent) = source_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = descriptor_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&source_path, &artifact.source)?;
        let descriptor = serde_json::to_string_pretty(&artifact.descriptor)
            .map_err(|err| VelaError::Artifact(err.to_string()))?;
        fs::write(&descriptor_path, descriptor)?;
        written.push(source_path);
        written.push(descriptor_path);
    }
    Ok(written)
}
