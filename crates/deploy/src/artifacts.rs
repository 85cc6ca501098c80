//! Creation bytecode of compiled contracts.
//!
//! Artifacts are read from a Hardhat `artifacts/` directory, where every
//! contract is compiled to `contracts/**/<Name>.json` with a hex `bytecode`
//! field. Foundry's `out/` layout (`bytecode.object`) is accepted too.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use serde::Deserialize;

use crate::error::{DeployError, DeployResult};

/// Directories that never contain contract artifacts.
const IGNORED_DIRS: &[&str] = &["build-info", "cache"];

#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

/// Resolves contract names to creation bytecode.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    root: Option<PathBuf>,
    preloaded: HashMap<String, Bytes>,
}

impl ArtifactStore {
    /// Read artifacts from a compiler output directory.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            preloaded: HashMap::new(),
        }
    }

    /// Register bytecode for a contract directly, bypassing the filesystem.
    pub fn with_bytecode(mut self, name: impl Into<String>, bytecode: Bytes) -> Self {
        self.preloaded.insert(name.into(), bytecode);
        self
    }

    /// The creation bytecode of contract `name`.
    pub fn bytecode(&self, name: &str) -> DeployResult<Bytes> {
        if let Some(bytecode) = self.preloaded.get(name) {
            return Ok(bytecode.clone());
        }

        let root = self
            .root
            .as_deref()
            .ok_or_else(|| DeployError::Artifact(format!("no artifact registered for {name}")))?;

        let path = find_artifact(root, &format!("{name}.json"))?.ok_or_else(|| {
            DeployError::Artifact(format!("{name}.json not found under {}", root.display()))
        })?;

        let content = fs::read_to_string(&path)
            .map_err(|e| DeployError::Artifact(format!("failed to read {}: {e}", path.display())))?;
        let artifact: ArtifactFile = serde_json::from_str(&content).map_err(|e| {
            DeployError::Artifact(format!("failed to parse {}: {e}", path.display()))
        })?;

        let bytecode = match artifact.bytecode {
            BytecodeField::Hex(bytes) => bytes,
            BytecodeField::Object { object } => object,
        };
        if bytecode.is_empty() {
            return Err(DeployError::Artifact(format!(
                "{name} has no creation bytecode (abstract contract or interface?)"
            )));
        }

        tracing::debug!(contract = name, path = %path.display(), size = bytecode.len(), "Artifact loaded");
        Ok(bytecode)
    }
}

fn find_artifact(dir: &Path, file_name: &str) -> DeployResult<Option<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DeployError::Artifact(format!("failed to read {}: {e}", dir.display())))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DeployError::Artifact(e.to_string()))?;
        let path = entry.path();

        if path.is_dir() {
            let ignored = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| IGNORED_DIRS.contains(&n));
            if !ignored {
                subdirs.push(path);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_artifact(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_hardhat_artifact() {
        let temp_dir = TempDir::new("swapkit-artifacts").unwrap();
        write(
            temp_dir.path(),
            "contracts/factory/SwapFactory.sol/SwapFactory.json",
            r#"{"contractName":"SwapFactory","bytecode":"0x6080604052"}"#,
        );
        write(
            temp_dir.path(),
            "contracts/factory/SwapFactory.sol/SwapFactory.dbg.json",
            r#"{"buildInfo":"../../build-info/abc.json"}"#,
        );

        let store = ArtifactStore::from_dir(temp_dir.path());
        let bytecode = store.bytecode("SwapFactory").unwrap();
        assert_eq!(bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_foundry_artifact() {
        let temp_dir = TempDir::new("swapkit-artifacts").unwrap();
        write(
            temp_dir.path(),
            "PoolCreator.sol/PoolCreator.json",
            r#"{"bytecode":{"object":"0x6001","sourceMap":""}}"#,
        );

        let store = ArtifactStore::from_dir(temp_dir.path());
        assert_eq!(store.bytecode("PoolCreator").unwrap().to_vec(), vec![0x60, 0x01]);
    }

    #[test]
    fn test_build_info_is_ignored() {
        let temp_dir = TempDir::new("swapkit-artifacts").unwrap();
        write(
            temp_dir.path(),
            "build-info/PoolCreator.json",
            r#"{"bytecode":"0x6001"}"#,
        );

        let store = ArtifactStore::from_dir(temp_dir.path());
        assert!(matches!(
            store.bytecode("PoolCreator"),
            Err(DeployError::Artifact(_))
        ));
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let temp_dir = TempDir::new("swapkit-artifacts").unwrap();
        write(
            temp_dir.path(),
            "contracts/IPool.sol/IPool.json",
            r#"{"bytecode":"0x"}"#,
        );

        let store = ArtifactStore::from_dir(temp_dir.path());
        assert!(store.bytecode("IPool").is_err());
    }

    #[test]
    fn test_preloaded_bytecode_wins() {
        let store = ArtifactStore::default().with_bytecode("PoolCreator", Bytes::from(vec![1]));
        assert_eq!(store.bytecode("PoolCreator").unwrap().to_vec(), vec![1]);
        assert!(store.bytecode("SwapFactory").is_err());
    }
}
