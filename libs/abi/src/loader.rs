//! ABI file loading
//!
//! Accepts either a bare ABI array or a build artifact with an `"abi"` field.

use ethabi::Contract;
use std::path::Path;
use tracing::info;

use crate::error::AbiError;

/// Load `dir/file`. Relative `dir` resolves against the working directory.
pub fn load_abi(dir: &Path, file: &str) -> Result<Contract, AbiError> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).map_err(|source| AbiError::Io {
        path: path.clone(),
        source,
    })?;
    let contract = parse_abi(&content, &path.display().to_string())?;
    info!(
        "📜 Loaded ABI {:?}: {} events, {} functions",
        path,
        contract.events.len(),
        contract.functions.len()
    );
    Ok(contract)
}

/// Parse ABI JSON; `origin` only labels errors.
pub fn parse_abi(json: &str, origin: &str) -> Result<Contract, AbiError> {
    let parse_err = |message: String| AbiError::Parse {
        origin: origin.to_string(),
        message,
    };

    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| parse_err(e.to_string()))?;
    let abi = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| parse_err("object without an \"abi\" field".to_string()))?,
        other => other,
    };
    serde_json::from_value(abi).map_err(|e| parse_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EVENT_ONLY: &str = r#"[
        {"type":"event","name":"NewPoolContract","anonymous":false,
         "inputs":[{"name":"pool","type":"address","indexed":true}]}
    ]"#;

    #[test]
    fn test_load_relative_to_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pool.json"), EVENT_ONLY).unwrap();

        let contract = load_abi(dir.path(), "pool.json").unwrap();
        assert!(contract.events.contains_key("NewPoolContract"));
    }

    #[test]
    fn test_artifact_wrapper() {
        let artifact = format!(r#"{{"contractName":"Pool","abi":{EVENT_ONLY}}}"#);
        let contract = parse_abi(&artifact, "artifact").unwrap();
        assert_eq!(contract.events.len(), 1);
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let err = load_abi(dir.path(), "absent.json").unwrap_err();
        assert!(matches!(err, AbiError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_abi("[{", "inline"),
            Err(AbiError::Parse { .. })
        ));
    }
}
