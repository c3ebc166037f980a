// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{HarnessError, HarnessResult},
    executor::Executor,
};

/// The variables handed to every invocation of the binary. Built once at startup.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    /// Location of the setup script relative to `GOPATH`.
    const SETUP_SCRIPT_SUFFIX: &'static str =
        "src/github.com/harmony-one/harmony/scripts/setup_bls_build_flags.sh";

    /// Run the setup script in a shell and decode the JSON object it prints.
    /// The caller's `HOME` is added to the result.
    pub fn from_setup_script<E: Executor>(script: &Path, executor: &E) -> HarnessResult<Self> {
        if !script.is_file() {
            return Err(HarnessError::MissingSetupScript(script.to_path_buf()));
        }

        // The path travels as `$0` so the shell never parses it.
        let command = format!("source '{}' -v", script.display());
        let args = vec![
            "-c".to_string(),
            "source \"$0\" -v".to_string(),
            script.display().to_string(),
        ];
        let output = executor
            .run(Path::new("bash"), &args, None)
            .map_err(|e| HarnessError::Spawn {
                command: command.clone(),
                source: e,
            })?;
        if !output.success() {
            return Err(HarnessError::CommandFailed {
                command,
                code: output.code,
                stderr: output.stderr,
            });
        }

        let mut environment = Self::from_json(&output.stdout)?;
        environment.inherit_home();
        tracing::debug!(
            "Loaded {} environment variables from '{}'",
            environment.len(),
            script.display()
        );
        Ok(environment)
    }

    /// An environment holding only the caller's `HOME`.
    pub fn home_only() -> Self {
        let mut environment = Self::default();
        environment.inherit_home();
        environment
    }

    /// Decode a JSON object of string values.
    pub fn from_json(content: &str) -> HarnessResult<Self> {
        serde_json::from_str(content).map_err(|e| {
            HarnessError::Environment(format!("setup script output is not a JSON object: {e}"))
        })
    }

    /// Default location of the setup script, derived from `go env GOPATH`.
    pub fn default_setup_script<E: Executor>(executor: &E) -> HarnessResult<PathBuf> {
        let args = vec!["env".to_string(), "GOPATH".to_string()];
        let output = executor
            .run(Path::new("go"), &args, None)
            .map_err(|e| HarnessError::Spawn {
                command: "go env GOPATH".to_string(),
                source: e,
            })?;
        let go_path = output.stdout.trim();
        if !output.success() || go_path.is_empty() {
            return Err(HarnessError::Environment(format!(
                "could not resolve GOPATH: {}",
                output.stderr.trim()
            )));
        }
        Ok(Path::new(go_path).join(Self::SETUP_SCRIPT_SUFFIX))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn inherit_home(&mut self) {
        if let Ok(home) = env::var("HOME") {
            self.insert("HOME", home);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::executor::SystemExecutor;

    #[test]
    fn decodes_string_object() {
        let environment =
            Environment::from_json(r#"{"CGO_CFLAGS": "-I/bls/include", "GO111MODULE": "on"}"#)
                .unwrap();
        assert_eq!(environment.len(), 2);
        assert_eq!(environment.get("CGO_CFLAGS"), Some("-I/bls/include"));
    }

    #[test]
    fn rejects_malformed_output() {
        assert!(matches!(
            Environment::from_json("CGO_CFLAGS=-I/bls/include"),
            Err(HarnessError::Environment(_))
        ));
        assert!(Environment::from_json(r#"["a", "b"]"#).is_err());
        assert!(Environment::from_json(r#"{"GOPATH": 1}"#).is_err());
    }

    #[test]
    fn missing_script_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup_bls_build_flags.sh");
        assert!(matches!(
            Environment::from_setup_script(&script, &SystemExecutor),
            Err(HarnessError::MissingSetupScript(path)) if path == script
        ));
    }

    #[cfg(unix)]
    #[test]
    fn loads_variables_printed_by_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup.sh");
        fs::write(&script, "echo '{\"LD_LIBRARY_PATH\": \"/opt/bls/lib\"}'\n").unwrap();

        let environment = Environment::from_setup_script(&script, &SystemExecutor).unwrap();
        assert_eq!(environment.get("LD_LIBRARY_PATH"), Some("/opt/bls/lib"));
        assert_eq!(
            environment.get("HOME").map(str::to_string),
            env::var("HOME").ok()
        );
    }

    #[cfg(unix)]
    #[test]
    fn script_path_is_not_split_or_evaluated() {
        let dir = tempfile::tempdir().unwrap();
        let go_path = dir.path().join("Jane Doe; touch pwned").join("go");
        fs::create_dir_all(&go_path).unwrap();
        let script = go_path.join("setup $(touch pwned).sh");
        fs::write(&script, "echo '{\"GO111MODULE\": \"on\"}'\n").unwrap();

        let environment = Environment::from_setup_script(&script, &SystemExecutor).unwrap();
        assert_eq!(environment.get("GO111MODULE"), Some("on"));
        assert!(!Path::new("pwned").exists());
        assert!(!dir.path().join("pwned").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_script_is_reported_with_its_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("setup.sh");
        fs::write(&script, "echo 'no bls checkout' 1>&2\nreturn 2\n").unwrap();

        match Environment::from_setup_script(&script, &SystemExecutor) {
            Err(HarnessError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(2));
                assert!(stderr.contains("no bls checkout"));
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
