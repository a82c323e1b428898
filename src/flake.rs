use crate::error::Result;
use crate::runner;
use std::path::{Path, PathBuf};

/// The host flake whose pins this tool reads and (via nix-update) mutates.
pub struct Flake {
    dir: PathBuf,
}

impl Flake {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn attr_ref(&self, attr: &str) -> String {
        format!("{}#{attr}", self.dir.display())
    }

    /// Currently pinned source revision of the given attribute.
    pub fn pinned_rev(&self, attr: &str) -> Result<String> {
        let args = vec!["eval".to_string(), format!("{}.src.rev", self.attr_ref(attr))];
        let output = runner::run("nix", &args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim().trim_matches('"').to_string())
    }

    /// Whether the attribute is marked broken in the flake's metadata.
    pub fn is_broken(&self, attr: &str) -> Result<bool> {
        let args = vec![
            "eval".to_string(),
            "--json".to_string(),
            format!("{}.meta.broken", self.attr_ref(attr)),
        ];
        let output = runner::run("nix", &args)?;
        let broken: bool = serde_json::from_slice(&output.stdout)?;
        Ok(broken)
    }

    /// Build an attribute without keeping a result link, purely as a smoke
    /// test.
    pub fn build(&self, attr: &str) -> Result<()> {
        let args = vec![
            "build".to_string(),
            self.attr_ref(attr),
            "--no-out-link".to_string(),
        ];
        runner::run("nix", &args)?;
        Ok(())
    }

    /// Move the attribute's pin to the head of the given branch. Depending
    /// on the forwarded flags, nix-update may also build, test, and commit.
    pub fn update_pin(&self, attr: &str, branch: &str, rest: &[String]) -> Result<()> {
        let mut args = vec![
            "--flake".to_string(),
            "-f".to_string(),
            self.dir.display().to_string(),
            attr.to_string(),
            "--version".to_string(),
            format!("branch={branch}"),
        ];
        args.extend(rest.iter().cloned());
        runner::run("nix-update", &args)?;
        Ok(())
    }
}
