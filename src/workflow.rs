use crate::cli::Commands;
use crate::error::{RepinError, Result};
use crate::flake::Flake;
use crate::github::{self, GitHubClient};
use crate::registry::{self, Package, PackageSpec};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Upgrade,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Check => "check",
            Mode::Upgrade => "upgrade",
        }
    }
}

/// Translate the parsed subcommand into an action plus the nix-update
/// pass-through arguments. `do-upgrade` is sugar for an upgrade that also
/// builds, tests, and commits.
pub fn resolve_command(command: Commands) -> (Mode, Vec<String>) {
    match command {
        Commands::Check => (Mode::Check, Vec::new()),
        Commands::Upgrade { rest } => (Mode::Upgrade, rest),
        Commands::DoUpgrade { rest } => {
            let mut full: Vec<String> = ["--build", "--commit", "--test"]
                .iter()
                .map(|s| s.to_string())
                .collect();
            full.extend(rest);
            (Mode::Upgrade, full)
        }
    }
}

/// Run the selected action over the selected packages, strictly in registry
/// order. The first failing collaborator call aborts the remaining packages.
pub fn execute(mode: Mode, dir: &str, attrs: &[String], rest: Vec<String>) -> Result<()> {
    let dir = validate_dir(dir)?;
    let selected = registry::select(attrs)?;

    let names: Vec<_> = selected.iter().map(|p| p.attr).collect();
    info!(
        "we will {} the following packages: {}",
        mode.as_str().to_uppercase(),
        names.join(", ")
    );

    let packages = resolve_branches(&selected)?;

    let client = GitHubClient::new()?;
    let flake = Flake::new(&dir);

    for package in &packages {
        match mode {
            Mode::Check => check_package(&client, &flake, package)?,
            Mode::Upgrade => upgrade_package(&flake, package, &rest)?,
        }
    }

    Ok(())
}

fn validate_dir(dir: &str) -> Result<PathBuf> {
    let path = Path::new(dir);
    if !path.exists() {
        return Err(RepinError::Validation(format!(
            "path '{dir}' does not exist"
        )));
    }
    Ok(path.to_path_buf())
}

/// Backfill every unset branch once from the upstream default branch. The
/// returned collection is read-only for the rest of the run.
fn resolve_branches(specs: &[&'static PackageSpec]) -> Result<Vec<Package>> {
    specs
        .iter()
        .map(|spec| {
            let branch = match spec.branch {
                Some(branch) => branch.to_string(),
                None => {
                    let branch = github::fetch_default_branch(spec)?;
                    debug!("inferred {} branch to be {:?}", spec.repo, branch);
                    branch
                }
            };
            Ok(Package::from_spec(spec, branch))
        })
        .collect()
}

/// Report-only staleness check: compares the pinned revision against the
/// tracked branch and emits one annotation line per package.
fn check_package(client: &GitHubClient, flake: &Flake, package: &Package) -> Result<()> {
    let current = flake.pinned_rev(&package.attr)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Fetching upstream state of {}", package.attr));
    pb.enable_steady_tick(Duration::from_millis(100));

    let total_commits = client.fetch_commits_behind(package, &current)?;
    let latest = client.fetch_latest_commit(package)?;
    pb.finish_and_clear();

    let permalink = package.compare_permalink(&current, &latest);

    println!();
    println!("compare link: {}", package.compare_link(&current));
    println!("{}", check_annotation(package, total_commits, &permalink));
    println!();

    Ok(())
}

/// Move the pin, then smoke-test downstream users. Broken packages are still
/// updated but never built or tested.
fn upgrade_package(flake: &Flake, package: &Package, rest: &[String]) -> Result<()> {
    let mut rest = rest.to_vec();

    if flake.is_broken(&package.attr)? {
        println!("{}", broken_annotation(&package.attr));
        rest = strip_build_and_test(rest);
    }

    flake.update_pin(&package.attr, &package.branch, &rest)?;

    for downstream in &package.then {
        println!(
            "{}",
            format!("testing downstream build of {downstream}...").cyan()
        );
        flake.build(downstream)?;
    }

    Ok(())
}

fn check_annotation(package: &Package, total_commits: usize, permalink: &Url) -> String {
    let message = format!(
        "{} differs by {} non-merge commits from {} ({})",
        package.attr, total_commits, package.branch, permalink
    );

    if total_commits != 0 {
        format!(
            "::warning title=package outdated: {}::{}",
            package.attr, message
        )
    } else {
        format!(
            "::notice title=package up to date: {}::{}",
            package.attr, message
        )
    }
}

fn broken_annotation(attr: &str) -> String {
    format!("::warning title={attr} broken::will not build or test {attr} during upgrade")
}

fn strip_build_and_test(rest: Vec<String>) -> Vec<String> {
    rest.into_iter()
        .filter(|x| x != "--build" && x != "--test")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn basil() -> Package {
        Package {
            attr: "basil".to_string(),
            repo: "UQ-PAC/bil-to-boogie-translator".to_string(),
            branch: "main".to_string(),
            then: Vec::new(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn outdated_package_gets_a_warning() {
        let package = basil();
        let latest = "deadbeef".repeat(5);
        let permalink = package.compare_permalink("abc123", &latest);
        let line = check_annotation(&package, 3, &permalink);

        assert!(line.starts_with("::warning title=package outdated: basil::"));
        assert!(line.contains("basil differs by 3 non-merge commits from main"));
        assert!(line.contains(&format!(
            "https://github.com/UQ-PAC/bil-to-boogie-translator/compare/abc123...{latest}"
        )));
    }

    #[test]
    fn up_to_date_package_gets_a_notice() {
        let package = basil();
        let permalink = package.compare_permalink("abc123", "abc123");
        let line = check_annotation(&package, 0, &permalink);

        assert!(line.starts_with("::notice title=package up to date: basil::"));
        assert!(line.contains("differs by 0 non-merge commits from main"));
    }

    #[test]
    fn broken_annotation_names_the_attr_twice() {
        assert_eq!(
            broken_annotation("basil"),
            "::warning title=basil broken::will not build or test basil during upgrade"
        );
    }

    #[test]
    fn broken_packages_are_never_built_or_tested() {
        let rest = strings(&["--build", "--commit", "--test", "--format"]);
        let filtered = strip_build_and_test(rest);
        assert_eq!(filtered, strings(&["--commit", "--format"]));
        assert!(!filtered.iter().any(|x| x == "--build" || x == "--test"));
    }

    #[test]
    fn do_upgrade_prepends_build_commit_test() {
        let (mode, rest) = resolve_command(Commands::DoUpgrade {
            rest: strings(&["--format", "--option", "x"]),
        });
        assert_eq!(mode, Mode::Upgrade);
        assert_eq!(
            rest,
            strings(&["--build", "--commit", "--test", "--format", "--option", "x"])
        );
    }

    #[test]
    fn plain_upgrade_forwards_rest_untouched() {
        let (mode, rest) = resolve_command(Commands::Upgrade {
            rest: strings(&["--format"]),
        });
        assert_eq!(mode, Mode::Upgrade);
        assert_eq!(rest, strings(&["--format"]));
    }

    #[test]
    fn check_takes_no_pass_through_arguments() {
        let (mode, rest) = resolve_command(Commands::Check);
        assert_eq!(mode, Mode::Check);
        assert!(rest.is_empty());
    }

    #[test]
    fn existing_dir_is_accepted() {
        let dir = tempdir().unwrap();
        let validated = validate_dir(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(validated, dir.path());
    }

    #[test]
    fn missing_dir_is_rejected_before_any_package_work() {
        let err = validate_dir("/definitely/not/a/real/path").unwrap_err();
        assert!(matches!(err, RepinError::Validation(_)));
    }
}
