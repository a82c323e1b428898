use crate::error::{RepinError, Result};
use url::Url;

const GITHUB: &str = "https://github.com";

/// One row of the built-in package table: a flake attribute pinned to an
/// upstream GitHub repository.
#[derive(Debug)]
pub struct PackageSpec {
    pub attr: &'static str,
    /// GitHub "owner/name".
    pub repo: &'static str,
    /// Tracked branch; `None` means the upstream default branch is resolved
    /// once at startup.
    pub branch: Option<&'static str>,
    /// Flake attributes of downstream users, built after an upgrade to
    /// smoke-test dependents.
    pub then: &'static [&'static str],
}

pub const PACKAGES: &[PackageSpec] = &[
    PackageSpec {
        attr: "asli",
        repo: "UQ-PAC/aslp",
        branch: None,
        then: &[],
    },
    PackageSpec {
        attr: "bap-asli-plugin",
        repo: "UQ-PAC/bap-asli-plugin",
        branch: None,
        then: &[],
    },
    PackageSpec {
        attr: "basil",
        repo: "UQ-PAC/bil-to-boogie-translator",
        branch: None,
        then: &[],
    },
    PackageSpec {
        attr: "bap-primus",
        repo: "UQ-PAC/bap",
        branch: Some("aarch64-pull-request-2"),
        then: &[],
    },
    PackageSpec {
        attr: "asl-translator",
        repo: "UQ-PAC/llvm-translator",
        branch: Some("main"),
        then: &[],
    },
    PackageSpec {
        attr: "gtirb-semantics",
        repo: "UQ-PAC/gtirb-semantics",
        branch: Some("main"),
        then: &[],
    },
    PackageSpec {
        attr: "alive2-aslp",
        repo: "katrinafyi/alive2",
        branch: Some("aslp"),
        then: &[],
    },
    PackageSpec {
        attr: "alive2-regehr",
        repo: "regehr/alive2",
        branch: Some("arm-tv"),
        then: &[],
    },
];

pub fn known_attrs() -> Vec<&'static str> {
    PACKAGES.iter().map(|p| p.attr).collect()
}

/// Select packages by attribute, preserving registry order. An empty filter
/// selects everything; an unknown attribute is a validation error.
pub fn select(attrs: &[String]) -> Result<Vec<&'static PackageSpec>> {
    for attr in attrs {
        if !PACKAGES.iter().any(|p| p.attr == attr) {
            return Err(RepinError::Validation(format!(
                "unknown package '{}'. supported packages: {}",
                attr,
                known_attrs().join(", ")
            )));
        }
    }

    Ok(PACKAGES
        .iter()
        .filter(|p| attrs.is_empty() || attrs.iter().any(|a| a == p.attr))
        .collect())
}

impl PackageSpec {
    /// Clone URL used for the symbolic-ref query.
    pub fn git_url(&self) -> String {
        format!("{GITHUB}/{}.git", self.repo)
    }
}

/// A package with its tracked branch resolved. Constructed once at startup
/// and read-only for the rest of the run, so every URL builder below can
/// rely on a non-empty branch.
#[derive(Debug, Clone)]
pub struct Package {
    pub attr: String,
    pub repo: String,
    pub branch: String,
    pub then: Vec<String>,
}

impl Package {
    pub fn from_spec(spec: &PackageSpec, branch: String) -> Self {
        Self {
            attr: spec.attr.to_string(),
            repo: spec.repo.to_string(),
            branch,
            then: spec.then.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `https://github.com/<owner>/<name>`, built segment-by-segment so
    /// unusual characters in refs and repository names stay well-formed.
    fn repo_url(&self) -> Url {
        let mut url = Url::parse(GITHUB).expect("static base URL");
        url.path_segments_mut()
            .expect("https URLs have path segments")
            .pop_if_empty()
            .extend(self.repo.split('/'));
        url
    }

    fn repo_page(&self, segments: &[&str]) -> Url {
        let mut url = self.repo_url();
        url.path_segments_mut()
            .expect("https URLs have path segments")
            .extend(segments);
        url
    }

    /// Atom feed of commits on the tracked branch.
    pub fn commits_atom(&self) -> Url {
        self.repo_page(&["commits", &format!("{}.atom", self.branch)])
    }

    /// Prefix of per-commit page URLs inside the Atom feed entries.
    pub fn commit_marker(&self) -> String {
        format!("{}/commit/", self.repo_url())
    }

    /// Stable comparison URL between two revisions.
    pub fn compare_permalink(&self, base: &str, target: &str) -> Url {
        self.repo_page(&["compare", &format!("{base}...{target}")])
    }

    /// Comparison of a base revision against the tracked branch.
    pub fn compare_link(&self, base: &str) -> Url {
        self.compare_permalink(base, &self.branch)
    }

    /// Patch-format rendering of `compare_link`, one `---` separator per
    /// non-merge commit.
    pub fn compare_patch(&self, base: &str) -> Url {
        self.repo_page(&["compare", &format!("{base}...{}.patch", self.branch)])
    }
}
