use crate::error::{RepinError, Result};
use crate::registry::{Package, PackageSpec};
use crate::runner;
use quick_xml::de::from_str;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const COMMIT_ID_LEN: usize = 40;
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Client for GitHub's Atom and patch surfaces. Requests are unauthenticated
/// unless `GITHUB_TOKEN` is set, in which case it is forwarded as a bearer
/// token.
pub struct GitHubClient {
    client: Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("repin/0.1.0")
            .build()
            .map_err(|e| RepinError::Io(std::io::Error::other(e)))?;

        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self { client, token })
    }

    /// Latest commit id on the package's tracked branch, taken from the
    /// first entry of the commits Atom feed.
    pub fn fetch_latest_commit(&self, package: &Package) -> Result<String> {
        let text = self.get_text(&package.commits_atom())?;

        let feed: Feed = from_str(&text).map_err(|e| {
            RepinError::FeedParsing(format!(
                "failed to parse commits feed for {}: {e}",
                package.repo
            ))
        })?;

        let entry = feed.entries.first().ok_or_else(|| {
            RepinError::FeedParsing(format!("commits feed for {} has no entries", package.repo))
        })?;

        extract_commit_id(&entry.link.href, &package.commit_marker())
    }

    /// How many non-merge commits the given base revision is behind the
    /// tracked branch, counted from the comparison's patch rendering.
    pub fn fetch_commits_behind(&self, package: &Package, base: &str) -> Result<usize> {
        let text = self.get_text(&package.compare_patch(base))?;
        Ok(count_patch_commits(&text))
    }

    fn get_text(&self, url: &Url) -> Result<String> {
        debug!("request: {url} authenticated={}", self.token.is_some());

        let mut request = self.client.get(url.as_str());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| RepinError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepinError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().map_err(|e| RepinError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if text.len() > MAX_RESPONSE_BYTES {
            return Err(RepinError::Io(std::io::Error::other(
                "response exceeded 10MB limit",
            )));
        }

        Ok(text)
    }
}

/// Resolve the upstream default branch by asking the remote for its symbolic
/// HEAD reference and taking the ref path's final segment.
pub fn fetch_default_branch(spec: &PackageSpec) -> Result<String> {
    let args = vec![
        "ls-remote".to_string(),
        "--symref".to_string(),
        spec.git_url(),
        "HEAD".to_string(),
    ];
    let output = runner::run("git", &args)?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    parse_symref(&stdout).ok_or_else(|| {
        RepinError::FeedParsing(format!(
            "could not resolve the default branch of {} from ls-remote output",
            spec.repo
        ))
    })
}

/// First line of `git ls-remote --symref` output looks like
/// `ref: refs/heads/main\tHEAD`; the branch is the last path segment of the
/// first tab-separated field.
fn parse_symref(output: &str) -> Option<String> {
    let field = output.split('\t').next()?;
    let name = field.rsplit('/').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Exactly the 40 characters after the per-commit URL prefix.
fn extract_commit_id(href: &str, marker: &str) -> Result<String> {
    let start = href
        .find(marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| {
            RepinError::FeedParsing(format!("entry link '{href}' does not contain '{marker}'"))
        })?;

    let id: String = href[start..].chars().take(COMMIT_ID_LEN).collect();
    if id.len() != COMMIT_ID_LEN || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RepinError::FeedParsing(format!(
            "'{id}' is not a {COMMIT_ID_LEN}-character commit id"
        )));
    }

    Ok(id)
}

/// Each non-merge commit in a compare patch is preceded by a lone `---`
/// line; the count of that separator is the commit count. This is a
/// structural artifact of the patch format, counted literally.
fn count_patch_commits(patch: &str) -> usize {
    patch.replace('\r', "").matches("\n---\n").count()
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    link: EntryLink,
}

#[derive(Debug, Deserialize)]
struct EntryLink {
    #[serde(rename = "@href")]
    href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "https://github.com/UQ-PAC/bil-to-boogie-translator/commit/";

    #[test]
    fn symref_output_yields_final_path_segment() {
        let out = "ref: refs/heads/main\tHEAD\nabc123\tHEAD\n";
        assert_eq!(parse_symref(out).as_deref(), Some("main"));
    }

    #[test]
    fn symref_keeps_slashes_out_of_branch_name() {
        let out = "ref: refs/heads/feature/nested\tHEAD\n";
        assert_eq!(parse_symref(out).as_deref(), Some("nested"));
    }

    #[test]
    fn empty_symref_output_is_rejected() {
        assert_eq!(parse_symref(""), None);
    }

    #[test]
    fn extracts_forty_hex_characters_after_marker() {
        let sha = "deadbeef".repeat(5);
        let href = format!("{MARKER}{sha}");
        assert_eq!(extract_commit_id(&href, MARKER).unwrap(), sha);
    }

    #[test]
    fn truncates_trailing_url_noise_to_forty_characters() {
        let sha = "0123456789abcdef0123456789abcdef01234567";
        let href = format!("{MARKER}{sha}89abcdef");
        assert_eq!(extract_commit_id(&href, MARKER).unwrap(), sha);
    }

    #[test]
    fn short_commit_id_is_an_error() {
        let href = format!("{MARKER}abc123");
        assert!(extract_commit_id(&href, MARKER).is_err());
    }

    #[test]
    fn missing_marker_is_an_error() {
        assert!(extract_commit_id("https://example.com/x", MARKER).is_err());
    }

    #[test]
    fn patch_separator_count_matches_commit_count() {
        let patch = "From one\n---\n diff\nFrom two\n---\n diff\nFrom three\n---\n diff\n";
        assert_eq!(count_patch_commits(patch), 3);
    }

    #[test]
    fn identical_revisions_compare_to_zero() {
        assert_eq!(count_patch_commits(""), 0);
        assert_eq!(count_patch_commits("no separators here\n"), 0);
    }

    #[test]
    fn carriage_returns_do_not_hide_separators() {
        let patch = "From one\r\n---\r\n diff\r\n";
        assert_eq!(count_patch_commits(patch), 1);
    }

    #[test]
    fn feed_first_entry_link_is_used() {
        let sha = "deadbeef".repeat(5);
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>tag:github.com,2008:/UQ-PAC/bil-to-boogie-translator/commits/main</id>
  <title>Recent Commits to bil-to-boogie-translator:main</title>
  <entry>
    <id>tag:github.com,2008:Grit::Commit/{sha}</id>
    <link type="text/html" rel="alternate" href="{MARKER}{sha}"/>
    <title>latest change</title>
  </entry>
  <entry>
    <id>tag:github.com,2008:Grit::Commit/older</id>
    <link type="text/html" rel="alternate" href="{MARKER}{older}"/>
    <title>older change</title>
  </entry>
</feed>"#,
            older = "0".repeat(40),
        );

        let feed: Feed = from_str(&xml).unwrap();
        assert_eq!(feed.entries.len(), 2);
        let id = extract_commit_id(&feed.entries[0].link.href, MARKER).unwrap();
        assert_eq!(id, sha);
        assert_eq!(id.len(), COMMIT_ID_LEN);
    }

    #[test]
    fn feed_without_entries_deserializes_empty() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        let feed: Feed = from_str(xml).unwrap();
        assert!(feed.entries.is_empty());
    }

    #[test]
    #[ignore] // Requires network access
    fn fetches_latest_commit_from_github() {
        let package = Package {
            attr: "basil".to_string(),
            repo: "UQ-PAC/bil-to-boogie-translator".to_string(),
            branch: "main".to_string(),
            then: Vec::new(),
        };
        let client = GitHubClient::new().unwrap();
        let latest = client.fetch_latest_commit(&package).unwrap();
        assert_eq!(latest.len(), COMMIT_ID_LEN);
    }
}
