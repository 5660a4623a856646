// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The ordered list of upstream projects to build.

The list file holds one Git URL per line. `#` starts a comment that runs
to the end of the line, blank lines are ignored, and a leading
`<digits>.` ordinal (a convenience for keeping the file sorted) is
stripped before the URL is parsed.
*/

use {
    crate::error::{AutobuildError, Result},
    std::path::Path,
};

/// A single project from the build list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectEntry {
    name: String,
    url: String,
}

impl ProjectEntry {
    /// Construct an instance from a Git URL.
    ///
    /// The short name is the final path segment of the URL with any
    /// `.git` suffix removed. Both `https://` and scp-like
    /// `user@host:path` URLs are understood.
    pub fn from_url(url: &str) -> Option<Self> {
        let tail = url.trim_end_matches('/');

        let basename = tail
            .rsplit('/')
            .next()
            .map(|last| last.rsplit(':').next().unwrap_or(last))?;

        let name = basename.strip_suffix(".git").unwrap_or(basename);

        if name.is_empty() {
            None
        } else {
            Some(Self {
                name: name.to_string(),
                url: url.to_string(),
            })
        }
    }

    /// Short project name, used for directory names and filtering.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Git remote URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse the content of a project list file.
pub fn parse_project_list(text: &str) -> Result<Vec<ProjectEntry>> {
    let mut entries = vec![];

    for (index, raw_line) in text.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[0..pos],
            None => raw_line,
        };

        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        let line = strip_ordinal(line);

        let entry = ProjectEntry::from_url(line)
            .ok_or_else(|| AutobuildError::ProjectListEntry(index + 1, raw_line.to_string()))?;

        entries.push(entry);
    }

    Ok(entries)
}

/// Read and parse a project list file.
pub fn read_project_list(path: &Path) -> Result<Vec<ProjectEntry>> {
    if !path.is_file() {
        return Err(AutobuildError::ProjectListMissing(
            path.display().to_string(),
        ));
    }

    parse_project_list(&std::fs::read_to_string(path)?)
}

/// Reduce a project list to entries whose name matches a filter.
///
/// An empty filter list selects everything.
pub fn filter_projects(entries: Vec<ProjectEntry>, filters: &[String]) -> Vec<ProjectEntry> {
    if filters.is_empty() {
        entries
    } else {
        entries
            .into_iter()
            .filter(|entry| filters.iter().any(|f| f == entry.name()))
            .collect()
    }
}

fn strip_ordinal(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();

    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return rest.trim_start();
        }
    }

    line
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    #[test]
    fn name_derivation() {
        let entry = ProjectEntry::from_url("https://example.com/foo/bar.git").unwrap();
        assert_eq!(entry.name(), "bar");

        let entry = ProjectEntry::from_url("https://example.com/foo/bar").unwrap();
        assert_eq!(entry.name(), "bar");

        let entry = ProjectEntry::from_url("git@example.com:team/widget.git").unwrap();
        assert_eq!(entry.name(), "widget");
    }

    #[test]
    fn parse_filters_comments_and_ordinals() -> Result<()> {
        let entries = parse_project_list(indoc! {"
            # full line comment

            1. https://example.com/one.git
            https://example.com/two.git # trailing comment
            17.https://example.com/three.git
        "})?;

        assert_eq!(
            entries.iter().map(|e| e.name()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        assert_eq!(entries[0].url(), "https://example.com/one.git");

        Ok(())
    }

    #[test]
    fn parse_rejects_garbage_with_line_number() {
        let err = parse_project_list("https://example.com/ok.git\n///\n").unwrap_err();

        assert!(matches!(err, AutobuildError::ProjectListEntry(2, _)));
    }

    #[test]
    fn filters_select_by_name() -> Result<()> {
        let entries = parse_project_list("https://example.com/a.git\nhttps://example.com/b.git\n")?;

        let all = filter_projects(entries.clone(), &[]);
        assert_eq!(all.len(), 2);

        let only_b = filter_projects(entries, &["b".to_string()]);
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].name(), "b");

        Ok(())
    }
}
