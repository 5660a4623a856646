// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolving the source package identity from `debian/changelog`.

The first entry heading of a changelog has the form
`package (version) distribution(s); urgency=value`. The pipeline only
needs the package name and version; everything after the closing
parenthesis is ignored.
*/

use {
    crate::{
        error::{AutobuildError, Result},
        version::PackageVersion,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    std::path::Path,
};

static ENTRY_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<source>[a-z0-9][a-z0-9+.-]+)\s+\((?P<version>[^)\s]+)\)\s+\S")
        .expect("changelog heading regex is valid")
});

/// The `(source, version)` pair a build tree will produce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceIdentity {
    source: String,
    version: PackageVersion,
}

impl SourceIdentity {
    /// Parse an identity from changelog content.
    pub fn from_changelog(text: &str) -> Result<Self> {
        let heading = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| AutobuildError::ChangelogParse("changelog is empty".to_string()))?;

        let caps = ENTRY_HEADING_RE
            .captures(heading)
            .ok_or_else(|| AutobuildError::ChangelogParse(heading.to_string()))?;

        Ok(Self {
            source: caps["source"].to_string(),
            version: PackageVersion::parse(&caps["version"])?,
        })
    }

    /// Read the identity from a build tree's `debian/changelog`.
    pub fn from_build_tree(tree: &Path) -> Result<Self> {
        let path = tree.join("debian").join("changelog");

        if !path.is_file() {
            return Err(AutobuildError::ChangelogParse(format!(
                "{} not found",
                path.display()
            )));
        }

        Self::from_changelog(&std::fs::read_to_string(path)?)
    }

    /// The source package name.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The full package version.
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// Expected orig tarball filename for this identity.
    pub fn orig_tarball_name(&self) -> String {
        format!(
            "{}_{}.orig.tar.gz",
            self.source,
            self.version.upstream_version()
        )
    }

    /// Glob pattern matching `.changes` files this identity produces.
    pub fn changes_pattern(&self) -> String {
        format!("{}_{}_*.changes", self.source, self.version.filename_version())
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    #[test]
    fn parses_first_entry() -> Result<()> {
        let identity = SourceIdentity::from_changelog(indoc! {"
            widget (1:2.3-4) unstable; urgency=medium

              * Fix the frobnicator.

             -- A Maintainer <am@example.com>  Tue, 30 Dec 2014 21:26:40 -0700

            widget (1:2.3-3) unstable; urgency=low

              * Earlier.
        "})?;

        assert_eq!(identity.source(), "widget");
        assert_eq!(identity.version().upstream_version(), "2.3");
        assert_eq!(identity.orig_tarball_name(), "widget_2.3.orig.tar.gz");
        assert_eq!(identity.changes_pattern(), "widget_2.3-4_*.changes");

        Ok(())
    }

    #[test]
    fn native_identity() -> Result<()> {
        let identity = SourceIdentity::from_changelog("tool (0.9) stable; urgency=low\n")?;

        assert!(identity.version().is_native());
        assert_eq!(identity.changes_pattern(), "tool_0.9_*.changes");

        Ok(())
    }

    #[test]
    fn rejects_malformed_heading() {
        assert!(matches!(
            SourceIdentity::from_changelog("not a changelog at all\n"),
            Err(AutobuildError::ChangelogParse(_))
        ));
        assert!(matches!(
            SourceIdentity::from_changelog(""),
            Err(AutobuildError::ChangelogParse(_))
        ));
    }
}
