// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Typed adapter over the `reprepro` repository tool.

The repository's on-disk state (configuration descriptor, database,
pool) is owned by reprepro and treated as opaque; this adapter exposes
the documented query and mutation operations with typed results. All
text parsing of tool output is confined to this module.
*/

use {
    crate::{
        command::{run_logged, run_unchecked},
        control::parse_paragraphs,
        error::{AutobuildError, Result},
    },
    log::info,
    once_cell::sync::Lazy,
    regex::Regex,
    std::path::{Path, PathBuf},
};

static LIST_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<codename>[^|]+)\|(?P<component>[^|]+)\|(?P<arch>[^:]+): (?P<package>\S+) (?P<version>\S+)$")
        .expect("list line regex is valid")
});

// reprepro's wording for the include conflict we know how to compensate
// for. Spelling has varied across releases; match the stable parts.
static CHECKSUM_CONFLICT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)already\s+(?:registered|exists?|existing).*?(?:different\s+checksums|md5)")
        .expect("conflict regex is valid")
});

/// One row of a repository package listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageListEntry {
    pub codename: String,
    pub component: String,
    pub architecture: String,
    pub package: String,
    pub version: String,
}

impl PackageListEntry {
    /// Parse a `codename|component|architecture: package version` line.
    pub fn parse(line: &str) -> Result<Self> {
        let caps = LIST_LINE_RE
            .captures(line)
            .ok_or_else(|| AutobuildError::PackageListParse(line.to_string()))?;

        Ok(Self {
            codename: caps["codename"].to_string(),
            component: caps["component"].to_string(),
            architecture: caps["arch"].to_string(),
            package: caps["package"].to_string(),
            version: caps["version"].to_string(),
        })
    }

    /// Whether this row describes a source package entry.
    pub fn is_source(&self) -> bool {
        self.architecture == "source"
    }
}

/// Result of attempting to include a changes file.
#[derive(Debug)]
pub enum IncludeOutcome {
    /// The changes file was registered.
    Included,
    /// A contained file is already registered with different checksums.
    ChecksumConflict(String),
    /// Any other failure; the tool's diagnostic is carried verbatim.
    Failed(String),
}

/// Handle to a reprepro-managed repository.
pub struct Reprepro {
    basedir: PathBuf,
}

impl Reprepro {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
        }
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Whether the repository has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.distributions_path().is_file()
    }

    fn distributions_path(&self) -> PathBuf {
        self.basedir.join("conf").join("distributions")
    }

    fn basedir_arg(&self) -> String {
        self.basedir.display().to_string()
    }

    /// Codenames defined in the configuration descriptor.
    pub fn codenames(&self) -> Result<Vec<String>> {
        let path = self.distributions_path();

        if !path.is_file() {
            return Err(AutobuildError::RepositoryNotInitialized(
                path.display().to_string(),
            ));
        }

        let text = std::fs::read_to_string(path)?;

        Ok(parse_paragraphs(&text)?
            .iter()
            .filter_map(|p| p.field_str("Codename"))
            .map(|s| s.to_string())
            .collect())
    }

    fn run_query(&self, args: &[&str]) -> Result<String> {
        let basedir = self.basedir_arg();

        let mut full: Vec<&str> = vec!["--basedir", &basedir];
        full.extend_from_slice(args);

        let output = run_unchecked("reprepro", &full, None)?;

        if output.success() {
            Ok(output.output)
        } else {
            Err(output.into_error())
        }
    }

    /// List every package registered for a codename.
    pub fn list(&self, codename: &str) -> Result<Vec<PackageListEntry>> {
        let output = self.run_query(&["list", codename])?;

        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PackageListEntry::parse)
            .collect()
    }

    /// List entries belonging to an exact (source, version).
    ///
    /// Matches binaries through their source package, so renamed binary
    /// packages are found too.
    pub fn list_source_version(
        &self,
        codename: &str,
        source: &str,
        version: &str,
    ) -> Result<Vec<PackageListEntry>> {
        let formula = format!("$Source (=={}), $Version (=={})", source, version);

        let output = self.run_query(&["listfilter", codename, formula.as_str()])?;

        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(PackageListEntry::parse)
            .collect()
    }

    /// Register a changes file into a codename.
    pub fn include(&self, codename: &str, changes: &Path) -> Result<IncludeOutcome> {
        let basedir = self.basedir_arg();
        let changes = changes.display().to_string();

        info!("including {} into {}", changes, codename);

        let output = run_unchecked(
            "reprepro",
            ["--basedir", basedir.as_str(), "include", codename, changes.as_str()],
            None,
        )?;

        Ok(if output.success() {
            IncludeOutcome::Included
        } else if classify_checksum_conflict(&output.output) {
            IncludeOutcome::ChecksumConflict(output.output)
        } else {
            IncludeOutcome::Failed(output.output)
        })
    }

    /// Remove a source package and all its binaries at a version.
    pub fn remove_source_version(
        &self,
        codename: &str,
        source: &str,
        version: &str,
    ) -> Result<()> {
        let basedir = self.basedir_arg();

        run_logged(
            "reprepro",
            [
                "--basedir",
                basedir.as_str(),
                "removesrc",
                codename,
                source,
                version,
            ],
            None,
        )
    }

    /// Drop pool files no longer referenced by any index.
    pub fn delete_unreferenced(&self) -> Result<()> {
        let basedir = self.basedir_arg();

        run_logged(
            "reprepro",
            ["--basedir", basedir.as_str(), "deleteunreferenced"],
            None,
        )
    }

    /// Regenerate (and sign, when configured) the repository indices.
    pub fn export(&self, codename: Option<&str>) -> Result<()> {
        let basedir = self.basedir_arg();

        let mut args = vec!["--basedir", basedir.as_str(), "export"];

        if let Some(codename) = codename {
            args.push(codename);
        }

        run_logged("reprepro", &args, None)
    }
}

/// Whether tool output describes the replayable checksum conflict.
pub fn classify_checksum_conflict(output: &str) -> bool {
    CHECKSUM_CONFLICT_RE.is_match(output)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_list_lines() -> Result<()> {
        let entry = PackageListEntry::parse("stable|main|amd64: widget 1.0-1")?;

        assert_eq!(
            entry,
            PackageListEntry {
                codename: "stable".to_string(),
                component: "main".to_string(),
                architecture: "amd64".to_string(),
                package: "widget".to_string(),
                version: "1.0-1".to_string(),
            }
        );
        assert!(!entry.is_source());

        let entry = PackageListEntry::parse("stable|main|source: widget 1.0-1")?;
        assert!(entry.is_source());

        Ok(())
    }

    #[test]
    fn malformed_list_line_is_an_error() {
        assert!(matches!(
            PackageListEntry::parse("not a listing"),
            Err(AutobuildError::PackageListParse(_))
        ));
    }

    #[test]
    fn conflict_classification() {
        assert!(classify_checksum_conflict(
            "ERROR: 'pool/main/w/widget/widget_1.0.orig.tar.gz' is already registered with different checksums!"
        ));
        assert!(classify_checksum_conflict(
            "File \"widget_1.0.orig.tar.gz\" is already registered with other md5sum!"
        ));
        assert!(!classify_checksum_conflict(
            "Cannot find definition of distribution 'nonesuch'!"
        ));
        assert!(!classify_checksum_conflict(""));
    }
}
