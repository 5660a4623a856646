// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling.

The format is `[epoch:]upstream_version[-debian_revision]` with character
rules per <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
The pipeline cares about decomposition: the upstream portion names the
orig tarball and a missing Debian revision marks a native package.
*/

use {
    std::{
        fmt::{Display, Formatter},
        num::ParseIntError,
        str::FromStr,
    },
    thiserror::Error,
};

#[derive(Clone, Debug, Error)]
pub enum VersionError {
    #[error("error parsing string to integer: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("the epoch component has non-digit characters: {0}")]
    EpochNonNumeric(String),

    #[error("upstream_version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("debian_revision component has illegal character: {0}")]
    DebianRevisionIllegalChar(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// A decomposed Debian package version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        // Epoch is everything before the first colon, if present. The
        // upstream / revision split is on the last hyphen so upstream
        // versions may themselves contain hyphens.
        let (epoch, remainder) = match s.find(':') {
            Some(pos) => (Some(&s[0..pos]), &s[pos + 1..]),
            None => (None, s),
        };

        let (upstream, revision) = match remainder.rfind('-') {
            Some(pos) => (&remainder[0..pos], Some(&remainder[pos + 1..])),
            None => (remainder, None),
        };

        let epoch = match epoch {
            Some(epoch) => {
                if !epoch.chars().all(|c| c.is_ascii_digit()) {
                    return Err(VersionError::EpochNonNumeric(s.to_string()));
                }

                Some(u32::from_str(epoch)?)
            }
            None => None,
        };

        // Upstream versions allow alphanumerics plus `.`, `+`, `~`, and
        // `-` only when a Debian revision is present.
        if !upstream.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '.' | '+' | '~' => true,
            '-' => revision.is_some(),
            _ => false,
        }) {
            return Err(VersionError::UpstreamVersionIllegalChar(s.to_string()));
        }

        // Revisions allow alphanumerics plus `.`, `+`, `~`.
        if let Some(revision) = revision {
            if !revision.chars().all(|c| match c {
                c if c.is_ascii_alphanumeric() => true,
                '+' | '.' | '~' => true,
                _ => false,
            }) {
                return Err(VersionError::DebianRevisionIllegalChar(s.to_string()));
            }
        }

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision: revision.map(|x| x.to_string()),
        })
    }

    /// The `epoch` component, if explicitly present.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// The `upstream_version` component.
    ///
    /// This names the orig tarball for non-native packages.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// The `debian_revision` component, if present.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }

    /// Whether this version belongs to a native package.
    ///
    /// Native packages have no upstream/packaging split and therefore
    /// never require an orig tarball.
    pub fn is_native(&self) -> bool {
        self.debian_revision.is_none()
    }

    /// The version as it appears in artifact filenames.
    ///
    /// Filenames produced by the build tools never carry the epoch.
    pub fn filename_version(&self) -> String {
        match &self.debian_revision {
            Some(revision) => format!("{}-{}", self.upstream_version, revision),
            None => self.upstream_version.clone(),
        }
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        write!(f, "{}", self.upstream_version)?;

        if let Some(revision) = &self.debian_revision {
            write!(f, "-{}", revision)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(
            PackageVersion::parse("1:2.3-4")?,
            PackageVersion {
                epoch: Some(1),
                upstream_version: "2.3".into(),
                debian_revision: Some("4".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("0.18.0+dfsg-2+b1")?,
            PackageVersion {
                epoch: None,
                upstream_version: "0.18.0+dfsg".into(),
                debian_revision: Some("2+b1".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("3.3.2.final~github")?,
            PackageVersion {
                epoch: None,
                upstream_version: "3.3.2.final~github".into(),
                debian_revision: None,
            }
        );

        Ok(())
    }

    #[test]
    fn epoch_and_revision_stripping() -> Result<()> {
        let v = PackageVersion::parse("1:2.3-4")?;
        assert_eq!(v.upstream_version(), "2.3");
        assert_eq!(v.filename_version(), "2.3-4");
        assert!(!v.is_native());

        Ok(())
    }

    #[test]
    fn native_has_no_revision() -> Result<()> {
        let v = PackageVersion::parse("2.3")?;
        assert!(v.is_native());
        assert_eq!(v.filename_version(), "2.3");

        Ok(())
    }

    #[test]
    fn illegal_characters_rejected() {
        assert!(matches!(
            PackageVersion::parse("a:1.0"),
            Err(VersionError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0_beta"),
            Err(VersionError::UpstreamVersionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-1_2"),
            Err(VersionError::DebianRevisionIllegalChar(_))
        ));
    }

    #[test]
    fn format_round_trips() -> Result<()> {
        for s in ["1:2.3-4", "2.3", "0.18.0+dfsg-2+b1"] {
            assert_eq!(format!("{}", PackageVersion::parse(s)?), s);
        }

        Ok(())
    }
}
