// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository initialization.

Writes the repository tool's configuration descriptor and materializes
the initial (empty) indices. Everything past the descriptor is the
repository tool's own state and is never touched directly.
*/

use {
    crate::{
        command::ensure_tools, control::ControlParagraph, error::Result, reprepro::Reprepro,
    },
    log::info,
    std::path::Path,
};

/// Parameters describing one distribution within the repository.
#[derive(Clone, Debug)]
pub struct DistributionConfig {
    pub codename: String,
    pub suite: String,
    pub components: Vec<String>,
    pub architectures: Vec<String>,
    pub origin: String,
    pub label: String,
    pub description: String,
    /// Suite names uploads may reference instead of the codename.
    pub also_accept: Vec<String>,
    /// GPG key id used for index signing; `None` leaves the repository
    /// explicitly unsigned.
    pub signing_key: Option<String>,
}

impl DistributionConfig {
    /// Render the descriptor paragraph for `conf/distributions`.
    pub fn to_paragraph(&self) -> ControlParagraph {
        let mut architectures = self.architectures.clone();

        // Source uploads are only accepted when the source
        // pseudo-architecture is declared.
        if !architectures.iter().any(|a| a == "source") {
            architectures.push("source".to_string());
        }

        let mut paragraph = ControlParagraph::default();
        paragraph.set_field("Codename", &self.codename);
        paragraph.set_field("Suite", &self.suite);
        paragraph.set_field("Components", self.components.join(" "));
        paragraph.set_field("Architectures", architectures.join(" "));
        paragraph.set_field("Origin", &self.origin);
        paragraph.set_field("Label", &self.label);
        paragraph.set_field("Description", &self.description);

        if !self.also_accept.is_empty() {
            paragraph.set_field("AlsoAcceptFor", self.also_accept.join(" "));
        }

        if let Some(key) = &self.signing_key {
            paragraph.set_field("SignWith", key);
        }

        paragraph
    }
}

/// Create the repository directory structure and descriptor.
///
/// The initial `export` creates empty per-codename indices so clients
/// can point at the repository before the first package lands.
pub fn initialize_repository(repo_dir: &Path, config: &DistributionConfig) -> Result<()> {
    ensure_tools(&["reprepro"])?;

    let conf_dir = repo_dir.join("conf");
    std::fs::create_dir_all(&conf_dir)?;

    let mut buf = vec![];
    config.to_paragraph().write(&mut buf)?;

    let descriptor = conf_dir.join("distributions");
    std::fs::write(&descriptor, buf)?;

    info!(
        "wrote {} for codename {}",
        descriptor.display(),
        config.codename
    );

    let reprepro = Reprepro::new(repo_dir);
    reprepro.export(Some(&config.codename))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> DistributionConfig {
        DistributionConfig {
            codename: "stable".to_string(),
            suite: "stable".to_string(),
            components: vec!["main".to_string()],
            architectures: vec!["amd64".to_string()],
            origin: "example".to_string(),
            label: "example".to_string(),
            description: "Example package repository".to_string(),
            also_accept: vec!["unstable".to_string()],
            signing_key: Some("0xDEADBEEF".to_string()),
        }
    }

    #[test]
    fn descriptor_contains_all_fields() -> Result<()> {
        let mut buf = vec![];
        config().to_paragraph().write(&mut buf)?;
        let text = String::from_utf8_lossy(&buf).into_owned();

        assert!(text.contains("Codename: stable\n"));
        assert!(text.contains("Architectures: amd64 source\n"));
        assert!(text.contains("AlsoAcceptFor: unstable\n"));
        assert!(text.contains("SignWith: 0xDEADBEEF\n"));
        assert!(text.ends_with("\n\n"));

        Ok(())
    }

    #[test]
    fn unsigned_mode_omits_sign_with() -> Result<()> {
        let mut unsigned = config();
        unsigned.signing_key = None;

        let mut buf = vec![];
        unsigned.to_paragraph().write(&mut buf)?;
        let text = String::from_utf8_lossy(&buf).into_owned();

        assert!(!text.contains("SignWith"));

        Ok(())
    }

    #[test]
    fn source_architecture_not_duplicated() {
        let mut with_source = config();
        with_source.architectures.push("source".to_string());

        let paragraph = with_source.to_paragraph();

        assert_eq!(
            paragraph.field_str("Architectures"),
            Some("amd64 source")
        );
    }
}
