// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Static HTML index of the repository's packages.

A pure function of Repository State: the listing is read for every
configured codename, source-only rows are dropped, the remainder is
deduplicated and sorted, and the result is rendered through a template
together with installation instructions.
*/

use {
    crate::{
        command::ensure_tools,
        error::Result,
        reprepro::{PackageListEntry, Reprepro},
    },
    handlebars::Handlebars,
    log::info,
    once_cell::sync::Lazy,
    serde::Serialize,
    std::{collections::BTreeSet, path::Path},
};

static HANDLEBARS: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut handlebars = Handlebars::new();

    handlebars
        .register_template_string("index.html", include_str!("templates/index.html"))
        .expect("built-in template is valid");

    handlebars
});

/// Displayed settings that are not part of Repository State.
pub struct IndexSettings {
    /// Base URL clients use in their sources list.
    pub base_url: String,
    /// Filename of the published signing key.
    pub key_filename: String,
    /// Repository display name.
    pub origin: String,
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
struct IndexRow {
    codename: String,
    component: String,
    architecture: String,
    package: String,
    version: String,
}

#[derive(Serialize)]
struct IndexData {
    base_url: String,
    key_filename: String,
    origin: String,
    components: String,
    codenames: Vec<String>,
    package_count: usize,
    packages: Vec<IndexRow>,
}

fn index_rows(entries: &[PackageListEntry]) -> Vec<IndexRow> {
    entries
        .iter()
        .filter(|entry| !entry.is_source())
        .map(|entry| IndexRow {
            codename: entry.codename.clone(),
            component: entry.component.clone(),
            architecture: entry.architecture.clone(),
            package: entry.package.clone(),
            version: entry.version.clone(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Render the index page for a repository.
pub fn generate_index(reprepro: &Reprepro, settings: &IndexSettings) -> Result<String> {
    ensure_tools(&["reprepro"])?;

    let codenames = reprepro.codenames()?;

    let mut entries = vec![];
    let mut components = BTreeSet::new();

    for codename in &codenames {
        for entry in reprepro.list(codename)? {
            components.insert(entry.component.clone());
            entries.push(entry);
        }
    }

    let packages = index_rows(&entries);

    let data = IndexData {
        base_url: settings.base_url.clone(),
        key_filename: settings.key_filename.clone(),
        origin: settings.origin.clone(),
        components: components.into_iter().collect::<Vec<_>>().join(" "),
        codenames,
        package_count: packages.len(),
        packages,
    };

    Ok(HANDLEBARS.render("index.html", &data)?)
}

/// Render the index page and write it to a file.
pub fn write_index(reprepro: &Reprepro, settings: &IndexSettings, output: &Path) -> Result<()> {
    let html = generate_index(reprepro, settings)?;

    std::fs::write(output, html)?;

    info!("wrote package index to {}", output.display());

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(codename: &str, arch: &str, package: &str, version: &str) -> PackageListEntry {
        PackageListEntry {
            codename: codename.to_string(),
            component: "main".to_string(),
            architecture: arch.to_string(),
            package: package.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn source_rows_are_excluded() {
        let rows = index_rows(&[
            entry("stable", "amd64", "widget", "1.0-1"),
            entry("stable", "source", "widget", "1.0-1"),
        ]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].architecture, "amd64");
    }

    #[test]
    fn rows_are_deduplicated_and_sorted() {
        let rows = index_rows(&[
            entry("stable", "amd64", "zeta", "2.0-1"),
            entry("stable", "amd64", "alpha", "1.0-1"),
            entry("stable", "amd64", "zeta", "2.0-1"),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].package, "alpha");
        assert_eq!(rows[1].package, "zeta");
    }

    #[test]
    fn template_renders() -> Result<()> {
        let data = IndexData {
            base_url: "https://packages.example.com".to_string(),
            key_filename: "example-archive.asc".to_string(),
            origin: "example".to_string(),
            components: "main".to_string(),
            codenames: vec!["stable".to_string()],
            package_count: 1,
            packages: vec![IndexRow {
                codename: "stable".to_string(),
                component: "main".to_string(),
                architecture: "amd64".to_string(),
                package: "widget".to_string(),
                version: "1.0-1".to_string(),
            }],
        };

        let html = HANDLEBARS.render("index.html", &data)?;

        assert!(html.contains("deb https://packages.example.com stable main"));
        assert!(html.contains("<td>widget</td>"));
        assert!(html.contains("example-archive.asc"));

        Ok(())
    }
}
