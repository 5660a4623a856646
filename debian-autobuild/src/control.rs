// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Minimal control-file paragraph support.

The repository tool's configuration descriptor (`conf/distributions`)
uses the Debian control file syntax: paragraphs of `Name: value` fields
separated by blank lines, with continuation lines marked by leading
whitespace. Only the small subset needed to write the descriptor and read
codenames back is implemented here; everything richer belongs to the
repository tool itself.
*/

use {
    crate::error::{AutobuildError, Result},
    std::io::Write,
};

/// A field in a control paragraph.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An ordered series of control fields.
///
/// Field names are case insensitive on read and case preserving on set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field, replacing an existing occurrence.
    pub fn set_field(&mut self, name: &str, value: impl ToString) {
        if let Some(existing) = self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            existing.value = value.to_string();
        } else {
            self.fields.push(ControlField::new(name, value));
        }
    }

    /// Obtain the value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Serialize the paragraph, including the trailing blank line.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            writeln!(writer, "{}: {}", field.name, field.value)?;
        }

        writeln!(writer)
    }
}

/// Parse control file content into its paragraphs.
pub fn parse_paragraphs(text: &str) -> Result<Vec<ControlParagraph>> {
    let mut paragraphs = vec![];
    let mut current = ControlParagraph::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation of the previous field.
            match current.fields.last_mut() {
                Some(field) => {
                    field.value.push('\n');
                    field.value.push_str(line.trim_start());
                }
                None => {
                    return Err(AutobuildError::ControlParse(format!(
                        "continuation line without a field: {}",
                        line
                    )));
                }
            }
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) => {
                current
                    .fields
                    .push(ControlField::new(name.trim(), value.trim()));
            }
            None => {
                return Err(AutobuildError::ControlParse(format!(
                    "line is not a field definition: {}",
                    line
                )));
            }
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    #[test]
    fn parse_and_read_back() -> Result<()> {
        let paragraphs = parse_paragraphs(indoc! {"
            Codename: stable
            Components: main contrib
            Description: Test repository
             spanning two lines

            Codename: testing
        "})?;

        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].field_str("codename"), Some("stable"));
        assert_eq!(
            paragraphs[0].field_str("Description"),
            Some("Test repository\nspanning two lines")
        );
        assert_eq!(paragraphs[1].field_str("Codename"), Some("testing"));

        Ok(())
    }

    #[test]
    fn set_field_replaces() {
        let mut paragraph = ControlParagraph::default();
        paragraph.set_field("Suite", "stable");
        paragraph.set_field("suite", "testing");

        assert_eq!(paragraph.field_str("Suite"), Some("testing"));
    }

    #[test]
    fn write_emits_paragraph_separator() -> Result<()> {
        let mut paragraph = ControlParagraph::default();
        paragraph.set_field("Codename", "stable");
        paragraph.set_field("Architectures", "amd64 source");

        let mut buf = vec![];
        paragraph.write(&mut buf)?;

        assert_eq!(
            String::from_utf8_lossy(&buf),
            "Codename: stable\nArchitectures: amd64 source\n\n"
        );

        Ok(())
    }

    #[test]
    fn rejects_dangling_continuation() {
        assert!(matches!(
            parse_paragraphs(" dangling\n"),
            Err(AutobuildError::ControlParse(_))
        ));
    }
}
