// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Automated Debian package building and publishing.

This crate turns an ordered list of upstream Git repositories into
packages registered in a `reprepro`-managed APT repository. The heavy
machinery — VCS operations, package building, repository metadata, index
signing, transfer — belongs to external tools (`git`,
`dpkg-buildpackage`, `reprepro`, `gpg`, `rsync`); this crate owns the
orchestration contract around them: sequencing, idempotency, and
error-context reporting.

# A Tour of Functionality

The [project_list] module reads the ordered list of projects to build.
[project_list::ProjectEntry] pairs a Git URL with the short name derived
from it.

[vcs::WorkingTree] clones or fast-forwards a project's local tree and
forces it to the remote default-branch head. A dirty tree or a missing
remote branch is a hard stop.

The [build_tree] module decides whether a tree can be built in place or
must be exported to a clean snapshot first
([build_tree::export_reasons] is the pure decision function), and
patches `debian/rules` when it references a debhelper addon the host
lacks.

[changelog::SourceIdentity] extracts the `(source, version)` pair from
`debian/changelog`, with [version::PackageVersion] handling the
`[epoch:]upstream[-revision]` decomposition.

The [orig] module guarantees a deterministic orig tarball for non-native
packages, preferring byte-identical reuse from the repository pool over
regeneration so later Debian revisions of an upstream version never
drift checksums.

[builder] invokes the build tool with a computed option set — notably
whether `-sa` must ship the orig tarball — and [changes] locates the
produced `.changes` artifacts, using a build-start marker to ignore
stale leftovers.

[reprepro::Reprepro] is the typed adapter over the repository tool:
listing queries for the idempotency gate, includes with classified
outcomes ([reprepro::IncludeOutcome]), compensation operations, and
index export. All parsing of tool output lives behind this boundary.

[pipeline::BuildPipeline] wires the stages into the per-project state
machine and enforces the fail-fast, strictly sequential execution model.
[index] renders the static HTML package index, [repo_init] writes the
repository descriptor, [publish] mirrors the result to a web host, and
[signing] warms the signing agent's passphrase cache on a best-effort
basis.
*/

pub mod build_tree;
pub mod builder;
pub mod changelog;
pub mod changes;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod index;
pub mod orig;
pub mod pipeline;
pub mod project_list;
pub mod publish;
pub mod repo_init;
pub mod reprepro;
pub mod signing;
pub mod vcs;
pub mod version;
