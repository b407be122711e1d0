use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::{
    collections::HashSet,
    fmt::{self, Display},
    path::PathBuf,
};

use gpk_archive::{Archive, ArchiveEntry};
use gpk_container::Container;

use crate::commands::options::{open_archive, CodecArgs, ConfigArgs};

const CHECKSUM: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_BZIP2);

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    #[default]
    Semantic,
    Full,
}

/// A difference between both sides of the comparison
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Change {
    Added { kind: &'static str, name: String },
    Removed { kind: &'static str, name: String },
    Modified(Modification),
}

/// Something present on both sides whose content differs
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Modification {
    kind: &'static str,
    name: String,
    /// Label, left value and right value
    fields: Vec<(&'static str, String, String)>,
    /// Lines printed as they are
    context: Vec<String>,
    children: Vec<Change>,
}

impl Modification {
    fn new(kind: &'static str, name: &str) -> Self {
        Modification {
            kind,
            name: name.into(),
            ..Default::default()
        }
    }

    fn field(&mut self, label: &'static str, left: impl ToString, right: impl ToString) {
        self.fields.push((label, left.to_string(), right.to_string()));
    }

    fn child(&mut self, change: Change) {
        self.children.push(change);
        self.children.sort();
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.context.is_empty() && self.children.is_empty()
    }
}

impl Change {
    fn heading(&self) -> (&'static str, &'static str) {
        match self {
            Change::Added { kind, .. } => (*kind, "added"),
            Change::Removed { kind, .. } => (*kind, "removed"),
            Change::Modified(m) => (m.kind, "modified"),
        }
    }

    fn render<W: fmt::Write>(&self, f: &mut W, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Change::Added { name, .. } => writeln!(f, "{pad}✅ {}", name.green()),
            Change::Removed { name, .. } => writeln!(f, "{pad}❌ {}", name.red()),
            Change::Modified(m) => {
                writeln!(f, "{pad}🔃 {}", m.name.blue())?;
                for (label, left, right) in &m.fields {
                    writeln!(f, "{pad}  * {label}: {} vs {}", left.red(), right.green())?;
                }
                for line in &m.context {
                    writeln!(f, "{pad}   {line}")?;
                }
                // children are sorted, so each heading is contiguous
                for ((kind, verb), group) in &m.children.iter().chunk_by(|c| c.heading()) {
                    writeln!(f, "{pad}  * {kind} {verb}:")?;
                    for change in group {
                        change.render(f, depth + 2)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t=Mode::Semantic)]
    mode: Mode,

    #[command(flatten)]
    codec: CodecArgs,

    #[command(flatten)]
    config: ConfigArgs,
}

impl DiffArgs {
    fn handle_tree(&self, left: &Container, right: &Container) -> Option<Change> {
        let old = left.render_tree();
        let new = right.render_tree();

        let diff = TextDiff::from_lines(&old, &new);
        if diff.ratio() >= 1.0 {
            return None;
        }

        let mut tree = Modification::new("records", "tree");
        for op in diff.ops().iter() {
            for change in diff.iter_inline_changes(op) {
                if self.mode == Mode::Semantic && change.tag() == ChangeTag::Equal {
                    continue;
                }

                let mut line = String::new();
                for (emphasized, value) in change.iter_strings_lossy() {
                    let value = value.trim_end_matches('\n');
                    let styled = match (change.tag(), emphasized) {
                        (ChangeTag::Insert, true) => value.green().underline().to_string(),
                        (ChangeTag::Delete, true) => value.red().underline().to_string(),
                        (ChangeTag::Insert, false) => value.green().to_string(),
                        (ChangeTag::Delete, false) => value.red().to_string(),
                        (ChangeTag::Equal, _) => value.dimmed().to_string(),
                    };
                    line.push_str(&styled);
                }
                tree.context.push(line);
            }
        }

        Some(Change::Modified(tree))
    }

    fn handle_container(&self, left: &Container, right: &Container) -> Vec<Change> {
        let mut result = Vec::new();

        let left_tags = left.groups.iter().map(|g| g.tag).collect::<HashSet<_>>();
        let right_tags = right.groups.iter().map(|g| g.tag).collect::<HashSet<_>>();

        for tag in right_tags.difference(&left_tags).sorted() {
            result.push(Change::Added { kind: "groups", name: tag.to_string() });
        }
        for tag in left_tags.difference(&right_tags).sorted() {
            result.push(Change::Removed { kind: "groups", name: tag.to_string() });
        }

        for tag in left_tags.intersection(&right_tags).sorted() {
            let count = |c: &Container| c.group(*tag).map(|g| g.records.len()).unwrap_or(0);
            if count(left) != count(right) {
                let mut group = Modification::new("groups", &tag.to_string());
                group.field("records", count(left), count(right));
                result.push(Change::Modified(group));
            }
        }

        result.extend(self.handle_tree(left, right));
        result
    }

    fn handle_entry(&self, left: &ArchiveEntry, right: &ArchiveEntry) -> Option<Change> {
        if left.data() == right.data() {
            return None;
        }

        let mut file = Modification::new("files", &left.name);
        if left.size != right.size {
            file.field("size", left.size, right.size);
        }
        file.field(
            "crc32",
            format!("{:08x}", CHECKSUM.checksum(left.data())),
            format!("{:08x}", CHECKSUM.checksum(right.data())),
        );

        if let (Some(l), Some(r)) = (left.container(), right.container()) {
            for change in self.handle_container(l, r) {
                file.child(change);
            }
        }

        Some(Change::Modified(file))
    }

    fn handle_archive(&self, name: &str, left: &Archive, right: &Archive) -> Result<Option<Change>> {
        let mut archive = Modification::new("archive", name);

        if left.len() != right.len() {
            archive.field("entries", left.len(), right.len());
        }
        if self.mode == Mode::Full && left.version() != right.version() {
            archive.field("version", left.version(), right.version());
        }

        let left_names = left.file_names().collect::<HashSet<_>>();
        let right_names = right.file_names().collect::<HashSet<_>>();

        for file in right_names.difference(&left_names) {
            archive.child(Change::Added { kind: "files", name: file.to_string() });
        }
        for file in left_names.difference(&right_names) {
            archive.child(Change::Removed { kind: "files", name: file.to_string() });
        }
        for file in left_names.intersection(&right_names) {
            if let Some(change) = self.handle_entry(left.by_name(file)?, right.by_name(file)?) {
                archive.child(change);
            }
        }

        Ok((!archive.is_empty()).then_some(Change::Modified(archive)))
    }

    pub fn handle(&self) -> Result<()> {
        let config = self.config.config();
        let left = open_archive(&self.left, &self.codec, &config)?;
        let right = open_archive(&self.right, &self.codec, &config)?;

        let difference = self.handle_archive(&self.left.to_string_lossy(), &left, &right)?;

        if let Some(d) = difference {
            print!("{}", d);
        }

        Ok(())
    }
}
