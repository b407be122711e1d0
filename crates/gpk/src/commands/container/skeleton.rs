use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use serde_json::Value;
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use gpk_container::{
    bridge::BoneTree,
    records::Payload,
    types::{latin1_to_string, string_to_latin1, Tag},
    Skeleton,
};

use crate::commands::options::{create_output, read_json, write_json, ContainerSource};

#[derive(Args)]
pub struct SkeletonArgs {
    #[command(flatten)]
    source: ContainerSource,

    /// Only handle the skeleton record with this name
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Replace the skeleton NAME with this bone tree and write the container to OUTPUT
    #[arg(long, value_name = "JSON", requires_all = ["name", "output"], conflicts_with = "entry")]
    replace: Option<PathBuf>,

    /// Target file, stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// A bone tree with the name of the skeleton record it came from
pub fn skeleton_json(skeleton: &Skeleton) -> Result<Value> {
    let mut tree = serde_json::to_value(skeleton.to_bone_tree()).into_diagnostic()?;
    if let Value::Object(map) = &mut tree {
        map.insert(
            "name".into(),
            Value::String(latin1_to_string(&skeleton.name)),
        );
    }
    Ok(tree)
}

impl SkeletonArgs {
    fn export(&self) -> Result<()> {
        let container = self.source.load()?;

        let skeletons = container
            .skeletons()?
            .iter()
            .filter(|s| {
                self.name
                    .as_ref()
                    .map_or(true, |n| s.name == string_to_latin1(n))
            })
            .map(skeleton_json)
            .collect::<Result<Vec<_>>>()?;

        if skeletons.is_empty() {
            return Err(miette!("no matching skeleton found"));
        }

        write_json(
            &Value::Array(skeletons),
            self.output.as_deref(),
            self.overwrite,
        )
    }

    fn replace(&self, json: &Path, name: &str, output: &Path) -> Result<()> {
        let tree: BoneTree = read_json(json)?;
        let mut skeleton = Skeleton::from_bone_tree(&tree)?;
        skeleton.name = string_to_latin1(name);
        info!("replacing {} with {} bones", name, skeleton.bones.len());

        let mut container = self.source.load()?;
        let record = container
            .find_record_mut(|r| {
                r.type_tag == Tag::SKELETON
                    && r.name == skeleton.name
                    && matches!(r.payload, Payload::SkeletonRoot(_))
            })
            .ok_or_else(|| miette!("no skeleton named {name}"))?;

        // side records nested below the skeleton, such as eye info, are kept
        let replacement = skeleton.to_record();
        let root_bone = replacement
            .children
            .into_iter()
            .next()
            .ok_or_else(|| miette!("skeleton {name} has no bones"))?;
        match record.children.iter_mut().find(|c| c.type_tag == Tag::BONE) {
            Some(slot) => *slot = root_bone,
            None => record.children.insert(0, root_bone),
        }
        record.payload = replacement.payload;

        let data = container.write(&self.source.config.config())?;
        let mut out = create_output(output, self.overwrite)?;
        out.write_all(&data)
            .into_diagnostic()
            .context(format!("writing {}", output.display()))
    }

    pub fn handle(&self) -> Result<()> {
        match (&self.replace, &self.name, &self.output) {
            (Some(json), Some(name), Some(output)) => self.replace(json, name, output),
            (Some(_), _, _) => Err(miette!("--replace needs --name and --output")),
            _ => self.export(),
        }
    }
}
