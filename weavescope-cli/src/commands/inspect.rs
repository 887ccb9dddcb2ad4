use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use weavescope::{
    project::{DirectorySource, SourceSet},
    weaver::{self, TypeIndex, UnitPreview},
    ClassFile,
};

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct ClassInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub super_name: Option<String>,
    pub version: String,
    pub declared: String,
    pub classification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub woven_as: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<u32>,
    pub fields: Vec<FieldInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// Index every readable class below `dir`. Classes that fail to parse are skipped.
fn index_directory(dir: &Path) -> anyhow::Result<TypeIndex> {
    let source = DirectorySource::new(dir)
        .with_context(|| format!("failed to open class directory: {}", dir.display()))?;

    let mut units = Vec::new();
    for name in source.names()? {
        match source.read(&name).map(|data| ClassFile::read(&data)) {
            Ok(Ok(unit)) => units.push(unit),
            Ok(Err(e)) | Err(e) => log::debug!("skipping {name}: {e}"),
        }
    }

    let mut index = TypeIndex::new();
    for unit in &units {
        match weaver::scan(unit) {
            Ok(metadata) => index.insert(metadata.name, metadata.declared),
            Err(e) => log::debug!("not indexed: {e}"),
        }
    }
    Ok(index)
}

fn class_info(unit: &ClassFile, preview: UnitPreview) -> ClassInfo {
    let fields = preview
        .fields
        .iter()
        .map(|field| FieldInfo {
            name: field.name.clone(),
            kind: field.kind.to_string(),
            offset: field.offset_hint,
            size: preview
                .layout
                .as_ref()
                .and_then(|layout| layout.field(&field.name))
                .map(|packed| packed.size),
        })
        .collect();

    let woven = preview.woven.as_ref();
    ClassInfo {
        name: preview.name,
        super_name: preview.super_name,
        version: format!("{}.{}", unit.major_version, unit.minor_version),
        declared: preview.declared.label().to_string(),
        classification: preview.annotation.label().to_string(),
        woven_as: woven.map(|marker| {
            marker
                .strategy
                .map_or_else(|| "unknown".to_string(), |s| s.label().to_string())
        }),
        fingerprint: woven.and_then(|marker| marker.fingerprint.clone()),
        stride: preview.layout.as_ref().map(|layout| layout.stride),
        fields,
        problem: preview.problem,
    }
}

pub fn run(path: &Path, classes: Option<&Path>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let unit = ClassFile::read(&data)
        .with_context(|| format!("failed to parse class file: {}", path.display()))?;

    let mut index = match classes {
        Some(dir) => index_directory(dir)?,
        None => TypeIndex::new(),
    };
    if let Ok(metadata) = weaver::scan(&unit) {
        index.insert(metadata.name, metadata.declared);
    }

    let preview = weaver::preview(&unit, &index)
        .with_context(|| format!("failed to inspect {}", path.display()))?;
    let info = class_info(&unit, preview);

    print_output(&info, opts, |info| {
        println!("Class:           {}", info.name);
        if let Some(super_name) = &info.super_name {
            println!("Extends:         {super_name}");
        }
        println!("Version:         {}", info.version);
        println!("Declared:        {}", info.declared);
        println!("Classification:  {}", info.classification);
        if let Some(woven_as) = &info.woven_as {
            println!("Woven as:        {woven_as}");
        }
        if let Some(fingerprint) = &info.fingerprint {
            println!("Fingerprint:     {fingerprint}");
        }
        if let Some(stride) = info.stride {
            println!("Stride:          {stride} bytes");
        }
        if let Some(problem) = &info.problem {
            println!("Problem:         {problem}");
        }

        if !info.fields.is_empty() {
            println!();
            let mut tw = TabWriter::new(&[
                ("Field", Align::Left),
                ("Kind", Align::Left),
                ("Offset", Align::Right),
                ("Size", Align::Right),
            ])
            .indent("  ");
            for field in &info.fields {
                tw.row(vec![
                    field.name.clone(),
                    field.kind.clone(),
                    field.offset.map_or_else(String::new, |o| o.to_string()),
                    field.size.map_or_else(String::new, |s| s.to_string()),
                ]);
            }
            tw.print();
        }
    })
}
