use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use weavescope::{
    project::{CancellationFlag, DirectorySource, WeaveReport, Weaver},
    weaver::WeaverConfig,
};

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

pub struct WeaveOptions {
    pub threads: usize,
    pub dry_run: bool,
    pub tolerate_partial: bool,
    pub cancel: CancellationFlag,
}

#[derive(Debug, Serialize)]
pub struct WeaveSummary {
    pub dry_run: bool,
    pub woven: Vec<WovenClass>,
    pub untouched: Vec<String>,
    pub failed: Vec<FailedClass>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cancelled: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WovenClass {
    pub name: String,
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct FailedClass {
    pub name: String,
    pub kind: String,
    pub message: String,
}

impl WeaveSummary {
    fn new(report: &WeaveReport, dry_run: bool) -> Self {
        Self {
            dry_run,
            woven: report
                .woven
                .iter()
                .map(|result| WovenClass {
                    name: result.name.clone(),
                    strategy: result.annotation.label().to_string(),
                    stride: result.layout.as_ref().map(|layout| layout.stride),
                })
                .collect(),
            untouched: report.untouched.clone(),
            failed: report
                .failed
                .iter()
                .map(|failure| FailedClass {
                    name: failure.name.clone(),
                    kind: failure.kind.to_string(),
                    message: failure.message.clone(),
                })
                .collect(),
            cancelled: report.cancelled.clone(),
        }
    }
}

pub fn run(dir: &Path, options: &WeaveOptions, opts: &GlobalOptions) -> anyhow::Result<()> {
    let source = DirectorySource::new(dir)
        .with_context(|| format!("failed to open class directory: {}", dir.display()))?;

    let config = WeaverConfig::default()
        .with_threads(options.threads)
        .with_write_output(!options.dry_run)
        .with_tolerate_partial(options.tolerate_partial);
    let weaver = Weaver::new(config).with_cancellation(options.cancel.clone());
    let report = weaver
        .run(&source)
        .with_context(|| format!("failed to weave {}", dir.display()))?;

    let summary = WeaveSummary::new(&report, options.dry_run);
    print_output(&summary, opts, |summary| {
        if !summary.woven.is_empty() {
            let heading = if summary.dry_run { "Would weave:" } else { "Woven:" };
            println!("{heading}");
            let mut tw = TabWriter::new(&[
                ("Class", Align::Left),
                ("Strategy", Align::Left),
                ("Stride", Align::Right),
            ])
            .indent("  ");
            for class in &summary.woven {
                tw.row(vec![
                    class.name.clone(),
                    class.strategy.clone(),
                    class.stride.map_or_else(|| "-".to_string(), |s| s.to_string()),
                ]);
            }
            tw.print();
        }

        if !summary.failed.is_empty() {
            println!("Failed:");
            let mut tw =
                TabWriter::new(&[("Class", Align::Left), ("Error", Align::Left), ("", Align::Left)])
                    .indent("  ");
            for class in &summary.failed {
                tw.row(vec![class.name.clone(), class.kind.clone(), class.message.clone()]);
            }
            tw.print();
        }

        println!(
            "{} woven, {} untouched, {} failed{}",
            summary.woven.len(),
            summary.untouched.len(),
            summary.failed.len(),
            if summary.cancelled.is_empty() {
                String::new()
            } else {
                format!(", {} cancelled", summary.cancelled.len())
            }
        );
    })?;

    weaver.check(&report)?;
    Ok(())
}
