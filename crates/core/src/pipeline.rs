//! One remapping run: scan the mod jar, load the mappings, cache the
//! reference hierarchy, build the refmap and write the output jar.

use crate::access_widener::AccessWidenerRemapper;
use crate::annotations::{self, annotation_label};
use crate::config::RemapConfig;
use crate::metrics::{MetricsCollector, RunMetrics};
use crate::refmap::{Refmap, RefmapBuilder};
use crate::resolution::SymbolResolver;
use crate::walker::{self, ArchiveEntry, ArchiveWriter};
use anyhow::{Context, Result};
use class_harness::{is_class_entry, read_class};
use protocol::{ClassTree, MixinReferences};
use rayon::prelude::*;
use serde::Deserialize;
use store::{InheritanceGraph, MappingTable};
use tracing::{debug, info, warn};

const MIXIN_CONFIG_SUFFIX: &str = ".mixins.json";
const ACCESS_WIDENER_SUFFIX: &str = ".accesswidener";

#[derive(Debug, Deserialize)]
struct MixinConfig {
    refmap: Option<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub metrics: RunMetrics,
    /// Entry name the refmap was written under, if any
    pub refmap_name: Option<String>,
    pub refmap: Refmap,
}

/// Everything gathered from the input jar before any mapping is loaded
#[derive(Debug, Default)]
pub struct ModScan {
    pub entries: Vec<ArchiveEntry>,
    pub mixins: Vec<MixinReferences>,
    pub refmap_name: Option<String>,
    pub access_wideners: Vec<ArchiveEntry>,
}

pub fn run(config: &RemapConfig) -> Result<RunReport> {
    config.validate()?;
    let mut metrics = MetricsCollector::new();

    metrics.start_phase("mixins");
    info!("Processing mixins");
    let scan = scan_mod(walker::read_entries(&config.input)?)?;
    for mixin in &scan.mixins {
        for reference in &mixin.references {
            metrics.record_annotation(annotation_label(reference));
        }
    }
    metrics.end_phase("mixins");

    metrics.start_phase("mappings");
    info!("Processing mappings");
    let table = MappingTable::from_path(&config.mappings)
        .with_context(|| format!("Could not load mappings from {}", config.mappings.display()))?;
    metrics.record_mapping_entries(table.len());
    metrics.end_phase("mappings");

    metrics.start_phase("reference");
    info!("Caching {}", config.reference.display());
    let classes = read_reference_classes(&config.reference, &config.package_prefix)?;
    let graph = InheritanceGraph::build(&classes, &table, &config.package_prefix);
    metrics.record_inheritances(graph.len());
    metrics.end_phase("reference");

    metrics.start_phase("refmap");
    info!("Generating refmap entries");
    let resolver = SymbolResolver::new(&table, &graph);
    let mut builder = RefmapBuilder::with_namespaces(resolver, config.namespaces.clone());
    for mixin in &scan.mixins {
        builder
            .add(mixin)
            .with_context(|| format!("Cannot map descriptor in {}", mixin.mixin.name))?;
    }
    if builder.duplicates() > 0 {
        debug!("Dropped {} duplicate refmap keys", builder.duplicates());
    }
    let refmap = builder.build();
    metrics.end_phase("refmap");

    let mut access_wideners = Vec::with_capacity(scan.access_wideners.len());
    if !scan.access_wideners.is_empty() {
        metrics.start_phase("accesswidener");
        let remapper =
            AccessWidenerRemapper::new(resolver).with_namespaces(config.namespaces.clone());
        for entry in &scan.access_wideners {
            info!("Remapping {}", entry.name);
            let text = String::from_utf8_lossy(&entry.data);
            let remapped = remapper
                .remap(&text)
                .with_context(|| format!("Cannot map descriptor in {}", entry.name))?;
            metrics.record_access_widener(remapped.stats);
            access_wideners.push(ArchiveEntry::file(entry.name.clone(), remapped.text));
        }
        metrics.end_phase("accesswidener");
    }

    metrics.start_phase("write");
    let refmap_name = scan.refmap_name.clone().or_else(|| config.refmap_name.clone());
    let mut writer = ArchiveWriter::create(&config.output)?;
    for entry in &scan.entries {
        if refmap_name.as_deref() == Some(entry.name.as_str()) {
            debug!("Replacing existing {}", entry.name);
            continue;
        }
        writer.add(entry)?;
    }
    for entry in &access_wideners {
        writer.add(entry)?;
    }

    match &refmap_name {
        Some(name) => {
            info!("Writing refmap entries to {}", name);
            let json = refmap.to_json().context("failed to serialize refmap")?;
            writer.add(&ArchiveEntry::file(name.clone(), json))?;
            metrics.record_written_entries(refmap.entry_count());
        }
        None => warn!("No mixin config declares a refmap, refmap not written"),
    }
    writer.finish()?;
    metrics.end_phase("write");

    Ok(RunReport {
        metrics: metrics.finalize(),
        refmap_name,
        refmap,
    })
}

/// Sort the input jar's entries into copied entries, mixin references, the
/// declared refmap name and the deferred access wideners.
pub fn scan_mod(entries: Vec<ArchiveEntry>) -> Result<ModScan> {
    let mut scan = ModScan::default();

    for entry in entries {
        if entry.has_extension(MIXIN_CONFIG_SUFFIX) && scan.refmap_name.is_none() {
            match serde_json::from_slice::<MixinConfig>(&entry.data) {
                Ok(config) => scan.refmap_name = config.refmap.filter(|name| !name.is_empty()),
                Err(e) => warn!("Could not read mixin config {}: {}", entry.name, e),
            }
        } else if entry.has_extension(ACCESS_WIDENER_SUFFIX) {
            scan.access_wideners.push(entry);
            continue;
        } else if !entry.is_dir && is_class_entry(&entry.name) {
            match read_class(&entry.data) {
                Ok(class) => {
                    let references = annotations::extract(&class)
                        .with_context(|| format!("Cannot map descriptor in {}", entry.name))?;
                    scan.mixins.extend(references);
                }
                Err(e) => warn!("Could not parse {}, copying as is: {}", entry.name, e),
            }
        }

        scan.entries.push(entry);
    }

    Ok(scan)
}

fn read_reference_classes(path: &std::path::Path, prefix: &str) -> Result<Vec<ClassTree>> {
    let entries = walker::read_class_entries(path, prefix)?;

    let classes: Vec<ClassTree> = entries
        .par_iter()
        .filter_map(|entry| match read_class(&entry.data) {
            Ok(class) => Some(class),
            Err(e) => {
                warn!("Skipping {}: {}", entry.name, e);
                None
            }
        })
        .collect();

    debug!("Parsed {} of {} reference classes", classes.len(), entries.len());
    Ok(classes)
}
