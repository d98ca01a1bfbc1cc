use anyhow::{bail, Result};
use protocol::Namespaces;
use std::path::PathBuf;

/// Package whose classes make up the tracked inheritance graph
pub const DEFAULT_PACKAGE_PREFIX: &str = "net/minecraft/";

/// Everything one remapping run needs
#[derive(Debug, Clone)]
pub struct RemapConfig {
    /// Mod jar carrying mixin classes, mixin configs and access wideners
    pub input: PathBuf,
    pub output: PathBuf,
    /// Mapping table in the `v1` text format
    pub mappings: PathBuf,
    /// Jar whose classes provide the inheritance graph
    pub reference: PathBuf,
    pub package_prefix: String,
    /// Refmap entry name used when no mixin config names one
    pub refmap_name: Option<String>,
    pub namespaces: Namespaces,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            mappings: PathBuf::new(),
            reference: PathBuf::new(),
            package_prefix: DEFAULT_PACKAGE_PREFIX.to_string(),
            refmap_name: None,
            namespaces: Namespaces::default(),
        }
    }
}

impl RemapConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        mappings: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mappings: mappings.into(),
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn with_package_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = prefix.into();
        self
    }

    pub fn with_refmap_name(mut self, name: Option<String>) -> Self {
        self.refmap_name = name;
        self
    }

    /// Fail on missing inputs before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.input.is_file() {
            bail!("Input mod file does not exist: {}", self.input.display());
        }
        if !self.mappings.is_file() {
            bail!("Could not load mappings: {}", self.mappings.display());
        }
        if !self.reference.is_file() {
            bail!("Reference jar does not exist: {}", self.reference.display());
        }
        Ok(())
    }
}
