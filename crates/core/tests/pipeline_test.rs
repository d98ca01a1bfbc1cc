use anyhow::Result;
use class_harness::builder::ClassFileBuilder;
use pretty_assertions::assert_eq;
use protocol::{AnnotationNode, AnnotationValue, MemberTree};
use refmapper::annotations::{ACCESSOR, CALLBACK_INFO, INJECT, INVOKER, MIXIN, REDIRECT};
use refmapper::RemapConfig;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MAPPINGS: &str = "v1\tnamed\tintermediary\n\
CLASS\tnet/minecraft/Bar\tnet/minecraft/class_1\n\
CLASS\tnet/minecraft/Entity\tnet/minecraft/class_2\n\
METHOD\tnet/minecraft/Bar\t()V\tdoThing\tmethod_1\n\
METHOD\tnet/minecraft/Bar\t()V\thelper\tmethod_2\n\
METHOD\tnet/minecraft/Bar\t()V\ttick\tmethod_3\n\
FIELD\tnet/minecraft/Entity\tI\tcount\tfield_1\n";

const MIXIN_CLASS: &str = "com/example/mixin/BarMixin";

const ACCESS_WIDENER: &[u8] = b"accessWidener v1 named\naccessible class net/minecraft/Bar\n";

enum Entry<'a> {
    Dir(&'a str),
    File(&'a str, Vec<u8>),
}

fn write_jar(path: &Path, entries: &[Entry]) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();
    for entry in entries {
        match entry {
            Entry::Dir(name) => writer.add_directory(*name, options)?,
            Entry::File(name, data) => {
                writer.start_file(*name, options)?;
                writer.write_all(data)?;
            }
        }
    }
    writer.finish()?;
    Ok(())
}

fn read_jar(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push((entry.name().to_string(), data));
    }
    Ok(entries)
}

fn jar_entry(entries: &[(String, Vec<u8>)], name: &str) -> Option<String> {
    entries
        .iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
}

fn at(kind: &str, target: &str) -> AnnotationValue {
    let mut node = AnnotationNode::new("Lorg/spongepowered/asm/mixin/injection/At;")
        .with("value", AnnotationValue::String(kind.to_string()));
    if !target.is_empty() {
        node = node.with("target", AnnotationValue::String(target.to_string()));
    }
    AnnotationValue::Annotation(node)
}

fn mixin_class() -> Vec<u8> {
    ClassFileBuilder::new(MIXIN_CLASS)
        .super_name("java/lang/Object")
        .annotation(AnnotationNode::new(MIXIN).with(
            "value",
            AnnotationValue::Array(vec![AnnotationValue::Class("Lnet/minecraft/Bar;".to_string())]),
        ))
        .method(MemberTree::new("getCount", "()I").with_annotation(AnnotationNode::new(ACCESSOR)))
        .method(MemberTree::new("callDoThing", "()V").with_annotation(AnnotationNode::new(INVOKER)))
        .method(
            MemberTree::new("onTick", format!("({})V", CALLBACK_INFO)).with_annotation(
                AnnotationNode::new(INJECT)
                    .with(
                        "method",
                        AnnotationValue::Array(vec![AnnotationValue::String("tick".to_string())]),
                    )
                    .with(
                        "at",
                        AnnotationValue::Array(vec![
                            at("HEAD", ""),
                            at("INVOKE", "Lnet/minecraft/Bar;helper()V"),
                        ]),
                    ),
            ),
        )
        .build()
}

fn reference_jar(path: &Path) -> Result<()> {
    write_jar(
        path,
        &[
            Entry::File(
                "net/minecraft/Bar.class",
                ClassFileBuilder::new("net/minecraft/Bar")
                    .super_name("net/minecraft/Entity")
                    .build(),
            ),
            Entry::File(
                "net/minecraft/Entity.class",
                ClassFileBuilder::new("net/minecraft/Entity")
                    .super_name("java/lang/Object")
                    .build(),
            ),
            Entry::File("net/minecraft/Broken.class", vec![0xCA, 0xFE]),
            Entry::File(
                "com/mojang/Util.class",
                ClassFileBuilder::new("com/mojang/Util").super_name("net/minecraft/Bar").build(),
            ),
        ],
    )
}

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    mappings: PathBuf,
    reference: PathBuf,
}

impl Workspace {
    fn new(mappings: &str, mod_entries: &[Entry]) -> Result<Self> {
        let dir = TempDir::new()?;
        let workspace = Self {
            input: dir.path().join("mod.jar"),
            output: dir.path().join("mod-remapped.jar"),
            mappings: dir.path().join("mappings.tiny"),
            reference: dir.path().join("minecraft.jar"),
            _dir: dir,
        };

        write_jar(&workspace.input, mod_entries)?;
        fs::write(&workspace.mappings, mappings)?;
        reference_jar(&workspace.reference)?;
        Ok(workspace)
    }

    fn config(&self) -> RemapConfig {
        RemapConfig::new(&self.input, &self.output, &self.mappings, &self.reference)
    }
}

#[test]
fn test_full_run_writes_refmap_and_access_widener() -> Result<()> {
    let mixin_bytes = mixin_class();
    let workspace = Workspace::new(
        MAPPINGS,
        &[
            Entry::Dir("assets/"),
            Entry::File(
                "example.mixins.json",
                br#"{"package": "com.example.mixin", "refmap": "example-refmap.json"}"#.to_vec(),
            ),
            Entry::File("example-refmap.json", b"{}".to_vec()),
            Entry::File("example.accesswidener", ACCESS_WIDENER.to_vec()),
            Entry::File("com/example/mixin/BarMixin.class", mixin_bytes.clone()),
            Entry::File("fabric.mod.json", b"{}".to_vec()),
        ],
    )?;

    let report = refmapper::run(&workspace.config())?;
    assert_eq!(report.refmap_name.as_deref(), Some("example-refmap.json"));

    let entries = read_jar(&workspace.output)?;
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "assets/",
            "example.mixins.json",
            "com/example/mixin/BarMixin.class",
            "fabric.mod.json",
            "example.accesswidener",
            "example-refmap.json",
        ]
    );

    let copied = entries.iter().find(|(name, _)| name == "com/example/mixin/BarMixin.class");
    assert_eq!(copied.map(|(_, data)| data), Some(&mixin_bytes));

    assert_eq!(
        jar_entry(&entries, "example.accesswidener").as_deref(),
        Some("accessWidener\tv1\tintermediary\naccessible\tclass\tnet/minecraft/class_1\n")
    );

    let refmap_json = jar_entry(&entries, "example-refmap.json").unwrap_or_default();
    let refmap: serde_json::Value = serde_json::from_str(&refmap_json)?;
    let expected = serde_json::json!({
        "count": "field_1:I",
        "doThing": "method_1()V",
        "Lnet/minecraft/Bar;helper()V": "Lnet/minecraft/class_1;method_2()V",
        "tick": "Lnet/minecraft/Bar;method_3()V",
    });
    assert_eq!(refmap["mappings"][MIXIN_CLASS], expected);
    assert_eq!(refmap["data"]["named:intermediary"][MIXIN_CLASS], expected);

    let metrics = &report.metrics;
    assert_eq!(metrics.annotation_count("@Accessor"), 1);
    assert_eq!(metrics.annotation_count("@Invoker"), 1);
    assert_eq!(metrics.annotation_count("@Inject"), 1);
    assert_eq!(metrics.mapping_entries, 6);
    assert_eq!(metrics.inheritances, 1);
    assert_eq!(metrics.written_entries, 4);
    assert_eq!(metrics.access_widener.map(|aw| aw.classes), Some(1));
    Ok(())
}

#[test]
fn test_refmap_keys_keep_insertion_order() -> Result<()> {
    let workspace = Workspace::new(
        MAPPINGS,
        &[
            Entry::File("example.mixins.json", br#"{"refmap": "example-refmap.json"}"#.to_vec()),
            Entry::File("com/example/mixin/BarMixin.class", mixin_class()),
        ],
    )?;

    let report = refmapper::run(&workspace.config())?;
    let keys: Vec<&str> = report
        .refmap
        .entries(MIXIN_CLASS)
        .map(|entries| entries.keys().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(keys, vec!["count", "doThing", "Lnet/minecraft/Bar;helper()V", "tick"]);
    Ok(())
}

#[test]
fn test_fallback_refmap_name() -> Result<()> {
    let workspace = Workspace::new(
        MAPPINGS,
        &[Entry::File("com/example/mixin/BarMixin.class", mixin_class())],
    )?;

    let config = workspace.config().with_refmap_name(Some("fallback-refmap.json".to_string()));
    let report = refmapper::run(&config)?;
    assert_eq!(report.refmap_name.as_deref(), Some("fallback-refmap.json"));

    let entries = read_jar(&workspace.output)?;
    assert!(jar_entry(&entries, "fallback-refmap.json").is_some());
    Ok(())
}

#[test]
fn test_no_refmap_name_skips_refmap() -> Result<()> {
    let workspace = Workspace::new(
        MAPPINGS,
        &[
            Entry::File("com/example/mixin/BarMixin.class", mixin_class()),
            Entry::File("com/example/Broken.class", vec![0xCA, 0xFE, 0xBA]),
        ],
    )?;

    let report = refmapper::run(&workspace.config())?;
    assert_eq!(report.refmap_name, None);
    assert_eq!(report.refmap.entry_count(), 4);
    assert_eq!(report.metrics.written_entries, 0);

    let names: Vec<String> = read_jar(&workspace.output)?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["com/example/mixin/BarMixin.class", "com/example/Broken.class"]);
    Ok(())
}

#[test]
fn test_unresolvable_references_keep_empty_group() -> Result<()> {
    let mixin = ClassFileBuilder::new("com/example/mixin/OtherMixin")
        .super_name("java/lang/Object")
        .annotation(AnnotationNode::new(MIXIN).with(
            "targets",
            AnnotationValue::Array(vec![AnnotationValue::String("net.minecraft.Bar".to_string())]),
        ))
        .method(
            MemberTree::new("callMissing", "()V").with_annotation(
                AnnotationNode::new(INVOKER)
                    .with("value", AnnotationValue::String("missing".to_string())),
            ),
        )
        .method(
            MemberTree::new("redirectHelper", "()V").with_annotation(
                AnnotationNode::new(REDIRECT)
                    .with("method", AnnotationValue::String("tick".to_string()))
                    .with("at", at("INVOKE", "Lnet/minecraft/Bar;helper()V"))
                    .with("remap", AnnotationValue::Boolean(false)),
            ),
        )
        .build();

    let workspace = Workspace::new(
        MAPPINGS,
        &[
            Entry::File("other.mixins.json", br#"{"refmap": "other-refmap.json"}"#.to_vec()),
            Entry::File("com/example/mixin/OtherMixin.class", mixin),
        ],
    )?;

    let report = refmapper::run(&workspace.config())?;
    assert_eq!(report.metrics.annotation_count("@Invoker"), 1);
    assert_eq!(report.metrics.annotation_count("@Redirect"), 0);
    assert_eq!(report.refmap.mixin_count(), 1);
    assert_eq!(report.refmap.entry_count(), 0);

    let refmap_json =
        jar_entry(&read_jar(&workspace.output)?, "other-refmap.json").unwrap_or_default();
    let refmap: serde_json::Value = serde_json::from_str(&refmap_json)?;
    assert_eq!(refmap["mappings"]["com/example/mixin/OtherMixin"], serde_json::json!({}));
    Ok(())
}

#[test]
fn test_every_access_widener_is_remapped() -> Result<()> {
    let workspace = Workspace::new(
        MAPPINGS,
        &[
            Entry::File("example.mixins.json", br#"{"refmap": "example-refmap.json"}"#.to_vec()),
            Entry::File("first.accesswidener", ACCESS_WIDENER.to_vec()),
            Entry::File(
                "second.accesswidener",
                b"accessWidener v1 named\nmutable field net/minecraft/Entity count I\n".to_vec(),
            ),
        ],
    )?;

    let report = refmapper::run(&workspace.config())?;
    let entries = read_jar(&workspace.output)?;
    assert_eq!(
        jar_entry(&entries, "first.accesswidener").as_deref(),
        Some("accessWidener\tv1\tintermediary\naccessible\tclass\tnet/minecraft/class_1\n")
    );
    assert_eq!(
        jar_entry(&entries, "second.accesswidener").as_deref(),
        Some("accessWidener\tv1\tintermediary\nmutable\tfield\tnet/minecraft/class_2\tfield_1\tI\n")
    );

    let counts = report.metrics.access_widener;
    assert_eq!(counts.map(|aw| (aw.classes, aw.fields, aw.methods)), Some((1, 1, 0)));
    Ok(())
}

#[test]
fn test_unsupported_mapping_version_aborts() -> Result<()> {
    let workspace = Workspace::new(
        "v2\tnamed\tintermediary\nCLASS\tnet/minecraft/Bar\tnet/minecraft/class_1\n",
        &[Entry::File("com/example/mixin/BarMixin.class", mixin_class())],
    )?;

    let error = refmapper::run(&workspace.config()).unwrap_err();
    assert!(format!("{:#}", error).contains("Only v1 mappings are supported"));
    assert!(!workspace.output.exists());
    Ok(())
}

#[test]
fn test_missing_reference_jar_aborts() -> Result<()> {
    let workspace = Workspace::new(MAPPINGS, &[])?;
    fs::remove_file(&workspace.reference)?;

    let error = refmapper::run(&workspace.config()).unwrap_err();
    assert!(error.to_string().starts_with("Reference jar does not exist"));
    Ok(())
}
