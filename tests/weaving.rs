//! End-to-end weaving of whole source sets.
//!
//! Every test builds its classes with the public `ClassBuilder`, runs the coordinator over a
//! source set and inspects the report and the rewritten bytes.

use std::{fs, sync::atomic::Ordering};

use weavescope::{
    classfile::{
        member::MethodAccess,
        opcodes::{instruction_offsets, INVOKESTATIC, PUTSTATIC},
    },
    prelude::*,
    weaver::{
        packed, pooled, COMPONENT, PACKED_COMPONENT, PACKED_MARKER, POOLED_COMPONENT, POOLED_MARKER,
        WOVEN_MARKER,
    },
};

fn component(name: &str) -> ClassBuilder {
    ClassBuilder::new(name).super_class(COMPONENT)
}

fn position() -> Result<Vec<u8>> {
    component("com/example/Position")
        .field("x", "F")
        .field("y", "F")
        .default_constructor()
        .to_bytes()
}

fn velocity() -> Result<Vec<u8>> {
    component("com/example/Velocity")
        .annotation(POOLED_MARKER, false)
        .field("dx", "F")
        .field("dy", "F")
        .default_constructor()
        .getter("getDx", "dx", "F")
        .setter("setDx", "dx", "F")
        .to_bytes()
}

fn transform() -> Result<Vec<u8>> {
    component("com/example/Transform")
        .annotation(PACKED_MARKER, false)
        .field("x", "F")
        .field("y", "F")
        .field("z", "F")
        .default_constructor()
        .getter("getX", "x", "F")
        .setter("setX", "x", "F")
        .to_bytes()
}

fn body() -> Result<Vec<u8>> {
    component("com/example/Body")
        .annotation(PACKED_MARKER, false)
        .field("mass", "D")
        .field("transform", "Lcom/example/Transform;")
        .default_constructor()
        .getter("getTransform", "transform", "Lcom/example/Transform;")
        .to_bytes()
}

fn bad() -> Result<Vec<u8>> {
    component("com/example/Bad")
        .annotation(POOLED_MARKER, false)
        .annotation(PACKED_MARKER, true)
        .field("hp", "I")
        .default_constructor()
        .to_bytes()
}

fn ref_field() -> Result<Vec<u8>> {
    component("com/example/RefField")
        .annotation(PACKED_MARKER, false)
        .field("id", "I")
        .field("tag", "Ljava/lang/String;")
        .to_bytes()
}

fn full_set() -> Result<MemorySource> {
    Ok(MemorySource::new()
        .with_unit("com/example/Position", position()?)
        .with_unit("com/example/Velocity", velocity()?)
        .with_unit("com/example/Transform", transform()?)
        .with_unit("com/example/Body", body()?)
        .with_unit("com/example/Bad", bad()?)
        .with_unit("com/example/RefField", ref_field()?))
}

fn weave(source: &dyn SourceSet) -> Result<WeaveReport> {
    Weaver::new(WeaverConfig::default().with_threads(4)).run(source)
}

fn reread(source: &MemorySource, name: &str) -> Result<ClassFile> {
    let data = source.read(name)?;
    ClassFile::read(&data)
}

/// Names of the members targeted by `opcode` in the body of `name descriptor`.
fn member_targets(unit: &ClassFile, name: &str, descriptor: &str, opcode: u8) -> Vec<String> {
    let method = unit
        .find_method(name, descriptor)
        .expect("method table")
        .unwrap_or_else(|| panic!("missing {name}{descriptor}"));
    let code = &method.code().expect("code").code;
    instruction_offsets(code)
        .expect("decodable body")
        .into_iter()
        .filter(|&offset| code[offset] == opcode)
        .map(|offset| {
            let operand = u16::from_be_bytes([code[offset + 1], code[offset + 2]]);
            unit.pool.member_ref(operand).expect("member ref").name.to_string()
        })
        .collect()
}

#[test]
fn test_unmarked_unit_is_untouched() -> Result<()> {
    let source = full_set()?;
    let report = weave(&source)?;

    assert!(report.untouched.contains(&"com/example/Position".to_string()));
    assert!(report.failure("com/example/Position").is_none());
    assert!(!source.was_written("com/example/Position"));
    assert_eq!(source.read("com/example/Position")?, position()?);
    Ok(())
}

#[test]
fn test_pooled_unit_gets_reset_hook() -> Result<()> {
    let source = full_set()?;
    weave(&source)?;

    let woven = reread(&source, "com/example/Velocity")?;
    assert!(woven.find_method(pooled::RESET, "()V")?.is_some());
    assert_eq!(woven.super_name()?, Some(POOLED_COMPONENT));

    let metadata = weavescope::weaver::scan(&woven)?;
    assert_eq!(metadata.annotation, WeaverType::None);
    assert_eq!(metadata.declared, WeaverType::Pooled);
    Ok(())
}

#[test]
fn test_packed_offsets_and_sibling_reference() -> Result<()> {
    let source = full_set()?;
    let report = weave(&source)?;

    let transform = report.woven_unit("com/example/Transform").expect("Transform woven");
    let layout = transform.layout.as_ref().expect("packed layout");
    let offsets: Vec<u32> = layout.fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, [0, 4, 8]);
    assert_eq!(layout.stride, 12);

    // Body holds a Transform, which only resolves through the whole-set index
    let body = report.woven_unit("com/example/Body").expect("Body woven");
    let layout = body.layout.as_ref().expect("packed layout");
    assert_eq!(layout.field("transform").map(|f| f.offset), Some(8));
    assert_eq!(layout.stride, 16);

    let woven = reread(&source, "com/example/Transform")?;
    assert_eq!(woven.super_name()?, Some(PACKED_COMPONENT));
    let fields: Vec<String> = woven.fields_view()?.into_iter().map(|f| f.name).collect();
    assert!(fields.contains(&packed::INDEX_FIELD.to_string()));
    assert!(!fields.contains(&"x".to_string()));
    Ok(())
}

#[test]
fn test_packed_buffer_is_initialized() -> Result<()> {
    let source = full_set()?;
    weave(&source)?;

    for name in ["com/example/Transform", "com/example/Body"] {
        let woven = reread(&source, name)?;
        assert_eq!(
            member_targets(&woven, "<clinit>", "()V", PUTSTATIC),
            [packed::DATA_FIELD],
            "{name}"
        );
        let grow = member_targets(
            &woven,
            packed::CAPACITY_METHOD,
            packed::CAPACITY_DESCRIPTOR,
            PUTSTATIC,
        );
        assert!(grow.iter().all(|target| target == packed::DATA_FIELD));
        assert!(!grow.is_empty());
    }

    let woven = reread(&source, "com/example/Transform")?;
    for (accessor, descriptor) in [("$set_x", "(F)V"), ("$get_z", "()F")] {
        assert_eq!(
            member_targets(&woven, accessor, descriptor, INVOKESTATIC),
            [packed::CAPACITY_METHOD],
            "{accessor}"
        );
    }
    let woven = reread(&source, "com/example/Body")?;
    assert_eq!(
        member_targets(&woven, "$get_transform", "()Lcom/example/Transform;", INVOKESTATIC),
        [packed::CAPACITY_METHOD]
    );
    Ok(())
}

#[test]
fn test_subtype_of_failed_unit_is_woven() -> Result<()> {
    let child = ClassBuilder::new("com/example/Armored")
        .super_class("com/example/Bad")
        .annotation(POOLED_MARKER, false)
        .field("armor", "I")
        .default_constructor()
        .to_bytes()?;
    let source = full_set()?.with_unit("com/example/Armored", child);
    let report = weave(&source)?;

    assert_eq!(
        report.failure("com/example/Bad").map(|f| f.kind),
        Some(ErrorKind::AmbiguousClassification)
    );
    assert!(report.failure("com/example/Armored").is_none());
    let woven = reread(&source, "com/example/Armored")?;
    assert!(woven.find_method(pooled::RESET, "()V")?.is_some());
    assert_eq!(woven.super_name()?, Some("com/example/Bad"));
    Ok(())
}

#[test]
fn test_ambiguous_unit_fails_alone() -> Result<()> {
    let source = full_set()?;
    let report = weave(&source)?;

    let failure = report.failure("com/example/Bad").expect("Bad failed");
    assert_eq!(failure.kind, ErrorKind::AmbiguousClassification);
    assert!(failure.message.contains("pooled"));
    assert!(failure.message.contains("packed"));
    assert_eq!(source.read("com/example/Bad")?, bad()?);

    for sibling in [
        "com/example/Velocity",
        "com/example/Transform",
        "com/example/Body",
    ] {
        assert!(report.woven_unit(sibling).is_some(), "{sibling} not woven");
    }
    Ok(())
}

#[test]
fn test_heap_field_is_unpackable() -> Result<()> {
    let source = full_set()?;
    let report = weave(&source)?;

    let failure = report.failure("com/example/RefField").expect("RefField failed");
    assert_eq!(failure.kind, ErrorKind::UnpackableField);
    assert!(failure.message.contains("tag"));
    assert_eq!(report.failure_count(), 2);
    assert!(report.check(false).is_err());
    assert!(report.check(true).is_ok());

    let lenient = Weaver::new(WeaverConfig::default().with_tolerate_partial(true));
    assert!(lenient.check(&report).is_ok());
    assert!(Weaver::new(WeaverConfig::default()).check(&report).is_err());
    Ok(())
}

#[test]
fn test_second_run_changes_nothing() -> Result<()> {
    let source = full_set()?;
    let first = weave(&source)?;
    assert_eq!(first.woven.len(), 3);

    let snapshot: Vec<(String, Vec<u8>)> = source
        .names()?
        .into_iter()
        .map(|name| {
            let data = source.read(&name)?;
            Ok((name, data))
        })
        .collect::<Result<_>>()?;

    let rerun = MemorySource::new();
    for (name, data) in &snapshot {
        rerun.insert(name.clone(), data.clone());
    }
    let second = weave(&rerun)?;

    assert!(second.woven.is_empty());
    assert_eq!(second.untouched.len(), 4);
    assert_eq!(second.failure_count(), 2);
    for (name, data) in &snapshot {
        assert!(!rerun.was_written(name));
        assert_eq!(&rerun.read(name)?, data);
    }
    Ok(())
}

#[test]
fn test_layout_is_deterministic() -> Result<()> {
    let first = weave(&full_set()?)?;
    let second = weave(&full_set()?)?;

    for name in ["com/example/Transform", "com/example/Body"] {
        let a = first.woven_unit(name).expect("woven");
        let b = second.woven_unit(name).expect("woven");
        assert_eq!(a.layout, b.layout);
        assert_eq!(a.bytes, b.bytes);
    }
    Ok(())
}

#[test]
fn test_public_surface_is_preserved() -> Result<()> {
    let source = full_set()?;
    let before: Vec<_> = ["com/example/Velocity", "com/example/Transform", "com/example/Body"]
        .into_iter()
        .map(|name| Ok((name, reread(&source, name)?.public_method_signatures()?)))
        .collect::<Result<_>>()?;

    weave(&source)?;

    for (name, signatures) in before {
        assert_eq!(
            reread(&source, name)?.public_method_signatures()?,
            signatures,
            "{name}"
        );
    }
    Ok(())
}

#[test]
fn test_declaration_drift_is_stale() -> Result<()> {
    // Marker says pooled, declaration now says packed
    let remarked = component("com/example/Remarked")
        .annotation(PACKED_MARKER, false)
        .annotation_with(WOVEN_MARKER, false, &[("strategy", "POOLED")])
        .field("hp", "I")
        .to_bytes()?;
    // Strategy matches, but a field was added after weaving
    let reshaped = component("com/example/Reshaped")
        .annotation(PACKED_MARKER, false)
        .annotation_with(
            WOVEN_MARKER,
            false,
            &[("strategy", "PACKED"), ("fingerprint", "0000")],
        )
        .field("extra", "I")
        .to_bytes()?;
    let source = MemorySource::new()
        .with_unit("com/example/Remarked", remarked)
        .with_unit("com/example/Reshaped", reshaped)
        .with_unit("com/example/Velocity", velocity()?);

    let report = weave(&source)?;
    for name in ["com/example/Remarked", "com/example/Reshaped"] {
        let failure = report.failure(name).expect("stale");
        assert_eq!(failure.kind, ErrorKind::StaleTransform);
        assert!(!source.was_written(name));
    }
    assert!(report.woven_unit("com/example/Velocity").is_some());
    Ok(())
}

#[test]
fn test_directory_source_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let package = dir.path().join("com/example");
    fs::create_dir_all(&package)?;
    fs::write(package.join("Position.class"), position()?)?;
    fs::write(package.join("Velocity.class"), velocity()?)?;
    fs::write(package.join("Transform.class"), transform()?)?;
    fs::write(dir.path().join("notes.txt"), b"not a class")?;

    let source = DirectorySource::new(dir.path())?;
    let report = weave(&source)?;
    assert!(report.is_complete_success());
    assert_eq!(report.woven.len(), 2);
    assert_eq!(report.untouched, ["com/example/Position"]);

    assert_eq!(fs::read(package.join("Position.class"))?, position()?);
    let woven = ClassFile::read(&fs::read(package.join("Transform.class"))?)?;
    assert_eq!(woven.super_name()?, Some(PACKED_COMPONENT));

    let leftovers: Vec<_> = fs::read_dir(&package)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext != "class"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn test_cancellation_skips_pending_units() -> Result<()> {
    let source = full_set()?;
    let weaver = Weaver::new(WeaverConfig::default());
    weaver.cancellation_flag().store(true, Ordering::Relaxed);

    let report = weaver.run(&source)?;
    assert!(report.woven.is_empty());
    assert!(!report.cancelled.is_empty());
    assert!(report.check(true).is_err());
    for name in source.names()? {
        assert!(!source.was_written(&name));
    }
    Ok(())
}

#[test]
fn test_user_reset_survives() -> Result<()> {
    let unit = component("com/example/Health")
        .annotation(POOLED_MARKER, false)
        .field("hp", "I")
        .default_constructor()
        .method(MethodAccess::PUBLIC, pooled::RESET, "()V", 1, |_, body| {
            body.ret(None);
            Ok(())
        })
        .to_bytes()?;
    let source = MemorySource::new().with_unit("com/example/Health", unit);
    weave(&source)?;

    let woven = reread(&source, "com/example/Health")?;
    let reset = woven.find_method(pooled::RESET, "()V")?.expect("reset kept");
    assert!(reset.access.contains(MethodAccess::PUBLIC));
    Ok(())
}
