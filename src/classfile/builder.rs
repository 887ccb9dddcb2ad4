//! Programmatic construction of compiled units.
//!
//! [`ClassBuilder`] assembles a complete, verifiable class file from a short description:
//! supertype, annotations, fields and a few common method shapes (default constructor,
//! field getters and setters). Arbitrary bodies can be supplied through
//! [`ClassBuilder::method`], which hands the implementation closure the unit's constant pool
//! and a fresh [`Bytecode`] emitter.
//!
//! # Examples
//!
//! ```rust
//! use weavescope::classfile::builder::ClassBuilder;
//!
//! let unit = ClassBuilder::new("com/example/Health")
//!     .super_class("com/artemis/Component")
//!     .annotation("Lcom/artemis/annotations/PooledWeaver;", false)
//!     .field("current", "I")
//!     .field("max", "I")
//!     .default_constructor()
//!     .getter("getCurrent", "current", "I")
//!     .setter("setCurrent", "current", "I")
//!     .build()?;
//!
//! assert_eq!(unit.fields.len(), 2);
//! assert_eq!(unit.methods.len(), 3);
//! # Ok::<(), weavescope::Error>(())
//! ```

use crate::{
    classfile::{
        annotation::Annotation,
        attribute::{Attribute, AttributeData, CodeAttribute, CODE, RUNTIME_VISIBLE_ANNOTATIONS},
        bytecode::Bytecode,
        constpool::ConstantPool,
        descriptor::ValueKind,
        member::{ClassAccess, FieldAccess, FieldInfo, MethodAccess, MethodInfo},
        opcodes::{GETFIELD, INVOKESPECIAL, PUTFIELD},
        ClassFile,
    },
    Result,
};

/// Type alias for method implementation closures
type ImplementationFn = Box<dyn FnOnce(&mut ConstantPool, &mut Bytecode) -> Result<()>>;

struct PendingMethod {
    access: MethodAccess,
    name: String,
    descriptor: String,
    max_locals: u16,
    body: Option<ImplementationFn>,
}

/// Builder for complete class files.
pub struct ClassBuilder {
    name: String,
    super_name: String,
    access: ClassAccess,
    major_version: u16,
    interfaces: Vec<String>,
    annotations: Vec<(String, bool, Vec<(String, String)>)>,
    fields: Vec<(FieldAccess, String, String)>,
    methods: Vec<PendingMethod>,
}

impl ClassBuilder {
    /// Start a public class called `name` (internal form) extending `java/lang/Object`,
    /// targeting class-file version 52 (JDK 8).
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            access: ClassAccess::PUBLIC | ClassAccess::SUPER,
            major_version: 52,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the direct supertype.
    #[must_use]
    pub fn super_class(mut self, name: &str) -> Self {
        self.super_name = name.to_string();
        self
    }

    /// Set the class access flags.
    #[must_use]
    pub fn access(mut self, access: ClassAccess) -> Self {
        self.access = access;
        self
    }

    /// Set the class-file major version.
    #[must_use]
    pub fn major_version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Add an element-less class annotation. `visible` selects runtime retention over
    /// class retention.
    #[must_use]
    pub fn annotation(self, descriptor: &str, visible: bool) -> Self {
        self.annotation_with(descriptor, visible, &[])
    }

    /// Add a class annotation with string-valued elements.
    #[must_use]
    pub fn annotation_with(
        mut self,
        descriptor: &str,
        visible: bool,
        elements: &[(&str, &str)],
    ) -> Self {
        self.annotations.push((
            descriptor.to_string(),
            visible,
            elements
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self
    }

    /// Add a public instance field.
    #[must_use]
    pub fn field(self, name: &str, descriptor: &str) -> Self {
        self.field_with(FieldAccess::PUBLIC, name, descriptor)
    }

    /// Add a public static field.
    #[must_use]
    pub fn static_field(self, name: &str, descriptor: &str) -> Self {
        self.field_with(FieldAccess::PUBLIC | FieldAccess::STATIC, name, descriptor)
    }

    /// Add a field with explicit access flags.
    #[must_use]
    pub fn field_with(mut self, access: FieldAccess, name: &str, descriptor: &str) -> Self {
        self.fields
            .push((access, name.to_string(), descriptor.to_string()));
        self
    }

    /// Add `public <init>()V` calling the supertype's no-argument constructor.
    #[must_use]
    pub fn default_constructor(self) -> Self {
        let owner = self.super_name.clone();
        self.method(MethodAccess::PUBLIC, "<init>", "()V", 1, move |pool, body| {
            let init = pool.intern_method_ref(&owner, "<init>", "()V")?;
            body.this().op_u16(INVOKESPECIAL, init, -1).ret(None);
            Ok(())
        })
    }

    /// Add `public <init>(desc)V` that stores its only argument into `field`.
    #[must_use]
    pub fn field_constructor(self, field: &str, descriptor: &str) -> Self {
        let owner = self.name.clone();
        let parent = self.super_name.clone();
        let field = field.to_string();
        let value_descriptor = descriptor.to_string();
        let (signature, locals) = param_signature(descriptor, "V");
        self.method(MethodAccess::PUBLIC, "<init>", &signature, locals, move |pool, body| {
            let kind = ValueKind::parse(&value_descriptor)?;
            let init = pool.intern_method_ref(&parent, "<init>", "()V")?;
            let target = pool.intern_field_ref(&owner, &field, &value_descriptor)?;
            body.this().op_u16(INVOKESPECIAL, init, -1);
            body.this()
                .load_param(&kind)
                .op_u16(PUTFIELD, target, -1 - i32::from(kind.slots()))
                .ret(None);
            Ok(())
        })
    }

    /// Add `public <desc> name()` returning `this.field`.
    #[must_use]
    pub fn getter(self, name: &str, field: &str, descriptor: &str) -> Self {
        let owner = self.name.clone();
        let field = field.to_string();
        let value_descriptor = descriptor.to_string();
        let signature = format!("(){descriptor}");
        self.method(MethodAccess::PUBLIC, name, &signature, 1, move |pool, body| {
            let kind = ValueKind::parse(&value_descriptor)?;
            let source = pool.intern_field_ref(&owner, &field, &value_descriptor)?;
            body.this()
                .op_u16(GETFIELD, source, i32::from(kind.slots()) - 1)
                .ret(Some(&kind));
            Ok(())
        })
    }

    /// Add `public void name(<desc>)` assigning `this.field`.
    #[must_use]
    pub fn setter(self, name: &str, field: &str, descriptor: &str) -> Self {
        let owner = self.name.clone();
        let field = field.to_string();
        let value_descriptor = descriptor.to_string();
        let (signature, locals) = param_signature(descriptor, "V");
        self.method(MethodAccess::PUBLIC, name, &signature, locals, move |pool, body| {
            let kind = ValueKind::parse(&value_descriptor)?;
            let target = pool.intern_field_ref(&owner, &field, &value_descriptor)?;
            body.this()
                .load_param(&kind)
                .op_u16(PUTFIELD, target, -1 - i32::from(kind.slots()))
                .ret(None);
            Ok(())
        })
    }

    /// Add a method with a custom body. `max_stack` is taken from the emitter.
    #[must_use]
    pub fn method<F>(
        mut self,
        access: MethodAccess,
        name: &str,
        descriptor: &str,
        max_locals: u16,
        body: F,
    ) -> Self
    where
        F: FnOnce(&mut ConstantPool, &mut Bytecode) -> Result<()> + 'static,
    {
        self.methods.push(PendingMethod {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            max_locals,
            body: Some(Box::new(body)),
        });
        self
    }

    /// Add a method without a body, e.g. an abstract or native declaration.
    #[must_use]
    pub fn declaration(mut self, access: MethodAccess, name: &str, descriptor: &str) -> Self {
        self.methods.push(PendingMethod {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            max_locals: 0,
            body: None,
        });
        self
    }

    /// Assemble the unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] for an invalid field descriptor, a constant
    /// pool overflow, or an error raised by a method implementation closure.
    pub fn build(self) -> Result<ClassFile> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(&self.name)?;
        let super_class = pool.intern_class(&self.super_name)?;
        let interfaces = self
            .interfaces
            .iter()
            .map(|name| pool.intern_class(name))
            .collect::<Result<Vec<_>>>()?;

        let mut fields = Vec::with_capacity(self.fields.len());
        for (access, name, descriptor) in &self.fields {
            ValueKind::parse(descriptor)?;
            fields.push(FieldInfo {
                access: *access,
                name_index: pool.intern_utf8(name)?,
                descriptor_index: pool.intern_utf8(descriptor)?,
                attributes: Vec::new(),
            });
        }

        let code_name = pool.intern_utf8(CODE)?;
        let mut methods = Vec::with_capacity(self.methods.len());
        for method in self.methods {
            let mut attributes = Vec::new();
            if let Some(implementation) = method.body {
                let mut body = Bytecode::new();
                implementation(&mut pool, &mut body)?;
                let code: CodeAttribute = body.into_code(method.max_locals);
                attributes.push(Attribute {
                    name_index: code_name,
                    data: AttributeData::Code(code),
                });
            }
            methods.push(MethodInfo {
                access: method.access,
                name_index: pool.intern_utf8(&method.name)?,
                descriptor_index: pool.intern_utf8(&method.descriptor)?,
                attributes,
            });
        }

        let mut unit = ClassFile {
            minor_version: 0,
            major_version: self.major_version,
            pool,
            access: self.access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes: Vec::new(),
        };

        for (descriptor, visible, elements) in &self.annotations {
            let pairs: Vec<(&str, &str)> = elements
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let annotation = Annotation::with_strings(&mut unit.pool, descriptor, &pairs)?;
            if *visible {
                add_visible_annotation(&mut unit, annotation)?;
            } else {
                unit.add_invisible_annotation(annotation)?;
            }
        }

        Ok(unit)
    }

    /// Assemble and serialize the unit.
    ///
    /// # Errors
    /// See [`ClassBuilder::build`] and [`ClassFile::to_bytes`].
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        self.build()?.to_bytes()
    }
}

fn add_visible_annotation(unit: &mut ClassFile, annotation: Annotation) -> Result<()> {
    let name_index = unit.pool.intern_utf8(RUNTIME_VISIBLE_ANNOTATIONS)?;
    for attribute in &mut unit.attributes {
        if attribute.name_index == name_index {
            if let AttributeData::Annotations(list) = &mut attribute.data {
                list.push(annotation);
                return Ok(());
            }
        }
    }
    unit.attributes.push(Attribute {
        name_index,
        data: AttributeData::Annotations(vec![annotation]),
    });
    Ok(())
}

/// `(desc)ret` plus the local slots an instance method with that single parameter needs.
fn param_signature(descriptor: &str, ret: &str) -> (String, u16) {
    let slots = match descriptor {
        "J" | "D" => 2,
        _ => 1,
    };
    (format!("({descriptor}){ret}"), 1 + slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::opcodes::{ALOAD_0, FLOAD_1, RETURN};

    #[test]
    fn test_setter_body() {
        let unit = ClassBuilder::new("a/Pos")
            .field("x", "F")
            .setter("setX", "x", "F")
            .build()
            .unwrap();

        let method = unit.find_method("setX", "(F)V").unwrap().unwrap();
        let code = method.code().unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 2);
        assert_eq!(code.code[..2], [ALOAD_0, FLOAD_1]);
        assert_eq!(code.code[2], PUTFIELD);
        assert_eq!(*code.code.last().unwrap(), RETURN);

        let target = u16::from_be_bytes([code.code[3], code.code[4]]);
        let member = unit.pool.member_ref(target).unwrap();
        assert_eq!((member.owner, member.name, member.descriptor), ("a/Pos", "x", "F"));
    }

    #[test]
    fn test_annotations_by_visibility() {
        let unit = ClassBuilder::new("a/B")
            .annotation("La/Visible;", true)
            .annotation_with("La/Hidden;", false, &[("k", "v")])
            .build()
            .unwrap();

        let annotations = unit.annotations().unwrap();
        assert_eq!(annotations.len(), 2);
        let hidden = annotations
            .iter()
            .find(|(a, _)| a.type_descriptor(&unit.pool).unwrap() == "La/Hidden;")
            .unwrap();
        assert!(!hidden.1);
        assert_eq!(hidden.0.string_element("k", &unit.pool).unwrap(), Some("v"));
    }

    #[test]
    fn test_invalid_field_descriptor() {
        assert!(ClassBuilder::new("a/B").field("x", "Q").build().is_err());
    }
}
