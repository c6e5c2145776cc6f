//! Struct/class/enum layout tables: the evaluator's substitute for the
//! source language's reflection, built once per declaration and consulted
//! on every field access, constructor call, and method dispatch.

use std::collections::HashMap;
use std::rc::Rc;

use quill_compiler::ast::{ClassDecl, EnumDecl, FunctionDecl, StructDecl};
use quill_core::ValueTag;

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub tag: ValueTag,
    pub offset: u32,
    pub is_static: bool,
}

pub struct TypeLayout {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<FieldLayout>,
    pub total_size: u32,
    pub methods: HashMap<String, Vec<Rc<FunctionDecl>>>,
    pub constructors: Vec<Rc<FunctionDecl>>,
    pub is_class: bool,
}

impl TypeLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn from_struct(decl: &StructDecl) -> Self {
        let mut offset = 0u32;
        let mut fields = Vec::new();
        for f in &decl.fields {
            let tag = ValueTag::from_type_name(&f.ty.name).unwrap_or(ValueTag::Object);
            fields.push(FieldLayout { name: f.name.clone(), tag, offset, is_static: f.is_static });
            if !f.is_static {
                offset += tag.size_of();
            }
        }
        let mut methods: HashMap<String, Vec<Rc<FunctionDecl>>> = HashMap::new();
        for m in &decl.methods {
            methods.entry(m.name.clone()).or_default().push(Rc::new(m.clone()));
        }
        TypeLayout {
            name: decl.name.clone(),
            base: None,
            fields,
            total_size: offset.max(1),
            methods,
            constructors: Vec::new(),
            is_class: false,
        }
    }

    pub fn from_class(decl: &ClassDecl) -> Self {
        let mut offset = 0u32;
        let mut fields = Vec::new();
        for f in &decl.fields {
            let tag = ValueTag::from_type_name(&f.ty.name).unwrap_or(ValueTag::Object);
            fields.push(FieldLayout { name: f.name.clone(), tag, offset, is_static: f.is_static });
            if !f.is_static {
                offset += tag.size_of();
            }
        }
        let mut methods: HashMap<String, Vec<Rc<FunctionDecl>>> = HashMap::new();
        for m in &decl.methods {
            methods.entry(m.name.clone()).or_default().push(Rc::new(m.clone()));
        }
        TypeLayout {
            name: decl.name.clone(),
            base: decl.base.clone(),
            fields,
            total_size: offset.max(1),
            methods,
            constructors: decl.constructors.iter().cloned().map(Rc::new).collect(),
            is_class: true,
        }
    }
}

pub struct EnumLayout {
    pub name: String,
    pub underlying: ValueTag,
    pub members: HashMap<String, i64>,
}

impl EnumLayout {
    pub fn from_decl(decl: &EnumDecl, mut eval_const: impl FnMut(&quill_compiler::ast::Expr) -> i64) -> Self {
        let underlying = decl
            .underlying
            .as_ref()
            .and_then(|t| ValueTag::from_type_name(&t.name))
            .unwrap_or(ValueTag::I32);
        let mut members = HashMap::new();
        let mut next = 0i64;
        for m in &decl.members {
            let value = match &m.value {
                Some(e) => eval_const(e),
                None => next,
            };
            members.insert(m.name.clone(), value);
            next = value + 1;
        }
        EnumLayout { name: decl.name.clone(), underlying, members }
    }
}
