use std::collections::VecDeque;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::error::{GraphKbError, Result};
use crate::schema::{EDGE_BASE, VERTEX_BASE};

/// Scalar or link type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Link,
    Embedded,
}

impl PropertyType {
    /// Store-level type name used in DDL, accounting for the iterable flag.
    pub fn ddl_name(&self, iterable: bool) -> &'static str {
        match (self, iterable) {
            (PropertyType::Boolean, false) => "BOOLEAN",
            (PropertyType::Integer, false) => "INTEGER",
            (PropertyType::Long, false) => "LONG",
            (PropertyType::Double, false) => "DOUBLE",
            (PropertyType::String, false) => "STRING",
            (PropertyType::String, true) => "EMBEDDEDSET",
            (PropertyType::Link, false) => "LINK",
            (PropertyType::Link, true) => "LINKLIST",
            (PropertyType::Embedded, false) => "EMBEDDED",
            (_, true) => "EMBEDDEDLIST",
        }
    }
}

/// Descriptor of a single class property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub prop_type: PropertyType,
    pub mandatory: bool,
    pub nullable: bool,
    pub default: Option<Value>,
    pub linked_class: Option<String>,
    pub iterable: bool,
}

impl PropertyDef {
    /// An optional, nullable property with no default.
    pub fn new(name: &str, prop_type: PropertyType) -> Self {
        PropertyDef {
            name: name.to_string(),
            prop_type,
            mandatory: false,
            nullable: true,
            default: None,
            linked_class: None,
            iterable: false,
        }
    }

    /// Marks the property mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Forbids null values.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default applied by the store on insert.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Names the class a link property points at.
    pub fn linked(mut self, class: &str) -> Self {
        self.linked_class = Some(class.to_string());
        self
    }

    /// Makes the property a collection of its scalar type.
    pub fn iterable(mut self) -> Self {
        self.iterable = true;
        self
    }
}

/// Index kinds supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Unique,
    NotUnique,
    FullText,
}

impl IndexType {
    pub fn ddl_name(&self) -> &'static str {
        match self {
            IndexType::Unique => "UNIQUE",
            IndexType::NotUnique => "NOTUNIQUE",
            IndexType::FullText => "FULLTEXT",
        }
    }
}

/// Descriptor of an index over one or more properties of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub class_name: String,
    pub index_type: IndexType,
    pub properties: Vec<String>,
    pub engine: Option<String>,
}

impl IndexDef {
    /// An index named after its class, properties and type.
    pub fn new(class_name: &str, index_type: IndexType, properties: &[&str]) -> Self {
        let name = format!(
            "{}_{}_{}",
            class_name,
            properties.join("_"),
            index_type.ddl_name().to_lowercase()
        );
        IndexDef {
            name,
            class_name: class_name.to_string(),
            index_type,
            properties: properties.iter().map(|p| p.to_string()).collect(),
            engine: None,
        }
    }

    /// Selects a store-side index engine.
    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_string());
        self
    }
}

/// Descriptor of a single class.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub parents: Vec<String>,
    pub is_abstract: bool,
    pub properties: IndexMap<String, PropertyDef>,
    pub indices: Vec<IndexDef>,
}

impl ClassDef {
    /// A concrete class extending the given parents.
    pub fn new(name: &str, parents: &[&str]) -> Self {
        ClassDef {
            name: name.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            is_abstract: false,
            properties: IndexMap::new(),
            indices: Vec::new(),
        }
    }

    /// Marks the class abstract.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Declares a property, shadowing any earlier one of the same name.
    pub fn property(mut self, def: PropertyDef) -> Self {
        self.properties.insert(def.name.clone(), def);
        self
    }

    /// Declares an index.
    pub fn index(mut self, def: IndexDef) -> Self {
        self.indices.push(def);
        self
    }
}

/// Options for [`SchemaRegistry::classes_inheriting`].
#[derive(Debug, Clone, Copy)]
pub struct InheritOpts {
    pub include_abstract: bool,
    pub include_self: bool,
}

impl Default for InheritOpts {
    fn default() -> Self {
        InheritOpts {
            include_abstract: false,
            include_self: true,
        }
    }
}

/// Read-only registry of every class the application knows about.
#[derive(Debug)]
pub struct SchemaRegistry {
    classes: IndexMap<String, ClassDef>,
    children: FxHashMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// Builds a registry, rejecting classes whose parents are undeclared.
    pub fn new(classes: Vec<ClassDef>) -> Result<SchemaRegistry> {
        let mut by_name: IndexMap<String, ClassDef> = IndexMap::new();
        for class in classes {
            let name = class.name.clone();
            if by_name.insert(name.clone(), class).is_some() {
                return Err(GraphKbError::Schema(format!(
                    "class {name} declared twice in registry"
                )));
            }
        }
        let mut children: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for class in by_name.values() {
            for parent in &class.parents {
                if !by_name.contains_key(parent) {
                    return Err(GraphKbError::Schema(format!(
                        "class {} extends undeclared class {}",
                        class.name, parent
                    )));
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        Ok(SchemaRegistry {
            classes: by_name,
            children,
        })
    }

    /// Looks up a class descriptor.
    pub fn get(&self, name: &str) -> Result<&ClassDef> {
        self.classes
            .get(name)
            .ok_or_else(|| GraphKbError::Schema(format!("unknown class {name}")))
    }

    /// Whether a class is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Every declared class, in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    /// Whether `name` descends from the base edge class.
    pub fn is_edge_class(&self, name: &str) -> bool {
        self.descends_from(name, EDGE_BASE)
    }

    /// Whether `name` descends from the base vertex class.
    pub fn is_vertex_class(&self, name: &str) -> bool {
        self.descends_from(name, VERTEX_BASE)
    }

    /// Whether `name` is `ancestor` or transitively extends it.
    pub fn descends_from(&self, name: &str, ancestor: &str) -> bool {
        if name == ancestor {
            return true;
        }
        let Some(class) = self.classes.get(name) else {
            return false;
        };
        class
            .parents
            .iter()
            .any(|parent| self.descends_from(parent, ancestor))
    }

    /// Ordered transitive closure of classes extending `superclass`.
    ///
    /// Breadth-first over the recorded parent relation so that direct
    /// subclasses come before deeper ones; abstract classes are filtered
    /// unless requested.
    pub fn classes_inheriting(&self, superclass: &str, opts: InheritOpts) -> Result<Vec<&str>> {
        let root = self.get(superclass)?;
        let mut out = Vec::new();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(&root.name);
        queue.push_back(&root.name);
        while let Some(current) = queue.pop_front() {
            let class = &self.classes[current];
            let is_root = class.name == superclass;
            let wanted = (!is_root || opts.include_self)
                && (!class.is_abstract || opts.include_abstract || (is_root && opts.include_self));
            if wanted {
                out.push(current);
            }
            if let Some(subclasses) = self.children.get(current) {
                for sub in subclasses {
                    if seen.insert(sub) {
                        queue.push_back(sub);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Flattened property map of a class, including inherited properties.
    /// Own declarations shadow inherited ones of the same name.
    pub fn properties_of(&self, name: &str) -> Result<IndexMap<&str, &PropertyDef>> {
        let class = self.get(name)?;
        let mut out: IndexMap<&str, &PropertyDef> = IndexMap::new();
        for parent in &class.parents {
            for (prop, def) in self.properties_of(parent)? {
                out.insert(prop, def);
            }
        }
        for (prop, def) in &class.properties {
            out.insert(prop.as_str(), def);
        }
        Ok(out)
    }

    /// Splits requested projection properties into accepted and rejected.
    ///
    /// Dotted paths resolve each segment against the linked class of the
    /// prior segment; the metadata names `@rid` and `@class` always pass.
    pub fn validate_properties(
        &self,
        class_name: &str,
        requested: &[String],
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for name in requested {
            if self.resolve_path(class_name, name)? {
                accepted.push(name.clone());
            } else {
                rejected.push(name.clone());
            }
        }
        Ok((accepted, rejected))
    }

    fn resolve_path(&self, class_name: &str, path: &str) -> Result<bool> {
        let mut current = class_name.to_string();
        let segments: Vec<&str> = path.split('.').collect();
        for (position, segment) in segments.iter().enumerate() {
            if *segment == "@rid" || *segment == "@class" {
                // Metadata names resolve on any class but cannot be
                // traversed further.
                return Ok(position == segments.len() - 1);
            }
            let properties = self.properties_of(&current)?;
            let Some(def) = properties.get(segment) else {
                return Ok(false);
            };
            if position < segments.len() - 1 {
                match &def.linked_class {
                    Some(linked) => current = linked.clone(),
                    None => return Ok(false),
                }
            }
        }
        Ok(true)
    }
}
