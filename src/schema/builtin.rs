//! The GraphKB schema as declared by this build.

use serde_json::json;

use crate::error::Result;
use crate::schema::registry::PropertyType::{Boolean, Embedded, Integer, Link, Long, String as Str};
use crate::schema::registry::{ClassDef, IndexDef, IndexType, PropertyDef};
use crate::schema::SchemaRegistry;

fn audit_properties(class: ClassDef) -> ClassDef {
    class
        .property(PropertyDef::new("uuid", Str).mandatory().not_null())
        .property(PropertyDef::new("createdAt", Long).mandatory().not_null())
        .property(PropertyDef::new("createdBy", Link).linked("User"))
        .property(PropertyDef::new("updatedAt", Long))
        .property(PropertyDef::new("updatedBy", Link).linked("User"))
        .property(PropertyDef::new("deletedAt", Long))
        .property(PropertyDef::new("history", Link))
}

fn ontology_class(name: &str) -> ClassDef {
    ClassDef::new(name, &["Ontology"])
        .index(IndexDef::new(name, IndexType::Unique, &["source", "sourceId", "name", "deletedAt"]))
        .index(IndexDef::new(name, IndexType::FullText, &["name"]).engine("LUCENE"))
}

fn edge_class(name: &str) -> ClassDef {
    ClassDef::new(name, &["E"])
        .property(PropertyDef::new("source", Link).linked("Source"))
        .index(IndexDef::new(name, IndexType::Unique, &["out", "in", "deletedAt"]))
}

/// Builds the registry for the GraphKB schema.
pub fn graphkb() -> Result<SchemaRegistry> {
    let classes = vec![
        audit_properties(ClassDef::new("V", &[]).abstract_class()),
        audit_properties(
            ClassDef::new("E", &[])
                .abstract_class()
                .property(PropertyDef::new("in", Link).mandatory().not_null())
                .property(PropertyDef::new("out", Link).mandatory().not_null()),
        ),
        ClassDef::new("User", &["V"])
            .property(PropertyDef::new("name", Str).mandatory().not_null())
            .property(PropertyDef::new("groups", Link).linked("UserGroup").iterable())
            .index(IndexDef::new("User", IndexType::Unique, &["name", "deletedAt"])),
        ClassDef::new("UserGroup", &["V"])
            .property(PropertyDef::new("name", Str).mandatory().not_null())
            .property(PropertyDef::new("permissions", Embedded))
            .index(IndexDef::new("UserGroup", IndexType::Unique, &["name"])),
        ClassDef::new("Source", &["V"])
            .property(PropertyDef::new("name", Str).mandatory().not_null())
            .property(PropertyDef::new("displayName", Str))
            .property(PropertyDef::new("description", Str))
            .property(PropertyDef::new("version", Str))
            .property(PropertyDef::new("url", Str))
            .property(PropertyDef::new("usage", Str))
            .property(PropertyDef::new("sort", Integer).default_value(json!(99999)))
            .index(IndexDef::new("Source", IndexType::Unique, &["name", "version", "deletedAt"])),
        ClassDef::new("Ontology", &["V"])
            .abstract_class()
            .property(PropertyDef::new("name", Str).mandatory().not_null())
            .property(PropertyDef::new("sourceId", Str).mandatory().not_null())
            .property(PropertyDef::new("source", Link).mandatory().not_null().linked("Source"))
            .property(PropertyDef::new("sourceIdVersion", Str))
            .property(PropertyDef::new("displayName", Str))
            .property(PropertyDef::new("description", Str))
            .property(PropertyDef::new("deprecated", Boolean).default_value(json!(false)))
            .property(PropertyDef::new("subsets", Str).iterable())
            .property(PropertyDef::new("url", Str)),
        ontology_class("Disease"),
        ontology_class("Therapy"),
        ontology_class("AnatomicalEntity"),
        ontology_class("Vocabulary"),
        ontology_class("Feature")
            .property(PropertyDef::new("biotype", Str).mandatory().not_null()),
        edge_class("AliasOf"),
        edge_class("CrossReferenceOf"),
        edge_class("DeprecatedBy"),
        edge_class("ElementOf"),
        edge_class("GeneralizationOf"),
        edge_class("SubClassOf"),
        ClassDef::new("SchemaHistory", &["V"])
            .property(PropertyDef::new("name", Str).mandatory().not_null())
            .property(PropertyDef::new("version", Str).mandatory().not_null())
            .property(PropertyDef::new("url", Str))
            .property(PropertyDef::new("createdAt", Long).mandatory().not_null()),
        ClassDef::new("LicenseAgreement", &["V"])
            .property(PropertyDef::new("content", Str).mandatory().not_null())
            .property(PropertyDef::new("enactedAt", Long).mandatory().not_null()),
    ];
    SchemaRegistry::new(classes)
}
