//! Type mapper integration tests.

use json_schema_model::{
    generate_schema, AdditionalProperties, Constraint, EnumHandling, EnumType, GeneratorSettings,
    Items, Member, NullHandling, ObjectType, Primitive, SchemaDocument, SchemaGenerator, SchemaId,
    TypeCatalog, TypeFlags, TypeShape,
};
use serde_json::json;

fn my_type_catalog() -> TypeCatalog {
    let color = EnumType::sequential("MyColor", ["Red", "Green", "Blue"]).handling(EnumHandling::Name);

    TypeCatalog::new()
        .with(
            ObjectType::new("MyType")
                .display_name("My Type")
                .member(Member::new("Integer", TypeShape::Integer).description("Test"))
                .member(Member::new("Decimal", TypeShape::Number))
                .member(Member::new("Double", TypeShape::Number))
                .member(Member::new("Boolean", TypeShape::Boolean))
                .member(Member::new("NullableInteger", TypeShape::Nullable(Primitive::Integer)))
                .member(Member::new("NullableDecimal", TypeShape::Nullable(Primitive::Number)))
                .member(Member::new("NullableDouble", TypeShape::Nullable(Primitive::Number)))
                .member(Member::new("NullableBoolean", TypeShape::Nullable(Primitive::Boolean)))
                .member(Member::new("String", TypeShape::String))
                .member(Member::new("ChangedName", TypeShape::String).rename("abc"))
                .member(Member::new("RequiredReference", TypeShape::object("MySubtype")).required())
                .member(Member::new("RegexString", TypeShape::String).constraint(Constraint::pattern("regex")))
                .member(Member::new("RangeInteger", TypeShape::Integer).constraint(Constraint::range(5, 10)))
                .member(Member::new("Reference", TypeShape::object("MySubtype")))
                .member(Member::new("Array", TypeShape::array(TypeShape::object("MySubtype"))))
                .member(Member::new("Collection", TypeShape::array(TypeShape::object("MySubtype"))))
                .member(Member::new("List", TypeShape::array(TypeShape::object("MySubtype"))))
                .member(Member::new("Color", TypeShape::Enum(color))),
        )
        .with(ObjectType::new("MySubtype").member(Member::new("Id", TypeShape::String)))
}

fn generate_my_type() -> SchemaDocument {
    generate_schema(&my_type_catalog(), "MyType", GeneratorSettings::default()).unwrap()
}

fn prop(doc: &SchemaDocument, name: &str) -> SchemaId {
    doc.property(doc.root(), name)
        .unwrap_or_else(|| panic!("missing property {}", name))
}

mod primitives {
    use super::*;

    #[test]
    fn simple_properties_have_expected_types() {
        let doc = generate_my_type();
        assert_eq!(doc[prop(&doc, "Integer")].type_flags, TypeFlags::INTEGER);
        assert_eq!(doc[prop(&doc, "Decimal")].type_flags, TypeFlags::NUMBER);
        assert_eq!(doc[prop(&doc, "Double")].type_flags, TypeFlags::NUMBER);
        assert_eq!(doc[prop(&doc, "Boolean")].type_flags, TypeFlags::BOOLEAN);
        assert_eq!(
            doc[prop(&doc, "String")].type_flags,
            TypeFlags::STRING | TypeFlags::NULL
        );
        assert_eq!(
            doc[prop(&doc, "Array")].type_flags,
            TypeFlags::ARRAY | TypeFlags::NULL
        );
    }

    #[test]
    fn nullable_primitives_include_null() {
        let doc = generate_my_type();
        assert_eq!(
            doc[prop(&doc, "NullableInteger")].type_flags,
            TypeFlags::INTEGER | TypeFlags::NULL
        );
        assert_eq!(
            doc[prop(&doc, "NullableDecimal")].type_flags,
            TypeFlags::NUMBER | TypeFlags::NULL
        );
        assert_eq!(
            doc[prop(&doc, "NullableDouble")].type_flags,
            TypeFlags::NUMBER | TypeFlags::NULL
        );
        assert_eq!(
            doc[prop(&doc, "NullableBoolean")].type_flags,
            TypeFlags::BOOLEAN | TypeFlags::NULL
        );
    }

    #[test]
    fn value_types_are_neither_required_nor_nullable() {
        let doc = generate_my_type();
        for name in ["Integer", "Decimal", "Double", "Boolean"] {
            assert!(!doc.root_node().is_required(name), "{} required", name);
            assert!(!doc[prop(&doc, name)].type_flags.contains(TypeFlags::NULL));
        }
        assert!(!doc.root_node().is_required("String"));
        assert!(doc[prop(&doc, "String")].type_flags.contains(TypeFlags::NULL));
    }

    #[test]
    fn non_nullable_reference_types_setting() {
        let settings = GeneratorSettings::new().nullable_reference_types(false);
        let doc = generate_schema(&my_type_catalog(), "MyType", settings).unwrap();
        assert_eq!(doc[prop(&doc, "String")].type_flags, TypeFlags::STRING);
        let reference = prop(&doc, "Reference");
        assert!(doc[reference].is_reference());
    }
}

mod annotations {
    use super::*;

    #[test]
    fn description_is_copied() {
        let doc = generate_my_type();
        assert_eq!(doc[prop(&doc, "Integer")].description.as_deref(), Some("Test"));
    }

    #[test]
    fn descriptions_can_be_disabled() {
        let settings = GeneratorSettings::new().include_property_descriptions(false);
        let doc = generate_schema(&my_type_catalog(), "MyType", settings).unwrap();
        assert_eq!(doc[prop(&doc, "Integer")].description, None);
    }

    #[test]
    fn required_marker_adds_to_required() {
        let doc = generate_my_type();
        assert!(doc.root_node().is_required("RequiredReference"));
        let required: Vec<&str> = doc.root_node().required.iter().map(String::as_str).collect();
        assert_eq!(required, vec!["RequiredReference"]);
    }

    #[test]
    fn pattern_and_range() {
        let doc = generate_my_type();
        assert_eq!(doc[prop(&doc, "RegexString")].pattern.as_deref(), Some("regex"));

        let range = &doc[prop(&doc, "RangeInteger")];
        assert_eq!(range.minimum, Some(5.into()));
        assert_eq!(range.maximum, Some(10.into()));
    }

    #[test]
    fn rename_changes_only_the_key() {
        let doc = generate_my_type();
        assert!(doc.property(doc.root(), "abc").is_some());
        assert!(doc.property(doc.root(), "ChangedName").is_none());
    }

    #[test]
    fn renamed_required_member_uses_json_name() {
        let catalog = TypeCatalog::new().with(
            ObjectType::new("T").member(Member::new("Inner", TypeShape::Integer).rename("outer").required()),
        );
        let doc = generate_schema(&catalog, "T", GeneratorSettings::default()).unwrap();
        assert!(doc.root_node().is_required("outer"));
        assert!(!doc.root_node().is_required("Inner"));
    }

    #[test]
    fn dictionary_pattern_goes_to_value_schema() {
        let catalog = TypeCatalog::new().with(
            ObjectType::new("ClassWithRegexDictionaryProperty").member(
                Member::new("Versions", TypeShape::dictionary(TypeShape::String))
                    .constraint(Constraint::pattern(r"^\d+\.\d+\.\d+\.\d+$")),
            ),
        );
        let doc = generate_schema(&catalog, "ClassWithRegexDictionaryProperty", GeneratorSettings::default())
            .unwrap();

        let versions = prop(&doc, "Versions");
        assert_eq!(doc[versions].pattern, None);
        let Some(AdditionalProperties::Schema(value)) = doc[versions].additional_properties else {
            panic!("dictionary should have a value schema");
        };
        assert_eq!(
            doc[doc.actual_schema(value)].pattern.as_deref(),
            Some(r"^\d+\.\d+\.\d+\.\d+$")
        );
    }

    #[test]
    fn extension_data_on_type_and_member() {
        let catalog = TypeCatalog::new().with(
            ObjectType::new("MyTest")
                .extension("MyClass", json!(123))
                .member(
                    Member::new("Property", TypeShape::String)
                        .extension("Foo", json!(2))
                        .extension("Bar", json!(3)),
                ),
        );
        let doc = generate_schema(&catalog, "MyTest", GeneratorSettings::default()).unwrap();

        assert_eq!(doc.root_node().extension("MyClass"), Some(&json!(123)));
        let property = prop(&doc, "Property");
        assert_eq!(doc[property].extension("Foo"), Some(&json!(2)));
        assert_eq!(doc[property].extension("Bar"), Some(&json!(3)));
    }
}

mod objects {
    use super::*;

    #[test]
    fn reference_is_nullable_and_defined_once() {
        let doc = generate_my_type();
        let reference = prop(&doc, "Reference");
        assert!(doc.is_nullable(reference, NullHandling::Union));

        let keys: Vec<&str> = doc.root_node().definitions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["MySubtype"]);
    }

    #[test]
    fn every_occurrence_points_at_the_same_definition() {
        let doc = generate_my_type();
        let definition = doc.definition("MySubtype").unwrap();

        for name in ["RequiredReference", "Reference"] {
            assert_eq!(doc.actual_type_schema(prop(&doc, name)), definition, "{}", name);
        }
        for name in ["Array", "Collection", "List"] {
            let Some(Items::Schema(item)) = doc[prop(&doc, name)].items.clone() else {
                panic!("{} should have items", name);
            };
            assert_eq!(doc[item].reference(), Some("#/definitions/MySubtype"));
            assert_eq!(doc.actual_schema(item), definition);
        }
    }

    #[test]
    fn array_items_resolve_to_object_definition() {
        let doc = generate_my_type();
        for name in ["Array", "Collection", "List"] {
            let property = prop(&doc, name);
            assert_eq!(doc[property].type_flags, TypeFlags::ARRAY | TypeFlags::NULL);
            let Some(Items::Schema(item)) = doc[property].items.clone() else {
                panic!("{} should have items", name);
            };
            let subtype = doc.actual_schema(item);
            assert_eq!(doc[subtype].type_flags, TypeFlags::OBJECT);
            let id = doc.property(subtype, "Id").unwrap();
            assert_eq!(doc[id].type_flags, TypeFlags::STRING | TypeFlags::NULL);
        }
    }

    #[test]
    fn enum_override_uses_names() {
        let doc = generate_my_type();
        let color = doc.actual_type_schema(prop(&doc, "Color"));
        assert_eq!(
            doc[color].enumeration,
            Some(vec![json!("Red"), json!("Green"), json!("Blue")])
        );
        assert_eq!(doc[color].type_flags, TypeFlags::STRING);
    }

    #[test]
    fn enum_by_value() {
        let catalog = TypeCatalog::new().with(ObjectType::new("T").member(Member::new(
            "Level",
            TypeShape::Enum(EnumType::sequential("Level", ["Low", "High", "High"])),
        )));
        let doc = generate_schema(&catalog, "T", GeneratorSettings::default()).unwrap();
        let level = prop(&doc, "Level");
        assert_eq!(doc[level].type_flags, TypeFlags::INTEGER);
        assert_eq!(doc[level].enumeration, Some(vec![json!(0), json!(1), json!(2)]));
    }

    #[test]
    fn dynamic_member_is_any() {
        let catalog = TypeCatalog::new().with(
            ObjectType::new("ClassWithJObjectProperty").member(Member::new("Property", TypeShape::Dynamic)),
        );
        let doc = generate_schema(&catalog, "ClassWithJObjectProperty", GeneratorSettings::default()).unwrap();

        let property = prop(&doc, "Property");
        assert!(doc.is_nullable(property, NullHandling::Flags));
        let actual = doc.actual_type_schema(property);
        assert!(doc.is_any_type(actual));
        assert!(doc[actual].allows_additional_properties());
        assert!(doc[property].properties.is_empty());
    }

    #[test]
    fn display_name_is_title() {
        let doc = generate_my_type();
        assert_eq!(doc.root_node().title.as_deref(), Some("My Type"));
    }

    #[test]
    fn empty_display_name_falls_back_to_identity() {
        let catalog = TypeCatalog::new().with(ObjectType::new("FallBackDisplayName").display_name(""));
        let doc = generate_schema(&catalog, "FallBackDisplayName", GeneratorSettings::default()).unwrap();
        assert_eq!(doc.root_node().title.as_deref(), Some("FallBackDisplayName"));
    }

    #[test]
    fn definition_key_strips_display_name() {
        let catalog = TypeCatalog::new()
            .with(ObjectType::new("Holder").member(Member::new("Item", TypeShape::object("ns.Item"))))
            .with(ObjectType::new("ns.Item").display_name("Line Item!"));
        let doc = generate_schema(&catalog, "Holder", GeneratorSettings::default()).unwrap();

        let item = doc.definition("LineItem").unwrap();
        assert_eq!(doc[item].title.as_deref(), Some("Line Item!"));
    }

    #[test]
    fn mutual_recursion_terminates() {
        let catalog = TypeCatalog::new()
            .with(ObjectType::new("Parent").member(Member::new("Child", TypeShape::object("Child"))))
            .with(ObjectType::new("Child").member(Member::new("Parent", TypeShape::object("Parent"))));
        let doc = generate_schema(&catalog, "Parent", GeneratorSettings::default()).unwrap();

        let child = doc.definition("Child").unwrap();
        let back = doc.property(child, "Parent").unwrap();
        assert_eq!(doc.actual_type_schema(back), doc.root());
        assert!(doc.to_json().is_ok());
    }
}

mod output {
    use super::*;

    #[test]
    fn generated_document_round_trips() {
        let doc = generate_my_type();
        let text = doc.to_json().unwrap();
        let reparsed = SchemaDocument::from_json(&text).unwrap();
        assert!(reparsed.unresolved_references().is_empty());
        assert_eq!(reparsed.to_json().unwrap(), text);
    }

    #[test]
    fn generated_document_is_a_valid_draft04_schema() {
        let value = generate_my_type().to_value().unwrap();
        assert!(jsonschema::validator_for(&value).is_ok());
    }

    #[test]
    fn nullable_reference_serializes_as_union() {
        let value = generate_my_type().to_value().unwrap();
        assert_eq!(
            value["properties"]["Reference"],
            json!({ "oneOf": [ { "type": "null" }, { "$ref": "#/definitions/MySubtype" } ] })
        );
        assert_eq!(
            value["properties"]["RequiredReference"],
            json!({ "oneOf": [ { "type": "null" }, { "$ref": "#/definitions/MySubtype" } ] })
        );
        assert_eq!(value["properties"]["String"]["type"], json!(["null", "string"]));
    }

    #[test]
    fn generate_shape_dictionary_root() {
        let catalog = TypeCatalog::new();
        let doc = SchemaGenerator::new(&catalog, GeneratorSettings::default())
            .generate_shape(&TypeShape::dictionary(TypeShape::Integer))
            .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["type"], json!(["null", "object"]));
        assert_eq!(value["additionalProperties"], json!({ "type": "integer" }));
    }

    #[test]
    fn catalog_loaded_from_json_generates() {
        let catalog = TypeCatalog::from_json(
            r#"[{"identity": "Pet", "members": [
                {"name": "Name", "shape": {"kind": "string"}, "nullable": false,
                 "constraints": [{"kind": "required"}, {"kind": "length", "min": 1}]}
            ]}]"#,
        )
        .unwrap();
        let doc = generate_schema(&catalog, "Pet", GeneratorSettings::default()).unwrap();
        assert_eq!(
            doc.to_value().unwrap(),
            json!({
                "$schema": "http://json-schema.org/draft-04/schema#",
                "title": "Pet",
                "type": "object",
                "required": ["Name"],
                "properties": { "Name": { "type": "string", "minLength": 1 } }
            })
        );
    }
}
