//! Parse → serialize round trips, reference binding and extension data.

use json_schema_model::{
    AdditionalProperties, FileLoader, Items, NullHandling, SchemaDocument, SchemaError, SchemaNode,
    TypeFlags,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const CUSTOM_CONTAINERS: &str = r##"{
  "$schema": "http://json-schema.org/draft-04/schema#",
  "type": "array",
  "minItems": 1,
  "additionalProperties": false,
  "items": {
    "maxProperties": 1,
    "minProperties": 1,
    "additionalProperties": false,
    "properties": {
      "Ok": {
        "$ref": "#/messages/Ok"
      }
    }
  },
  "components": {
    "Foo": true,
    "Bar": {},
    "Id": {
      "type": "integer",
      "maximum": 4294967295.0,
      "minimum": 0.0
    },
    "IdMessage": {
      "maxProperties": 1,
      "minProperties": 1,
      "additionalProperties": false,
      "required": [
        "Id"
      ],
      "properties": {
        "Id": {
          "$ref": "#/components/Id"
        }
      }
    }
  },
  "messages": {
    "Ok": {
      "type": "object",
      "anyOf": [
        {
          "$ref": "#/components/IdMessage"
        }
      ]
    }
  }
}"##;

mod round_trip {
    use super::*;

    #[test]
    fn references_into_custom_containers_round_trip_exactly() {
        let doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        assert!(doc.unresolved_references().is_empty());
        assert_eq!(doc.to_json().unwrap(), CUSTOM_CONTAINERS);
    }

    #[test]
    fn second_round_trip_is_stable() {
        let input = r##"{"properties":{"b":{"type":["string","null"]},"a":{"$ref":"#/definitions/A"}},"type":"object","title":"T","x-vendor":{"k":[1,2.5]},"definitions":{"A":{"enum":[1,"two"]}}}"##;
        let first = SchemaDocument::from_json(input).unwrap().to_json().unwrap();
        let second = SchemaDocument::from_json(&first).unwrap().to_json().unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("{\n  \"$schema\": \"http://json-schema.org/draft-04/schema#\",\n  \"title\": \"T\""));
        assert!(first.contains("\"null\",\n        \"string\""));
    }

    #[test]
    fn property_order_is_declaration_order() {
        let doc = SchemaDocument::from_value(&json!({
            "properties": { "zeta": {}, "alpha": {}, "mid": {} }
        }))
        .unwrap();
        let value = doc.to_value().unwrap();
        let keys: Vec<&str> = value["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn draft04_exclusive_flags_round_trip() {
        let input = r##"{
  "$schema": "http://json-schema.org/draft-04/schema#",
  "maximum": 10,
  "exclusiveMaximum": true,
  "minimum": 0,
  "exclusiveMinimum": false
}"##;
        let doc = SchemaDocument::from_json(input).unwrap();
        assert_eq!(doc.to_json().unwrap(), input);
    }

    #[test]
    fn trailing_comma_is_malformed() {
        let err = SchemaDocument::from_json(
            "{\n  \"$schema\": \"http://json-schema.org/draft-04/schema#\",\n}",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedDocument { .. }));
    }

    #[test]
    fn malformed_text_is_rejected_without_a_graph() {
        let err = SchemaDocument::from_json("{\"type\": ").unwrap_err();
        assert!(matches!(err, SchemaError::MalformedDocument { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}

mod references {
    use super::*;

    #[test]
    fn custom_container_targets_resolve_to_nested_nodes() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();

        let id = doc.resolve_pointer("#/components/Id").unwrap();
        assert_eq!(doc[id].type_flags, TypeFlags::INTEGER);

        let ok = doc.resolve_pointer("#/messages/Ok").unwrap();
        assert_eq!(doc[ok].type_flags, TypeFlags::OBJECT);
        assert_eq!(doc[ok].any_of.len(), 1);

        let id_message = doc.actual_schema(doc[ok].any_of[0]);
        assert_eq!(doc.resolve_pointer("#/components/IdMessage").unwrap(), id_message);
        let inner_id = doc.property(id_message, "Id").unwrap();
        assert_eq!(doc.actual_schema(inner_id), id);
    }

    #[test]
    fn reference_from_items_reaches_message() {
        let doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let Some(Items::Schema(items)) = doc.root_node().items.clone() else {
            panic!("items should be a single schema");
        };
        let ok = doc.property(items, "Ok").unwrap();
        let target = doc.actual_schema(ok);
        assert_eq!(doc[target].type_flags, TypeFlags::OBJECT);
        assert_eq!(
            doc[items].additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
    }

    #[test]
    fn same_pointer_twice_is_same_node() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let a = doc.resolve_pointer("#/components/IdMessage").unwrap();
        let b = doc.resolve_pointer("#/components/IdMessage").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn member_keeps_identity_after_container_is_promoted() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let member = doc.resolve_pointer("#/components/IdMessage").unwrap();
        let container = doc.resolve_pointer("#/components").unwrap();
        assert_ne!(member, container);
        assert_eq!(doc.resolve_pointer("#/components/IdMessage").unwrap(), member);
    }

    #[test]
    fn member_after_container_is_stable() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let container = doc.resolve_pointer("#/components").unwrap();
        let member = doc.resolve_pointer("#/components/IdMessage").unwrap();
        assert_eq!(doc.resolve_pointer("#/components/IdMessage").unwrap(), member);
        assert_eq!(doc.resolve_pointer("#/components").unwrap(), container);
    }

    #[test]
    fn nested_member_becomes_child_of_promoted_message() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let inner = doc.resolve_pointer("#/components/IdMessage/properties/Id").unwrap();
        let message = doc.resolve_pointer("#/components/IdMessage").unwrap();
        assert_eq!(doc.property(message, "Id"), Some(inner));
        assert_eq!(
            doc.resolve_pointer("#/components/IdMessage/properties/Id").unwrap(),
            inner
        );
    }

    #[test]
    fn container_keys_named_like_keywords() {
        let doc = SchemaDocument::from_value(&json!({
            "messages": {
                "title": { "type": "string" },
                "properties": { "type": "integer" }
            },
            "properties": {
                "a": { "$ref": "#/messages/title" },
                "b": { "$ref": "#/messages/properties" }
            }
        }))
        .unwrap();

        assert!(doc.unresolved_references().is_empty());
        let a = doc.property(doc.root(), "a").unwrap();
        let b = doc.property(doc.root(), "b").unwrap();
        assert_eq!(doc[doc.actual_schema(a)].type_flags, TypeFlags::STRING);
        assert_eq!(doc[doc.actual_schema(b)].type_flags, TypeFlags::INTEGER);
    }

    #[test]
    fn non_schema_extension_value_is_unresolved() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        assert!(doc.resolve_pointer("#/components/Foo").is_err());
        assert!(doc.resolve_pointer("#/components/Missing").is_err());
        assert!(doc.resolve_pointer("#/components/Bar").is_ok());
    }

    #[test]
    fn forward_and_cyclic_references() {
        let doc = SchemaDocument::from_value(&json!({
            "properties": {
                "first": { "$ref": "#/definitions/Later" }
            },
            "definitions": {
                "Later": {
                    "type": "object",
                    "properties": { "again": { "$ref": "#/definitions/Later" } }
                },
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" }
            }
        }))
        .unwrap();

        assert!(doc.unresolved_references().is_empty());
        let later = doc.definition("Later").unwrap();
        let again = doc.property(later, "again").unwrap();
        assert_eq!(doc.actual_schema(again), later);

        let a = doc.definition("A").unwrap();
        let reached = doc.actual_schema(a);
        assert!(reached == a || reached == doc.definition("B").unwrap());
        // Reference cycles serialize as plain $ref strings.
        assert!(doc.to_json().is_ok());
    }

    #[test]
    fn one_broken_reference_does_not_stop_others() {
        let doc = SchemaDocument::from_value(&json!({
            "properties": {
                "a": { "$ref": "#/nowhere/x" },
                "b": { "$ref": "#/definitions/B" },
                "c": { "$ref": "#anchor" }
            },
            "definitions": { "B": { "type": "boolean" } }
        }))
        .unwrap();

        let unresolved = doc.unresolved_references();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].location, "#/properties/a");
        assert_eq!(unresolved[1].location, "#/properties/c");

        let b = doc.property(doc.root(), "b").unwrap();
        assert_eq!(doc.reference_target(b), doc.definition("B"));
    }

    #[test]
    fn percent_encoded_segments_resolve() {
        let doc = SchemaDocument::from_value(&json!({
            "properties": { "x": { "$ref": "#/definitions/My%20Type" } },
            "definitions": { "My Type": { "type": "string" } }
        }))
        .unwrap();
        assert!(doc.unresolved_references().is_empty());
    }

    #[test]
    fn nullable_reference_wrapper() {
        let doc = SchemaDocument::from_value(&json!({
            "properties": {
                "r": { "oneOf": [ { "type": "null" }, { "$ref": "#/definitions/T" } ] }
            },
            "definitions": { "T": { "type": "object" } }
        }))
        .unwrap();
        let r = doc.property(doc.root(), "r").unwrap();
        assert!(doc.is_nullable(r, NullHandling::Union));
        assert_eq!(doc.actual_type_schema(r), doc.definition("T").unwrap());
    }

    #[test]
    fn required_without_property_is_tolerated() {
        let doc = SchemaDocument::from_value(&json!({
            "required": ["ghost"],
            "properties": { "real": {} }
        }))
        .unwrap();
        assert!(doc.unresolved_references().is_empty());
        assert_eq!(doc.missing_required(doc.root()), vec!["ghost"]);
    }
}

mod extension_data {
    use super::*;

    #[test]
    fn serialized_next_to_dialect_header() {
        let mut doc = SchemaDocument::new();
        doc.root_node_mut().insert_extension("Test", json!(123)).unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            "{\n  \"$schema\": \"http://json-schema.org/draft-04/schema#\",\n  \"Test\": 123\n}"
        );
    }

    #[test]
    fn parsed_as_numbers() {
        let doc = SchemaDocument::from_json(
            "{\n  \"$schema\": \"http://json-schema.org/draft-04/schema#\",\n  \"Test\": 123\n}",
        )
        .unwrap();
        assert_eq!(doc.root_node().extension("Test"), Some(&json!(123)));
    }

    #[test]
    fn absent_when_no_unknown_keys() {
        let doc = SchemaDocument::from_json(
            r##"{"$schema": "http://json-schema.org/draft-04/schema#", "properties": {"a": {"type": "string"}}}"##,
        )
        .unwrap();
        assert!(doc.root_node().extension_data().is_none());
        let a = doc.property(doc.root(), "a").unwrap();
        assert!(doc[a].extension_data().is_none());
    }

    #[test]
    fn mutation_of_promoted_node_is_serialized() {
        let mut doc = SchemaDocument::from_json(CUSTOM_CONTAINERS).unwrap();
        let id = doc.resolve_pointer("#/components/Id").unwrap();
        doc[id].description = Some("identifier".into());

        let value = doc.to_value().unwrap();
        assert_eq!(value["components"]["Id"]["description"], "identifier");
        assert_eq!(value["components"]["Foo"], json!(true));
    }

    #[test]
    fn edit_through_member_survives_container_reference() {
        for (first, second) in [("a", "b"), ("b", "a")] {
            let mut properties = serde_json::Map::new();
            let pointers = [("a", "#/components/Msg"), ("b", "#/components")];
            for name in [first, second] {
                let pointer = pointers.iter().find(|(n, _)| *n == name).unwrap().1;
                properties.insert(name.to_string(), json!({ "$ref": pointer }));
            }
            let mut doc = SchemaDocument::from_value(&json!({
                "properties": properties,
                "components": { "Msg": { "type": "object" } }
            }))
            .unwrap();
            assert!(doc.unresolved_references().is_empty());

            let a = doc.property(doc.root(), "a").unwrap();
            let msg = doc.reference_target(a).unwrap();
            doc[msg].description = Some("edited".into());
            assert_eq!(doc.resolve_pointer("#/components/Msg").unwrap(), msg);

            let value = doc.to_value().unwrap();
            assert_eq!(
                value["components"]["Msg"],
                json!({ "description": "edited", "type": "object" }),
                "reference order {first} then {second}"
            );
        }
    }

    #[test]
    fn nested_nodes_keep_their_own_extension_data() {
        let mut doc = SchemaDocument::new();
        let child = doc.add_node(SchemaNode::with_type(TypeFlags::STRING));
        doc[child].insert_extension("x-child", json!("yes")).unwrap();
        let root = doc.root();
        doc[root].properties.insert("p".into(), child);

        let reparsed = SchemaDocument::from_json(&doc.to_json().unwrap()).unwrap();
        let p = reparsed.property(reparsed.root(), "p").unwrap();
        assert_eq!(reparsed[p].extension("x-child"), Some(&json!("yes")));
    }
}

mod external {
    use super::*;

    #[test]
    fn file_loader_binds_into_sibling_document() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("common.json"),
            r##"{"definitions": {"Id": {"$ref": "#/definitions/Raw"}, "Raw": {"type": "integer"}}}"##,
        )
        .unwrap();

        let doc = SchemaDocument::from_json_with_loader(
            r##"{"properties": {"id": {"$ref": "common.json#/definitions/Id"}}}"##,
            &FileLoader::new(dir.path()),
        )
        .unwrap();

        assert!(doc.unresolved_references().is_empty());
        let id = doc.property(doc.root(), "id").unwrap();
        let target = doc.actual_schema(id);
        assert_eq!(doc[target].type_flags, TypeFlags::INTEGER);

        let externals: Vec<&str> = doc.external_documents().map(|(loc, _)| loc).collect();
        assert_eq!(externals, vec!["common.json"]);
        // The external document is not inlined.
        assert!(doc
            .to_json()
            .unwrap()
            .contains("\"$ref\": \"common.json#/definitions/Id\""));
    }

    #[test]
    fn missing_external_document_is_unresolved() {
        let dir = TempDir::new().unwrap();
        let doc = SchemaDocument::from_json_with_loader(
            r##"{"properties": {"a": {"$ref": "gone.json#/x"}, "b": {"$ref": "gone.json#/y"}}}"##,
            &FileLoader::new(dir.path()),
        )
        .unwrap();

        let unresolved = doc.unresolved_references();
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved[0].reason.contains("file not found"));
    }

    #[cfg(feature = "remote")]
    #[test]
    fn url_loader_fetches_remote_document() {
        use json_schema_model::UrlLoader;

        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/types.json")
            .with_header("content-type", "application/json")
            .with_body(r##"{"definitions": {"Name": {"type": "string"}}}"##)
            .create();

        let schema = json!({
            "properties": {
                "name": { "$ref": format!("{}/types.json#/definitions/Name", server.url()) }
            }
        });
        let doc = SchemaDocument::from_value_with_loader(&schema, &UrlLoader::new().unwrap()).unwrap();

        assert!(doc.unresolved_references().is_empty());
        let name = doc.property(doc.root(), "name").unwrap();
        assert_eq!(doc[doc.actual_schema(name)].type_flags, TypeFlags::STRING);
    }
}
