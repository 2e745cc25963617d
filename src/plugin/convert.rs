//! Mapping of framework schemas and diagnostics onto protocol messages.

use super::proto::tfplugin6::{
    self, AttributePath, StringKind, attribute_path, diagnostic, schema,
};
use crate::framework::{Attribute, AttributeKind, Diagnostics, Schema, Severity};

fn cty_type(kind: &AttributeKind) -> Vec<u8> {
    match kind {
        AttributeKind::String => b"\"string\"".to_vec(),
        AttributeKind::Int64 => b"\"number\"".to_vec(),
        AttributeKind::Bool => b"\"bool\"".to_vec(),
        AttributeKind::StringList => b"[\"list\",\"string\"]".to_vec(),
        AttributeKind::ListNested(_) | AttributeKind::SingleNested(_) => Vec::new(),
    }
}

fn nested_type(kind: &AttributeKind) -> Option<schema::Object> {
    let (attributes, nesting) = match kind {
        AttributeKind::ListNested(attributes) => (attributes, schema::object::NestingMode::List),
        AttributeKind::SingleNested(attributes) => {
            (attributes, schema::object::NestingMode::Single)
        }
        AttributeKind::String
        | AttributeKind::Int64
        | AttributeKind::Bool
        | AttributeKind::StringList => return None,
    };
    Some(schema::Object {
        attributes: attributes.iter().map(attribute).collect(),
        nesting: i32::from(nesting),
    })
}

fn attribute(attribute: &Attribute) -> schema::Attribute {
    schema::Attribute {
        name: attribute.name.to_owned(),
        r#type: cty_type(&attribute.kind),
        nested_type: nested_type(&attribute.kind),
        description: attribute.description.to_owned(),
        required: attribute.required,
        optional: attribute.optional,
        computed: attribute.computed,
        sensitive: attribute.sensitive,
        description_kind: i32::from(StringKind::Plain),
        deprecated: false,
    }
}

/// Converts a framework schema into its protocol form.
pub(crate) fn schema_message(schema: &Schema) -> tfplugin6::Schema {
    tfplugin6::Schema {
        version: 0,
        block: Some(schema::Block {
            version: 0,
            attributes: schema.attributes.iter().map(attribute).collect(),
            block_types: Vec::new(),
            description: schema.description.to_owned(),
            description_kind: i32::from(StringKind::Plain),
            deprecated: false,
        }),
    }
}

/// Path to a top-level attribute.
pub(crate) fn attribute_path(name: &str) -> AttributePath {
    AttributePath {
        steps: vec![attribute_path::Step {
            selector: Some(attribute_path::step::Selector::AttributeName(
                name.to_owned(),
            )),
        }],
    }
}

/// Converts diagnostics into their protocol form.
pub(crate) fn diagnostic_messages(diagnostics: &Diagnostics) -> Vec<tfplugin6::Diagnostic> {
    diagnostics
        .iter()
        .map(|entry| {
            let severity = match entry.severity {
                Severity::Error => diagnostic::Severity::Error,
                Severity::Warning => diagnostic::Severity::Warning,
            };
            tfplugin6::Diagnostic {
                severity: i32::from(severity),
                summary: entry.summary.clone(),
                detail: entry.detail.clone(),
                attribute: entry.attribute.as_deref().map(attribute_path),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Diagnostic;
    use crate::resources::vm;

    fn find<'a>(block: &'a schema::Block, name: &str) -> &'a schema::Attribute {
        block
            .attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .unwrap_or_else(|| panic!("attribute {name} missing"))
    }

    #[test]
    fn vm_schema_uses_cty_types_and_nested_objects() {
        let converted = schema_message(&vm::schema());
        let block = converted.block.unwrap_or_default();

        let ssh_keys = find(&block, "ssh_keys");
        assert_eq!(ssh_keys.r#type, b"[\"list\",\"string\"]".to_vec());
        assert!(ssh_keys.required);

        let instances = find(&block, "instances");
        assert_eq!(instances.r#type, b"\"number\"".to_vec());
        assert!(instances.optional && instances.computed);

        let open_ports = find(&block, "open_ports");
        assert!(open_ports.r#type.is_empty());
        let nested = open_ports.nested_type.clone().unwrap_or_default();
        assert_eq!(nested.nesting(), schema::object::NestingMode::List);
        let names: Vec<_> = nested.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["port", "protocol"]);
    }

    #[test]
    fn diagnostics_carry_attribute_paths() {
        let mut diags = Diagnostics::from(Diagnostic::error("Client Error", "boom"));
        diags.add_attribute_error("api_key", "Missing Fluence API ApiKey", "set it");

        let converted = diagnostic_messages(&diags);

        let [plain, attributed] = converted.as_slice() else {
            panic!("expected two diagnostics, got {converted:?}");
        };
        assert_eq!(plain.severity(), diagnostic::Severity::Error);
        assert!(plain.attribute.is_none());
        assert_eq!(attributed.attribute, Some(attribute_path("api_key")));
        assert_eq!(attributed.summary, "Missing Fluence API ApiKey");
    }
}
