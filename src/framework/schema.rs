//! Schema declarations for resources, data sources and the provider block.

use serde::Serialize;

/// Value type of an attribute.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "attributes", rename_all = "snake_case")]
pub enum AttributeKind {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// Boolean.
    Bool,
    /// List of strings.
    StringList,
    /// List of objects with the given attributes.
    ListNested(Vec<Attribute>),
    /// A single object with the given attributes.
    SingleNested(Vec<Attribute>),
}

/// Plan-time behaviour attached to an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Keep the prior state value instead of marking it unknown on update.
    UseStateForUnknown,
    /// Changing the value forces the resource to be replaced.
    RequiresReplace,
}

/// One attribute of a schema.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: &'static str,
    /// Value type.
    #[serde(flatten)]
    pub kind: AttributeKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Must be set in configuration.
    pub required: bool,
    /// May be set in configuration.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Hidden from plan output.
    pub sensitive: bool,
    /// Plan modifiers, applied in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    const fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            plan_modifiers: Vec::new(),
        }
    }

    /// A required attribute.
    #[must_use]
    pub const fn required(name: &'static str, kind: AttributeKind) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.required = true;
        attribute
    }

    /// An optional attribute.
    #[must_use]
    pub const fn optional(name: &'static str, kind: AttributeKind) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.optional = true;
        attribute
    }

    /// A computed, read-only attribute.
    #[must_use]
    pub const fn computed(name: &'static str, kind: AttributeKind) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.computed = true;
        attribute
    }

    /// An optional attribute the provider fills in when it is left unset.
    #[must_use]
    pub const fn optional_computed(name: &'static str, kind: AttributeKind) -> Self {
        let mut attribute = Self::new(name, kind);
        attribute.optional = true;
        attribute.computed = true;
        attribute
    }

    /// Sets the description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Marks the attribute as sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Adds the [`PlanModifier::UseStateForUnknown`] modifier.
    #[must_use]
    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }

    /// Adds the [`PlanModifier::RequiresReplace`] modifier.
    #[must_use]
    pub fn requires_replace(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::RequiresReplace);
        self
    }

    /// Returns `true` when configuration may set the attribute.
    #[must_use]
    pub const fn is_configurable(&self) -> bool {
        self.required || self.optional
    }

    /// Returns `true` when the attribute carries `modifier`.
    #[must_use]
    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }
}

/// Schema of a resource, data source or provider block.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Schema {
    /// Human-readable description.
    pub description: &'static str,
    /// Top-level attributes.
    pub attributes: Vec<Attribute>,
}

impl Schema {
    /// Creates a schema from its description and attributes.
    #[must_use]
    pub const fn new(description: &'static str, attributes: Vec<Attribute>) -> Self {
        Self {
            description,
            attributes,
        }
    }

    /// Looks up a top-level attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
    }
}
