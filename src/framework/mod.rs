//! Minimal provider framework: attribute values, diagnostics, schemas, plan
//! computation and the traits resources and data sources implement.

mod diagnostics;
mod plan;
mod schema;
mod value;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use plan::{PlannedChange, plan_resource_change};
pub use schema::{Attribute, AttributeKind, PlanModifier, Schema};
pub use value::{AttrValue, UNKNOWN_VALUE};

/// Future returned by resource and data source operations.
pub type FrameworkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Diagnostics>> + Send + 'a>>;

/// Outcome of reading a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// The resource still exists; carries the refreshed state.
    Present(Value),
    /// The resource is gone and should be dropped from state.
    Removed,
}

/// A managed resource.
pub trait Resource: Send + Sync {
    /// Creates the resource from its planned state and returns the new state.
    fn create(&self, planned: Value) -> FrameworkFuture<'_, Value>;

    /// Refreshes the resource from the remote API.
    fn read(&self, state: Value) -> FrameworkFuture<'_, ReadOutcome>;

    /// Applies an in-place update and returns the new state.
    fn update(&self, prior: Value, planned: Value) -> FrameworkFuture<'_, Value>;

    /// Destroys the resource.
    fn delete(&self, state: Value) -> FrameworkFuture<'_, ()>;

    /// Seeds state for an import; the host follows up with a read.
    ///
    /// # Errors
    ///
    /// The default passthrough never fails.
    fn import_state(&self, id: &str) -> Result<Value, Diagnostics> {
        Ok(json!({ "id": id }))
    }
}

/// A read-only data source.
pub trait DataSource: Send + Sync {
    /// Reads the data source for the given configuration.
    fn read(&self, config: Value) -> FrameworkFuture<'_, Value>;
}

/// Decodes a JSON object into a typed model.
///
/// # Errors
///
/// Returns an error diagnostic when the value does not match the model.
pub fn decode_model<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, Diagnostics> {
    serde_json::from_value(value).map_err(|err| {
        Diagnostics::from(Diagnostic::error(
            "Invalid Attribute Value",
            format!("Unable to decode {what}: {err}"),
        ))
    })
}

/// Encodes a typed model back into a JSON object.
///
/// # Errors
///
/// Returns an error diagnostic when serialisation fails.
pub fn encode_model<T: Serialize>(model: &T) -> Result<Value, Diagnostics> {
    serde_json::to_value(model).map_err(|err| {
        Diagnostics::from(Diagnostic::error(
            "Internal Error",
            format!("Unable to encode state: {err}"),
        ))
    })
}
