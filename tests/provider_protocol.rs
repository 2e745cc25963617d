//! End-to-end lifecycle of a `fluence_vm` through the `tfplugin6` provider
//! service, backed by the scripted API double.

use std::sync::Arc;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tonic::Request;

use terraform_provider_fluence::models::CreatedVm;
use terraform_provider_fluence::plugin::ProviderService;
use terraform_provider_fluence::plugin::dynamic::{decode, encode};
use terraform_provider_fluence::plugin::proto::tfplugin6::{
    DynamicValue, apply_resource_change, plan_resource_change, provider_server::Provider,
};
use terraform_provider_fluence::resources::vm;
use terraform_provider_fluence::test_support::{ApiCall, ScriptedApi, running_vm};
use terraform_provider_fluence::{FluenceProvider, framework::UNKNOWN_VALUE};

#[fixture]
fn api() -> ScriptedApi {
    ScriptedApi::new()
}

fn service(api: &ScriptedApi) -> ProviderService {
    ProviderService::new(FluenceProvider::with_api("test", Arc::new(api.clone())))
}

fn dynamic(value: &Value) -> Option<DynamicValue> {
    Some(encode(&vm::schema(), value).unwrap_or_else(|err| panic!("encode: {err}")))
}

fn value(dynamic: Option<&DynamicValue>) -> Value {
    decode(dynamic).unwrap_or_else(|err| panic!("decode: {err}"))
}

fn vm_config() -> Value {
    json!({
        "name": "web",
        "os_image": "https://images.example/ubuntu.qcow2",
        "ssh_keys": ["SHA256:abc"],
        "open_ports": [{"port": 22, "protocol": "tcp"}],
        "basic_configuration": "cpu-2-ram-4gb-storage-25gb",
        "datacenter_countries": ["FR"],
    })
}

async fn plan(service: &ProviderService, prior: &Value, config: &Value) -> plan_resource_change::Response {
    service
        .plan_resource_change(Request::new(plan_resource_change::Request {
            type_name: String::from(vm::TYPE_NAME),
            prior_state: dynamic(prior),
            proposed_new_state: dynamic(config),
            config: dynamic(config),
            ..Default::default()
        }))
        .await
        .unwrap_or_else(|status| panic!("plan: {status}"))
        .into_inner()
}

async fn apply(
    service: &ProviderService,
    prior: &Value,
    planned: &Value,
) -> apply_resource_change::Response {
    service
        .apply_resource_change(Request::new(apply_resource_change::Request {
            type_name: String::from(vm::TYPE_NAME),
            prior_state: dynamic(prior),
            planned_state: dynamic(planned),
            ..Default::default()
        }))
        .await
        .unwrap_or_else(|status| panic!("apply: {status}"))
        .into_inner()
}

#[rstest]
#[tokio::test]
async fn vm_lifecycle(api: ScriptedApi) {
    api.push_create_vms(Ok(vec![CreatedVm {
        vm_id: String::from("vm-1"),
        vm_name: String::from("web"),
    }]));
    api.push_list_vms(Ok(vec![running_vm("vm-1", "Active")]));
    let service = service(&api);

    let planned = plan(&service, &Value::Null, &vm_config()).await;
    let planned_state = value(planned.planned_state.as_ref());
    assert_eq!(planned_state.get("status"), Some(&json!(UNKNOWN_VALUE)));
    assert!(planned.requires_replace.is_empty());

    let applied = apply(&service, &Value::Null, &planned_state).await;
    assert!(applied.diagnostics.is_empty(), "{:?}", applied.diagnostics);
    let state = value(applied.new_state.as_ref());
    assert_eq!(state.get("id"), Some(&json!("vm-1")));
    assert_eq!(state.get("status"), Some(&json!("Active")));
    assert_eq!(state.get("public_ip"), Some(&json!("203.0.113.10")));
    assert_eq!(state.get("instances"), Some(&json!(1)));

    let Some(ApiCall::CreateVms(request)) = api.invocations().into_iter().next() else {
        panic!("expected a create call first");
    };
    let constraints = request.constraints.unwrap_or_default();
    assert_eq!(
        constraints.basic_configuration.as_deref(),
        Some("cpu-2-ram-4gb-storage-25gb")
    );
    assert_eq!(
        constraints.datacenter.map(|dc| dc.countries),
        Some(vec![String::from("FR")])
    );

    let destroyed = apply(&service, &state, &Value::Null).await;
    assert!(destroyed.diagnostics.is_empty());
    assert_eq!(value(destroyed.new_state.as_ref()), Value::Null);
    assert_eq!(
        api.invocations().last(),
        Some(&ApiCall::RemoveVms(vec![String::from("vm-1")]))
    );
}

#[rstest]
#[tokio::test]
async fn failed_activation_is_reported(api: ScriptedApi) {
    api.push_create_vms(Ok(vec![CreatedVm {
        vm_id: String::from("vm-1"),
        vm_name: String::new(),
    }]));
    api.push_list_vms(Ok(vec![running_vm("vm-1", "Failed")]));
    let service = service(&api);

    let response = apply(&service, &Value::Null, &vm_config()).await;

    assert!(response.new_state.is_none());
    let [diagnostic] = response.diagnostics.as_slice() else {
        panic!("expected one diagnostic, got {:?}", response.diagnostics);
    };
    assert_eq!(diagnostic.summary, "VM Creation Error");
    assert!(
        diagnostic
            .detail
            .contains("VM creation failed with status: Failed"),
        "detail: {}",
        diagnostic.detail
    );
}

#[rstest]
#[tokio::test]
async fn rename_updates_in_place(api: ScriptedApi) {
    api.push_list_vms(Ok(vec![running_vm("vm-1", "Active")]));
    let service = service(&api);
    let mut prior = vm_config();
    if let Some(fields) = prior.as_object_mut() {
        fields.insert(String::from("id"), json!("vm-1"));
        fields.insert(String::from("instances"), json!(1));
        fields.insert(String::from("status"), json!("Active"));
    }
    let mut config = vm_config();
    if let Some(fields) = config.as_object_mut() {
        fields.insert(String::from("name"), json!("web-renamed"));
    }

    let planned = plan(&service, &prior, &config).await;
    let planned_state = value(planned.planned_state.as_ref());
    assert_eq!(planned_state.get("instances"), Some(&json!(1)));
    assert!(planned.requires_replace.is_empty());

    let applied = apply(&service, &prior, &planned_state).await;

    let state = value(applied.new_state.as_ref());
    assert_eq!(state.get("status"), Some(&json!("Active")));
    assert_eq!(state.get("instances"), Some(&json!(1)));
    let Some(ApiCall::UpdateVms(updates)) = api.invocations().into_iter().next() else {
        panic!("expected an update call first");
    };
    let [update] = updates.as_slice() else {
        panic!("expected one update, got {updates:?}");
    };
    assert_eq!(update.vm_name.as_deref(), Some("web-renamed"));
    assert_eq!(update.open_ports.as_ref().map(Vec::len), Some(1));
}
