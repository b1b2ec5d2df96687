//! Azure compute emulation through the injected client

mod common;

use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use mockcloud::azure::{self, ComputeManagementClient, OsProfile, VirtualMachine};
use mockcloud::transport::Method;
use mockcloud::{ApiRequest, ApiResponse, EmulatorConfig, Transport, VirtualCloud};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Counts the calls that reach the wrapped transport
struct Counting {
    inner: Arc<dyn Transport>,
    calls: AtomicUsize,
}

impl Transport for Counting {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, mockcloud::Result<ApiResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send(request)
    }
}

fn client_with(config: EmulatorConfig) -> (VirtualCloud, ComputeManagementClient) {
    common::init_tracing();
    let cloud = VirtualCloud::new(config).unwrap();
    let client = ComputeManagementClient::with_transport("sub", azure::emulator(&cloud));
    (cloud, client)
}

fn client() -> (VirtualCloud, ComputeManagementClient) {
    client_with(EmulatorConfig::default())
}

async fn create(client: &ComputeManagementClient, group: &str, name: &str) -> VirtualMachine {
    client
        .virtual_machines()
        .begin_create_or_update(
            group,
            name,
            VirtualMachine::new("eastus").with_hardware_profile("Standard_B1s"),
        )
        .await
        .unwrap()
        .result()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_list_empty_group() {
    let (_cloud, client) = client();

    let vms: Vec<VirtualMachine> =
        client.virtual_machines().list("group").try_collect().await.unwrap();

    assert!(vms.is_empty());
}

#[tokio::test]
async fn test_create_get_and_list_agree() {
    let (_cloud, client) = client();

    let created = create(&client, "group", "vm1").await;
    let fetched = client.virtual_machines().get("group", "vm1").await.unwrap();
    let listed: Vec<VirtualMachine> =
        client.virtual_machines().list("group").try_collect().await.unwrap();

    assert_eq!(created, fetched);
    assert_eq!(listed, vec![fetched.clone()]);

    assert_eq!(fetched.name.as_deref(), Some("vm1"));
    assert_eq!(fetched.location, "eastus");
    assert_eq!(fetched.resource_type.as_deref(), Some("Microsoft.Compute/virtualMachines"));
    assert_eq!(
        fetched.id.as_deref(),
        Some(concat!(
            "/subscriptions/sub/resourceGroups/group",
            "/providers/Microsoft.Compute/virtualMachines/vm1"
        ))
    );
    assert_eq!(fetched.provisioning_state(), Some("Succeeded"));

    let properties = fetched.properties.unwrap();
    assert!(properties.vm_id.is_some());
    assert_eq!(
        properties.hardware_profile.unwrap().vm_size.as_deref(),
        Some("Standard_B1s")
    );
}

#[tokio::test]
async fn test_create_finishes_without_polling() {
    let (_cloud, client) = client();

    let poller = client
        .virtual_machines()
        .begin_create_or_update("group", "vm1", VirtualMachine::new("eastus"))
        .await
        .unwrap();

    assert!(poller.is_done());
}

#[tokio::test]
async fn test_admin_password_is_not_returned() {
    let (_cloud, client) = client();
    let parameters = VirtualMachine::new("eastus").with_os_profile(OsProfile {
        computer_name: Some("vm1".to_string()),
        admin_username: Some("azureuser".to_string()),
        admin_password: Some("hunter2".to_string()),
        ..OsProfile::default()
    });

    client
        .virtual_machines()
        .begin_create_or_update("group", "vm1", parameters)
        .await
        .unwrap()
        .result()
        .await
        .unwrap();

    let fetched = client.virtual_machines().get("group", "vm1").await.unwrap();
    let os_profile = fetched.properties.unwrap().os_profile.unwrap();
    assert_eq!(os_profile.admin_username.as_deref(), Some("azureuser"));
    assert!(os_profile.admin_password.is_none());
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (_cloud, client) = client();

    let err = client.virtual_machines().get("group", "nope").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.code(), Some("ResourceNotFound"));
}

#[tokio::test]
async fn test_create_existing_name_conflicts() {
    let (_cloud, client) = client();
    create(&client, "group", "vm1").await;

    let result = client
        .virtual_machines()
        .begin_create_or_update("group", "vm1", VirtualMachine::new("westus"))
        .await;

    let err = result.err().unwrap();
    assert!(err.is_conflict());
    assert_eq!(err.code(), Some("Conflict"));
}

#[tokio::test]
async fn test_list_is_lazy() {
    common::init_tracing();
    let cloud = VirtualCloud::new(EmulatorConfig::default()).unwrap();
    let counting = Arc::new(Counting {
        inner: azure::emulator(&cloud),
        calls: AtomicUsize::new(0),
    });
    let client = ComputeManagementClient::with_transport("sub", counting.clone());

    let mut stream = client.virtual_machines().list("group");
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);

    assert!(stream.next().await.is_none());
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let config = EmulatorConfig {
        azure_page_size: 1,
        ..EmulatorConfig::default()
    };
    let (_cloud, client) = client_with(config);
    for name in ["vm1", "vm2", "vm3"] {
        create(&client, "group", name).await;
    }

    let vms: Vec<VirtualMachine> =
        client.virtual_machines().list("group").try_collect().await.unwrap();
    let names: Vec<&str> = vms.iter().filter_map(|vm| vm.name.as_deref()).collect();

    assert_eq!(names, vec!["vm1", "vm2", "vm3"]);
}

#[tokio::test]
async fn test_missing_api_version_is_rejected() {
    let cloud = VirtualCloud::new(EmulatorConfig::default()).unwrap();
    let transport = azure::emulator(&cloud);
    let url = Url::parse(
        concat!(
            "https://management.azure.com/subscriptions/sub/resourceGroups/group",
            "/providers/Microsoft.Compute/virtualMachines"
        ),
    )
    .unwrap();

    let response = transport.send(ApiRequest::new(Method::GET, url)).await.unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(
        response.body.unwrap()["error"]["code"],
        "MissingApiVersionParameter"
    );
}
