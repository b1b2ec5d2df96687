//! Compute Engine emulation through the injected client

mod common;

use mockcloud::google::{self, ComputeClient};
use mockcloud::{EmulatorConfig, VirtualCloud};
use serde_json::{json, Value};

fn compute() -> (VirtualCloud, ComputeClient) {
    common::init_tracing();
    let cloud = VirtualCloud::new(EmulatorConfig::default()).unwrap();
    let compute = ComputeClient::with_transport(google::emulator(&cloud));
    (cloud, compute)
}

async fn insert(compute: &ComputeClient, project: &str, zone: &str, name: &str) -> Value {
    compute
        .instances()
        .insert(project, zone, json!({"name": name}))
        .execute()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_list_empty_zone_is_empty_object() {
    let (_cloud, compute) = compute();

    let body = compute.instances().list("foo", "bar").execute().await.unwrap();

    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_insert_then_get_matches_list() {
    let (_cloud, compute) = compute();

    let operation = insert(&compute, "foo", "bar", "vm1").await;
    assert_eq!(operation["kind"], "compute#operation");
    assert_eq!(operation["status"], "DONE");
    assert_eq!(operation["operationType"], "insert");

    let listed = compute.instances().list("foo", "bar").execute().await.unwrap();
    let fetched = compute
        .instances()
        .get("foo", "bar", "vm1")
        .execute()
        .await
        .unwrap();

    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
    assert_eq!(listed["items"][0], fetched);
    assert_eq!(fetched["name"], "vm1");
    assert_eq!(fetched["zone"], "bar");
    assert_eq!(fetched["status"], "RUNNING");
    assert_eq!(fetched["tags"], json!({}));
    assert_eq!(fetched["networkInterfaces"][0]["networkIP"], "10.0.0.2");
    assert_eq!(operation["targetId"], fetched["id"]);
}

#[tokio::test]
async fn test_caller_fields_are_echoed() {
    let (_cloud, compute) = compute();

    compute
        .instances()
        .insert(
            "foo",
            "bar",
            json!({
                "name": "vm1",
                "machineType": "zones/bar/machineTypes/n1-standard-1",
                "labels": {"env": "test"},
                "status": "TERMINATED"
            }),
        )
        .execute()
        .await
        .unwrap();

    let fetched = compute
        .instances()
        .get("foo", "bar", "vm1")
        .execute()
        .await
        .unwrap();
    assert_eq!(fetched["machineType"], "zones/bar/machineTypes/n1-standard-1");
    assert_eq!(fetched["labels"]["env"], "test");
    assert_eq!(fetched["status"], "RUNNING");
}

#[tokio::test]
async fn test_get_missing_instance_is_not_found() {
    let (_cloud, compute) = compute();

    let err = compute
        .instances()
        .get("foo", "bar", "nope")
        .execute()
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.code(), Some("notFound"));
}

#[tokio::test]
async fn test_duplicate_insert_conflicts() {
    let (_cloud, compute) = compute();
    insert(&compute, "foo", "bar", "vm1").await;

    let err = compute
        .instances()
        .insert("foo", "bar", json!({"name": "vm1"}))
        .execute()
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(err.code(), Some("alreadyExists"));
}

#[tokio::test]
async fn test_delete_is_unsupported() {
    let (_cloud, compute) = compute();
    insert(&compute, "foo", "bar", "vm1").await;

    let err = compute
        .instances()
        .delete("foo", "bar", "vm1")
        .execute()
        .await
        .unwrap_err();

    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_scopes_are_isolated() {
    let (cloud, compute) = compute();
    insert(&compute, "foo", "bar", "vm1").await;
    insert(&compute, "foo", "baz", "vm1").await;

    let other_zone = compute.instances().list("foo", "qux").execute().await.unwrap();
    assert_eq!(other_zone, json!({}));

    let other_project = compute.instances().list("other", "bar").execute().await.unwrap();
    assert_eq!(other_project, json!({}));

    assert_eq!(cloud.instances(&mockcloud::Scope::google("foo", "baz")).len(), 1);
}

#[tokio::test]
async fn test_list_filter_by_name() {
    let (_cloud, compute) = compute();
    for name in ["foo1", "foo2", "foo3"] {
        insert(&compute, "foo", "bar", name).await;
    }

    let body = compute
        .instances()
        .list("foo", "bar")
        .filter("name=foo2")
        .execute()
        .await
        .unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "foo2");

    let body = compute
        .instances()
        .list("foo", "bar")
        .filter("name~^foo[12]$ AND status=RUNNING")
        .execute()
        .await
        .unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let body = compute
        .instances()
        .list("foo", "bar")
        .filter("name=nothing")
        .execute()
        .await
        .unwrap();
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_malformed_filter_is_rejected() {
    let (_cloud, compute) = compute();

    let err = compute
        .instances()
        .list("foo", "bar")
        .filter("name=(foo")
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_list_pages_follow_next_page_token() {
    let (_cloud, compute) = compute();
    for name in ["vm1", "vm2", "vm3"] {
        insert(&compute, "foo", "bar", name).await;
    }

    let first = compute
        .instances()
        .list("foo", "bar")
        .max_results(2)
        .execute()
        .await
        .unwrap();
    assert_eq!(first["items"].as_array().unwrap().len(), 2);
    let token = first["nextPageToken"].as_str().unwrap();

    let second = compute
        .instances()
        .list("foo", "bar")
        .max_results(2)
        .page_token(token)
        .execute()
        .await
        .unwrap();
    assert_eq!(second["items"][0]["name"], "vm3");
    assert!(second.get("nextPageToken").is_none());

    let all = compute.instances().list_all("foo", "bar", None).await.unwrap();
    let names: Vec<&str> = all.iter().filter_map(|i| i["name"].as_str()).collect();
    assert_eq!(names, vec!["vm1", "vm2", "vm3"]);
}

#[tokio::test]
async fn test_machine_types() {
    let (_cloud, compute) = compute();

    let listed = compute
        .machine_types()
        .list("foo", "bar")
        .execute()
        .await
        .unwrap();
    let items = listed["items"].as_array().unwrap();
    assert!(items.len() >= 2);
    assert!(items.iter().all(|item| item["zone"] == "bar"));

    let filtered = compute
        .machine_types()
        .list("foo", "bar")
        .filter("name=n1-standard-1")
        .execute()
        .await
        .unwrap();
    assert_eq!(filtered["items"].as_array().unwrap().len(), 1);

    let fetched = compute
        .machine_types()
        .get("foo", "bar", "n1-standard-1")
        .execute()
        .await
        .unwrap();
    assert_eq!(fetched["guestCpus"], 1);
    assert_eq!(fetched["imageSpaceGb"], 10);
    assert!(fetched["imageSpaceGb"].is_u64());
    assert_eq!(fetched["kind"], "compute#machineType");

    let err = compute
        .machine_types()
        .get("foo", "bar", "n9-imaginary")
        .execute()
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_requested_network_ip_is_validated() {
    let (cloud, compute) = compute();
    let body = |name: &str, ip: &str| {
        json!({"name": name, "networkInterfaces": [{"networkIP": ip}]})
    };
    compute
        .instances()
        .insert("foo", "bar", body("vm1", "10.0.0.7"))
        .execute()
        .await
        .unwrap();

    for (name, ip) in [("vm2", "10.0.0.7"), ("vm3", "192.168.9.9")] {
        let err = compute
            .instances()
            .insert("foo", "bar", body(name, ip))
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
    assert_eq!(cloud.instances(&mockcloud::Scope::google("foo", "bar")).len(), 1);
}
