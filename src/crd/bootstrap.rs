//! CRD registration for VolumeSnapshotRestore
//!
//! Run once at startup. A discovery probe of the apiextensions group decides
//! between the v1 typed registration and the legacy v1beta1 dynamic one;
//! both block until the CRD is observably established, bounded by a fixed
//! timeout.

use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{ApiResource, DynamicObject, GroupVersionKind, PostParams},
    runtime::{conditions, wait::await_condition},
    Api, Client, CustomResourceExt,
};
use tracing::{debug, info};

use crate::crd::VolumeSnapshotRestore;
use crate::error::{Error, Result};

const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";
const VALIDATE_CRD_TIMEOUT: Duration = Duration::from_secs(60);
const VALIDATE_CRD_INTERVAL: Duration = Duration::from_secs(5);

/// Register the VolumeSnapshotRestore CRD and wait for it to be established
pub async fn register(client: &Client) -> Result<()> {
    let group = kube::discovery::group(client, APIEXTENSIONS_GROUP).await?;
    let preferred = group.preferred_version_or_latest();
    debug!(version = preferred, "Probed apiextensions capability");

    if preferred == "v1beta1" {
        register_v1beta1(client).await
    } else {
        register_v1(client).await
    }
}

async fn register_v1(client: &Client) -> Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let crd = VolumeSnapshotRestore::crd();
    let name = VolumeSnapshotRestore::crd_name();

    match api.create(&PostParams::default(), &crd).await {
        Ok(_) => info!(crd = name, "Created CRD"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            debug!(crd = name, "CRD already exists");
        }
        Err(e) => return Err(e.into()),
    }

    let establish = await_condition(api, name, conditions::is_crd_established());
    tokio::time::timeout(VALIDATE_CRD_TIMEOUT, establish)
        .await
        .map_err(|_| {
            Error::validation(format!("timed out waiting for CRD {} to be established", name))
        })??;

    info!(crd = name, "CRD established");
    Ok(())
}

/// Legacy registration path for clusters that only serve apiextensions
/// v1beta1, driven through a dynamic object since the typed API no longer
/// carries that version.
async fn register_v1beta1(client: &Client) -> Result<()> {
    let gvk = GroupVersionKind::gvk(APIEXTENSIONS_GROUP, "v1beta1", "CustomResourceDefinition");
    let ar = ApiResource::from_gvk(&gvk);
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &ar);
    let name = VolumeSnapshotRestore::crd_name();

    let mut crd = DynamicObject::new(name, &ar);
    crd.data = serde_json::json!({
        "spec": {
            "group": "storage.oso.sh",
            "version": "v1alpha1",
            "versions": [{"name": "v1alpha1", "served": true, "storage": true}],
            "scope": "Namespaced",
            "names": {
                "plural": "volumesnapshotrestores",
                "singular": "volumesnapshotrestore",
                "kind": "VolumeSnapshotRestore",
                "shortNames": ["vsr"],
            },
            "subresources": {"status": {}},
        }
    });

    match api.create(&PostParams::default(), &crd).await {
        Ok(_) => info!(crd = name, "Created CRD (v1beta1)"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            debug!(crd = name, "CRD already exists");
        }
        Err(e) => return Err(e.into()),
    }

    let deadline = tokio::time::Instant::now() + VALIDATE_CRD_TIMEOUT;
    loop {
        let obj = api.get(name).await?;
        if crd_established(&obj) {
            info!(crd = name, "CRD established");
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::validation(format!(
                "timed out waiting for CRD {} to be established",
                name
            )));
        }
        tokio::time::sleep(VALIDATE_CRD_INTERVAL).await;
    }
}

fn crd_established(obj: &DynamicObject) -> bool {
    obj.data["status"]["conditions"]
        .as_array()
        .map(|conds| {
            conds
                .iter()
                .any(|c| c["type"] == "Established" && c["status"] == "True")
        })
        .unwrap_or(false)
}
