//! Reaching the database behind one pod.
//!
//! Shared by the per-pod database commands: find the service's secret,
//! forward the database port and wait until the shell can ping through the
//! tunnel.

use cutover_connect::{TunnelHandle, establish_and_probe};
use cutover_extract::text::single_line;
use cutover_extract::{MongoSecret, pod_to_service_name};

use crate::client::{KubectlClient, MongoClient};
use crate::error::CliError;
use crate::settings::Context;

/// Row note when the tunnel never became usable.
pub const UNREACHABLE: &str = "Can't port-forward or access database.";

/// Row note when no secret matches the pod's service.
pub const NO_SECRET: &str = "No database secret found for service.";

/// A live tunnel to one pod's database and the credentials for it.
#[derive(Debug)]
pub(crate) struct PodDatabase {
    pub tunnel: TunnelHandle,
    pub host: String,
    pub secret: MongoSecret,
}

impl PodDatabase {
    /// Open the database of `pod`. `None` when no secret in `secrets`
    /// contains the pod's service name.
    pub(crate) async fn open(
        context: &Context,
        kubectl: &KubectlClient,
        mongo: &MongoClient,
        pod: &str,
        secrets: &[String],
    ) -> Result<Option<Self>, CliError> {
        let Some(secret_name) = pod_to_service_name(pod)
            .and_then(|service| secrets.iter().find(|secret| secret.contains(service.as_str())))
        else {
            return Ok(None);
        };
        let secret = MongoSecret::from_payload(&kubectl.secret(secret_name).await?)?;

        let host = context.network.forwarded_database_host();
        let tunnel = kubectl.port_forward(pod, &context.network);
        let tunnel = establish_and_probe(tunnel, &context.retry, |_| {
            let mongo = mongo.clone();
            let host = host.clone();
            let secret = secret.clone();
            async move { mongo.is_up(&host, &secret).await }
        })
        .await?;

        Ok(Some(Self { tunnel, host, secret }))
    }

    /// Stop the tunnel.
    pub(crate) async fn close(self) {
        self.tunnel.close().await;
    }
}

/// Note for a pod whose database could not be inspected.
pub(crate) fn failure_note(error: &CliError) -> String {
    match error {
        CliError::Connect(_) => UNREACHABLE.to_string(),
        other => single_line(&other.to_string()),
    }
}
