use crate::config::StoreConfig;
use crate::object_store::StoreClient;
use tracing::{error, info};

/// Ensure the configured buckets exist before serving traffic
///
/// Bootstrap failures are logged and swallowed so the gateway still comes up
/// when the store is temporarily unreachable or the credentials lack bucket
/// creation rights. Requests against a missing bucket fail per-call instead.
pub async fn ensure_buckets(client: &StoreClient, store: &StoreConfig) {
    if store.skip_bucket_check {
        info!("Bucket bootstrap skipped by configuration");
        return;
    }

    ensure_bucket(client, &store.upload_bucket).await;

    let presign_bucket = store.presign_bucket();
    if presign_bucket != store.upload_bucket {
        ensure_bucket(client, presign_bucket).await;
    }
}

async fn ensure_bucket(client: &StoreClient, bucket: &str) {
    match client.bucket_exists(bucket).await {
        Ok(true) => {
            info!(bucket = %bucket, "Bucket already exists");
        }
        Ok(false) => match client.create_bucket(bucket).await {
            Ok(()) => {}
            Err(e) => {
                error!(bucket = %bucket, error = %e, "Bucket creation failed");
            }
        },
        Err(e) => {
            error!(bucket = %bucket, error = %e, "Bucket existence check failed");
        }
    }
}
