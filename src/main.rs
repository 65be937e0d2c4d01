use eyre::WrapErr;
use gckms::config::{BackendKind, Config};
use gckms::{iam, telemetry, CancellationToken, KmsFacade, RemoteBackend};
use tokio::time::Instant;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = Config::from_env()?;
    telemetry::init_telemetry(&config.log_level, config.log_format)?;
    tracing::debug!(?config, "configuration loaded");

    let start_time = Instant::now();
    let facade = build_facade(&config).await?;
    tracing::info!(
        backend = facade.backend_name(),
        "Facade ready in {:?}",
        start_time.elapsed()
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    match (&config.project_id, &config.location_id) {
        (Some(project_id), Some(location_id)) => {
            list_hierarchy(&facade, &cancel, project_id, location_id).await?
        }
        _ => tracing::info!("GCKMS_PROJECT_ID / GCKMS_LOCATION_ID not set, nothing to list"),
    }

    Ok(())
}

async fn build_facade(config: &Config) -> eyre::Result<KmsFacade> {
    let facade = match config.backend {
        BackendKind::Mock => KmsFacade::mock(),
        BackendKind::Remote => {
            let token = match (&config.access_token, &config.credentials_path) {
                (Some(token), _) => token.clone(),
                (None, Some(path)) => {
                    let account = iam::load_iam_json(path)?;
                    let client = reqwest::Client::builder()
                        .timeout(config.request_timeout())
                        .build()?;
                    iam::get_oauth2_token(&client, &account)
                        .await
                        .wrap_err("could not obtain an access token")?
                }
                (None, None) => eyre::bail!("no credentials configured"),
            };

            let client = iam::bearer_client(&token, config.request_timeout())?;
            KmsFacade::remote(
                RemoteBackend::new_with_client(client).with_endpoint(&config.kms_endpoint),
            )
        }
    };

    Ok(match config.call_deadline() {
        Some(deadline) => facade.with_deadline(deadline),
        None => facade,
    })
}

/// Walk key rings and their keys under one location.
async fn list_hierarchy(
    facade: &KmsFacade,
    cancel: &CancellationToken,
    project_id: &str,
    location_id: &str,
) -> eyre::Result<()> {
    let time_1 = Instant::now();
    let key_rings = facade.list_key_rings(cancel, project_id, location_id).await?;
    tracing::info!(count = key_rings.len(), "Key rings listed in {:?}", time_1.elapsed());

    for key_ring in &key_rings {
        let ring = key_ring.rsplit('/').next().unwrap_or(key_ring.as_str());
        let keys = facade.list_keys(cancel, project_id, location_id, ring).await?;
        tracing::info!(key_ring = %key_ring, keys = ?keys, "Listed keys");
    }
    Ok(())
}
