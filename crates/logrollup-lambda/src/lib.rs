// AWS Lambda runtime adapter
//
// Runs one rollup per invocation. The event payload may carry a debug flag
// list, either as a bare JSON string ("keep:dryrun") or as the `debug` field
// of an object. The response is the JSON run summary.

use anyhow::{Context, Result};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use logrollup::{init_store, init_tracing, run_containers, run_rollup};
use logrollup_config::RuntimeConfig;
use logrollup_core::{ObjectStore, OpenDalStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// State built once per cold start
struct LambdaState {
    store: OpenDalStore,
}

impl LambdaState {
    /// The cold-start store, or a fresh one when this invocation names a
    /// container it does not serve.
    fn store_for(&self, config: &RuntimeConfig) -> Result<OpenDalStore> {
        let containers = run_containers(config)?;
        let served: Vec<&str> = self.store.containers().collect();
        if containers.iter().all(|c| served.contains(&c.as_str())) {
            Ok(self.store.clone())
        } else {
            init_store(config)
        }
    }
}

/// Debug flag list carried by the event, if any
pub fn debug_flags(payload: &Value) -> Option<&str> {
    match payload {
        Value::String(flags) => Some(flags),
        Value::Object(fields) => fields.get("debug").and_then(Value::as_str),
        _ => None,
    }
}

/// Layer the event's debug flags over `base` and validate the result.
pub fn resolve_config(mut base: RuntimeConfig, payload: &Value) -> Result<RuntimeConfig> {
    if let Some(flags) = debug_flags(payload) {
        info!(flags = %flags, "Applying debug flags from event");
        base.apply_debug_flags(flags);
    }
    base.validate().context("Invalid configuration")?;
    Ok(base)
}

/// Run one rollup and render the summary as the invocation response.
pub async fn rollup_response(store: &dyn ObjectStore, config: &RuntimeConfig) -> Result<Value> {
    let summary = run_rollup(store, config).await?;
    serde_json::to_value(&summary).context("Failed to render run summary")
}

async fn handle_request(event: LambdaEvent<Value>, state: Arc<LambdaState>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, "Rollup invocation");

    // Reloaded per invocation so debug flags never carry over
    let base = RuntimeConfig::load_or_default().context("Failed to load configuration")?;
    let config = resolve_config(base, &payload)?;
    let store = state.store_for(&config)?;

    let response = rollup_response(&store, &config).await?;
    Ok(response)
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);
    info!("Lambda runtime - using lambda_runtime's tokio + OpenDAL");

    // OpenDAL discovers AWS credentials from the IAM role, env or profile
    let store = init_store(&config).context("Failed to initialize storage")?;
    let state = Arc::new(LambdaState { store });

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let state = state.clone();
        async move { handle_request(event, state).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use logrollup_config::Platform;
    use logrollup_core::opendal::{services, Operator};
    use logrollup_core::{RetryPolicy, StoreLocation};
    use serde_json::json;

    fn base_config() -> RuntimeConfig {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        config.rollup.source = "s3://logs/raw".to_string();
        config.rollup.dest = "s3://logs/rolled".to_string();
        config
    }

    async fn memory_store() -> OpenDalStore {
        let op = Operator::new(services::Memory::default())
            .expect("Failed to create memory operator")
            .finish();
        let store = OpenDalStore::new(RetryPolicy::none()).with_container("logs", op);
        store
            .put(
                &StoreLocation::new("logs", "raw/2024-01-15-09-3xyz.log"),
                b"ab".to_vec().into(),
            )
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_debug_flags_from_event() {
        assert_eq!(debug_flags(&json!("keep:dryrun")), Some("keep:dryrun"));
        assert_eq!(debug_flags(&json!({"debug": "overwrite"})), Some("overwrite"));
        assert_eq!(debug_flags(&json!({"debug": 1})), None);
        assert_eq!(debug_flags(&json!({})), None);
        assert_eq!(debug_flags(&Value::Null), None);
        assert_eq!(debug_flags(&json!(["keep"])), None);
    }

    #[test]
    fn test_resolve_config_applies_flags_and_validates() {
        let config = resolve_config(base_config(), &json!("keep:dryrun")).unwrap();
        assert!(config.policy.keep);
        assert!(config.policy.dryrun);
        assert!(!config.policy.overwrite);

        let mut missing = base_config();
        missing.rollup.dest = String::new();
        assert!(resolve_config(missing, &Value::Null).is_err());
    }

    #[test]
    fn test_flags_do_not_leak_between_invocations() {
        let base = base_config();
        let first = resolve_config(base.clone(), &json!("dryrun")).unwrap();
        let second = resolve_config(base, &json!({})).unwrap();
        assert!(first.policy.dryrun);
        assert!(!second.policy.dryrun);
    }

    #[test]
    fn test_store_for_reuses_cold_start_store() {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        let state = LambdaState {
            store: OpenDalStore::new(RetryPolicy::none()).with_container("logs", op),
        };
        let store = state.store_for(&base_config()).unwrap();
        assert_eq!(store.containers().collect::<Vec<_>>(), vec!["logs"]);
    }

    #[tokio::test]
    async fn test_rollup_response_returns_summary() {
        let store = memory_store().await;

        let dryrun = resolve_config(base_config(), &json!({"debug": "dryrun"})).unwrap();
        let response = rollup_response(&store, &dryrun).await.unwrap();
        assert_eq!(response["dryrun"], json!(true));
        assert_eq!(response["objects_processed"], json!(1));
        assert_eq!(response["groups_written"], json!(0));

        let config = resolve_config(base_config(), &Value::Null).unwrap();
        let response = rollup_response(&store, &config).await.unwrap();
        assert_eq!(response["groups_written"], json!(1));
        assert_eq!(
            response["outcomes"][0]["destination"],
            json!({"container": "logs", "path": "rolled/2024-01-15-09-30"})
        );

        let rolled = store
            .get(&StoreLocation::new("logs", "rolled/2024-01-15-09-30"))
            .await
            .unwrap();
        assert_eq!(&rolled[..], b"ab");
    }
}
