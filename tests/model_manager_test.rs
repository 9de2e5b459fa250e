use std::fs;
use std::sync::Arc;

use env_logger::Env;
use tagclass::{
    ErrorKind, ModelError, ModelManager, ModelState, SvmClassifier, TextClassifier,
    VectorizerConfig,
};
use tempfile::TempDir;

fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn demo_data() -> (Vec<String>, Vec<String>) {
    (
        strings(&["buy now", "cheap offer", "meeting at noon", "project deadline"]),
        strings(&["spam", "spam", "ham", "ham"]),
    )
}

fn trained_demo() -> Result<SvmClassifier, Box<dyn std::error::Error>> {
    let (documents, labels) = demo_data();
    let mut classifier = SvmClassifier::new();
    classifier.train(&documents, &labels, &VectorizerConfig::default())?;
    Ok(classifier)
}

fn setup() -> Result<(TempDir, ModelManager), Box<dyn std::error::Error>> {
    init();
    let dir = TempDir::new()?;
    let manager = ModelManager::new(dir.path())?;
    Ok((dir, manager))
}

#[tokio::test]
async fn test_never_saved_type() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;

    assert!(!manager.is_available("ghost"));
    assert_eq!(manager.status("ghost").await, ModelState::Absent);
    assert!(matches!(
        manager.load("ghost", false).await,
        Err(ModelError::ArtifactNotFound(_))
    ));
    assert!(matches!(
        manager.get_model_info("ghost").await,
        Err(ModelError::ArtifactNotFound(_))
    ));
    assert!(!manager.delete("ghost").await?);
    assert!(manager.list_available().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_demo_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;
    let classifier = trained_demo()?;

    manager.save(Arc::new(classifier), "demo").await?;
    assert!(manager.is_available("demo"));

    let loaded = manager.load("demo", false).await?;
    let prediction = loaded.predict("cheap meeting")?;
    assert!(["spam", "ham"].contains(&prediction.label.as_str()));
    assert!((0.0..=1.0).contains(&prediction.confidence));
    assert_eq!(prediction.model_used, "svm");

    let info = manager.get_model_info("demo").await?;
    assert_eq!(info.training_samples, 4);
    assert_eq!(info.num_classes, 2);
    assert_eq!(info.classes, strings(&["ham", "spam"]));

    assert!(manager.delete("demo").await?);
    assert!(!manager.is_available("demo"));
    assert!(matches!(
        manager.load("demo", false).await,
        Err(ModelError::ArtifactNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_save_caches_exact_instance() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;
    let classifier: Arc<dyn TextClassifier> = Arc::new(trained_demo()?);

    let location = manager.save(Arc::clone(&classifier), "demo").await?;
    assert!(location.starts_with(manager.models_dir()));
    assert_eq!(manager.status("demo").await, ModelState::Loaded);

    let cached = manager.load("demo", false).await?;
    assert!(Arc::ptr_eq(&cached, &classifier));
    Ok(())
}

#[tokio::test]
async fn test_round_trip_fidelity() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    let classifier = trained_demo()?;
    let probes = strings(&["cheap meeting", "buy a project", "noon offer", "unseen words"]);
    let expected = classifier.predict_batch(&probes)?;

    manager.save(Arc::new(classifier), "demo").await?;

    // A fresh manager has to deserialize from disk
    let fresh = ModelManager::new(dir.path())?;
    assert_eq!(fresh.status("demo").await, ModelState::Persisted);
    let loaded = fresh.load("demo", false).await?;
    assert_eq!(loaded.predict_batch(&probes)?, expected);
    Ok(())
}

#[tokio::test]
async fn test_load_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;

    let manager = ModelManager::new(dir.path())?;
    let first = manager.load("demo", false).await?;
    let second = manager.load("demo", false).await?;
    assert!(Arc::ptr_eq(&first, &second));

    let reloaded = manager.load("demo", true).await?;
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(
        first.predict("cheap meeting")?,
        reloaded.predict("cheap meeting")?
    );

    // The reloaded instance replaced the old one in the cache
    let third = manager.load("demo", false).await?;
    assert!(Arc::ptr_eq(&third, &reloaded));
    assert_eq!(manager.loaded_models().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_train_leaves_entry_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;
    let (documents, labels) = demo_data();
    let before = manager
        .train("demo", "svm", documents, labels, VectorizerConfig::default())
        .await?;
    let cached = manager.load("demo", false).await?;

    let err = manager
        .train(
            "demo",
            "svm",
            strings(&["one", "two", "three"]),
            strings(&["a", "b"]),
            VectorizerConfig::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TrainingError);

    assert!(Arc::ptr_eq(&manager.load("demo", false).await?, &cached));
    assert_eq!(manager.get_model_info("demo").await?, before);

    let fresh = ModelManager::new(manager.models_dir())?;
    assert_eq!(fresh.get_model_info("demo").await?, before);
    Ok(())
}

#[tokio::test]
async fn test_save_untrained_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;
    let result = manager.save(Arc::new(SvmClassifier::new()), "empty").await;
    assert!(matches!(result, Err(ModelError::NotTrained(_))));
    assert!(!manager.is_available("empty"));
    assert_eq!(manager.status("empty").await, ModelState::Absent);
    Ok(())
}

#[tokio::test]
async fn test_logical_type_reloads_with_recorded_algorithm() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    let (documents, labels) = demo_data();
    manager
        .train("support-tickets", "logistic", documents, labels, VectorizerConfig::default())
        .await?;

    let fresh = ModelManager::new(dir.path())?;
    let loaded = fresh.load("support-tickets", false).await?;
    assert_eq!(loaded.algorithm(), "logistic");
    assert_eq!(loaded.predict("cheap offer")?.model_used, "logistic");
    Ok(())
}

#[tokio::test]
async fn test_get_model_info_does_not_load() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;

    let fresh = ModelManager::new(dir.path())?;
    let info = fresh.get_model_info("demo").await?;
    assert_eq!(info.algorithm, "svm");
    assert!(!fresh.is_loaded("demo").await);
    Ok(())
}

#[tokio::test]
async fn test_list_available_ignores_incomplete_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;
    manager.save(Arc::new(trained_demo()?), "backup").await?;

    fs::create_dir_all(dir.path().join("partial"))?;
    fs::write(dir.path().join("partial").join("model.json"), b"{}")?;

    let available: Vec<String> = manager.list_available().await?.into_iter().collect();
    assert_eq!(available, strings(&["backup", "demo"]));
    assert!(!manager.is_available("partial"));
    assert!(matches!(
        manager.load("partial", false).await,
        Err(ModelError::ArtifactNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_tampered_artifact_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;

    let model_file = dir.path().join("demo").join("model.json");
    let mut bytes = fs::read(&model_file)?;
    bytes.extend_from_slice(b" ");
    fs::write(&model_file, bytes)?;

    let fresh = ModelManager::new(dir.path())?;
    let err = fresh.load("demo", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactCorrupt);
    assert!(!fresh.is_loaded("demo").await);
    Ok(())
}

#[tokio::test]
async fn test_inconsistent_parts_without_checksums_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;

    let location = dir.path().join("demo");
    let mut vectorizer: serde_json::Value = serde_json::from_slice(&fs::read(location.join("vectorizer.json"))?)?;
    vectorizer["vocabulary"]["zzword"] = serde_json::Value::from(999);
    fs::write(location.join("vectorizer.json"), serde_json::to_vec(&vectorizer)?)?;
    let mut metadata: serde_json::Value = serde_json::from_slice(&fs::read(location.join("metadata.json"))?)?;
    if let Some(fields) = metadata.as_object_mut() {
        fields.remove("checksums");
    }
    fs::write(location.join("metadata.json"), serde_json::to_vec(&metadata)?)?;

    let fresh = ModelManager::new(dir.path())?;
    let err = fresh.load("demo", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactCorrupt);
    assert!(!fresh.is_loaded("demo").await);

    // The manager that wrote it keeps serving its cached instance
    let cached = manager.load("demo", false).await?;
    assert_eq!(cached.predict("cheap offer")?.label, "spam");
    Ok(())
}

#[tokio::test]
async fn test_delete_evicts_cache_only_entry() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, manager) = setup()?;
    manager.save(Arc::new(trained_demo()?), "demo").await?;

    // Artifact removed behind the manager's back; the cached entry still counts
    fs::remove_dir_all(dir.path().join("demo"))?;
    assert!(manager.is_loaded("demo").await);
    assert!(manager.delete("demo").await?);
    assert!(!manager.is_loaded("demo").await);
    assert!(!manager.delete("demo").await?);
    Ok(())
}

#[test]
fn test_blocking_callers() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, manager) = setup()?;
    let (documents, labels) = demo_data();

    let metadata = tokio_test::block_on(manager.train(
        "demo",
        "centroid",
        documents,
        labels,
        VectorizerConfig::default(),
    ))?;
    assert_eq!(metadata.algorithm, "centroid");
    assert!(tokio_test::block_on(manager.is_loaded("demo")));
    Ok(())
}
