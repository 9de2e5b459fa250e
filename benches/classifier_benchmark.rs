use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tagclass::{ClassifierFactory, ModelManager, TextClassifier, VectorizerConfig};

fn corpus() -> (Vec<String>, Vec<String>) {
    let topics = [
        ("billing", "invoice payment refund charge subscription plan"),
        ("bug", "crash error freeze update settings screen"),
        ("account", "password username email login profile address"),
    ];
    let mut documents = vec![];
    let mut labels = vec![];
    for i in 0..300 {
        let (label, words) = topics[i % topics.len()];
        let words: Vec<&str> = words.split(' ').collect();
        documents.push(format!(
            "ticket {} mentions {} and {} near {}",
            i,
            words[i % words.len()],
            words[(i / 3) % words.len()],
            words[(i / 7) % words.len()]
        ));
        labels.push(label.to_string());
    }
    (documents, labels)
}

fn trained(family: &str) -> Box<dyn TextClassifier> {
    let (documents, labels) = corpus();
    let mut classifier = ClassifierFactory::with_builtin().create(family).unwrap();
    classifier
        .train(&documents, &labels, &VectorizerConfig::default())
        .unwrap();
    classifier
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prediction");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    for family in ["svm", "logistic", "centroid"] {
        let classifier = trained(family);
        group.bench_function(family, |b| {
            b.iter(|| {
                classifier
                    .predict(black_box("the refund for my subscription shows an error"))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let (documents, labels) = corpus();
    let factory = ClassifierFactory::with_builtin();
    let mut group = c.benchmark_group("Training");
    group.sample_size(10);

    for family in ["svm", "logistic", "centroid"] {
        group.bench_function(family, |b| {
            b.iter(|| {
                let mut classifier = factory.create(family).unwrap();
                classifier
                    .train(black_box(&documents), &labels, &VectorizerConfig::default())
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let manager = ModelManager::new(dir.path()).unwrap();
    let (documents, labels) = corpus();
    runtime
        .block_on(manager.train("bench", "svm", documents, labels, VectorizerConfig::default()))
        .unwrap();

    c.bench_function("cached_load_and_predict", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let classifier = manager.load(black_box("bench"), false).await.unwrap();
                classifier.predict("password reset email").unwrap()
            })
        })
    });
}

criterion_group!(benches, bench_prediction, bench_training, bench_cache_hit);
criterion_main!(benches);
