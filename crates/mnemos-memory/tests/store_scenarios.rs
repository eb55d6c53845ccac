//! Cross-module scenarios for the memory tiers.

use mnemos_memory::episodic::{PatternOptions, TimelineOptions};
use mnemos_memory::{
    Episode, EpisodicConfig, EpisodicStore, Forgetter, Memory, SemanticConfig, SemanticStore,
    WorkingConfig, WorkingStore,
};
use mnemos_types::{ForgetOptions, ForgetStrategy, Metadata, RetrieveOptions};

#[tokio::test]
async fn facts_build_a_knowledge_graph() {
    let store = SemanticStore::new(SemanticConfig { extract_entities: true, ..Default::default() });

    let first = store
        .store(None, "Alice Smith works at Acme Corp.", Metadata::new())
        .await
        .unwrap();
    let second = store
        .store(None, "Alice Smith works at Acme Corp. She likes it.", Metadata::new())
        .await
        .unwrap();

    assert_eq!(store.entity_count().await, 2);
    assert_eq!(store.relation_count().await, 1);

    let alice = store.find_entity_by_name("alice smith").await.unwrap();
    assert_eq!(alice.frequency, 2);

    let relations = store.relations_of(&alice.id).await;
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].evidence, vec![first.clone(), second]);

    let related = store.get_related_entities(&alice.id, 2).await.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].entity.name, "Acme Corp");
    assert_eq!(related[0].depth, 1);

    // Deleting a fact leaves the graph in place.
    store.delete(&first).await.unwrap();
    assert_eq!(store.relation_count().await, 1);
}

#[tokio::test]
async fn a_session_reads_back_as_a_timeline() {
    let store = EpisodicStore::new(EpisodicConfig::default());
    for (i, content) in ["deploy started", "deploy failed on migration", "deploy retried"]
        .iter()
        .enumerate()
    {
        store
            .add_episode(
                Episode::new("deploy", *content)
                    .with_session("s-42")
                    .with_importance(0.3 + 0.2 * i as f32),
            )
            .await
            .unwrap();
    }
    store.add_episode(Episode::new("chat", "lunch?")).await.unwrap();

    let session = store.get_session_episodes("s-42").await;
    assert_eq!(session.len(), 3);
    assert_eq!(session[0].content, "deploy started");

    let patterns = store.find_patterns(&PatternOptions::default()).await;
    assert_eq!(patterns[0].token, "deploy");
    assert_eq!(patterns[0].frequency, 3);

    let timeline = store.get_timeline(&TimelineOptions::default()).await;
    assert_eq!(timeline.len(), 4);
    assert!(timeline.iter().all(|e| e.relative_time == "just now"));

    let top = store.get_most_important(1).await;
    assert_eq!(top[0].content, "deploy retried");
}

#[tokio::test]
async fn every_tier_forgets_through_the_shared_capability() {
    let working = WorkingStore::new(WorkingConfig::default());
    let episodic = EpisodicStore::new(EpisodicConfig::default());
    let semantic = SemanticStore::new(SemanticConfig::default());

    for i in 0..5 {
        let importance = i as f32 / 5.0;
        working
            .add_message_with_importance("user", &format!("message {i}"), importance)
            .await
            .unwrap();
        episodic
            .add_episode(Episode::new("event", format!("event {i}")).with_importance(importance))
            .await
            .unwrap();
        let meta = Metadata::from([("importance".to_string(), serde_json::json!(importance))]);
        semantic.store(None, &format!("fact {i}"), meta).await.unwrap();
    }

    let backends: [&dyn Memory; 3] = [&working, &episodic, &semantic];
    let opts = ForgetOptions { target_size: Some(2), ..Default::default() };
    for backend in backends {
        let forgetter: &dyn Forgetter = backend.forgetter().unwrap();
        assert_eq!(forgetter.forget(ForgetStrategy::Capacity, &opts).await.unwrap(), 3);
        assert_eq!(forgetter.forget(ForgetStrategy::Capacity, &opts).await.unwrap(), 0);
        assert_eq!(backend.stats().await.count, 2);

        let kept = backend.retrieve("", &RetrieveOptions::with_limit(0)).await.unwrap();
        assert!(kept.iter().all(|i| i.importance >= 0.6 - 1e-6));
    }
}
