//! Consolidation through the orchestrator, in the background and on demand.

mod common;

use common::{harness, turn, ScriptedCompletion};
use ctxmem_sdk::{ConsolidationRequest, ContentType, MemoryConfig, MemoryStateRequest, Role, SDKError};

fn eager() -> MemoryConfig {
    let mut config = MemoryConfig::default();
    config.consolidation.min_tokens = 5;
    config
}

#[tokio::test]
async fn test_background_consolidation_after_add() {
    let completion = ScriptedCompletion::new().reply("The user planned a trip to Lisbon in May.");
    let h = harness(eager(), Some(completion));

    h.memory
        .add_memory(turn("s1", "a1", Role::User, "I want to visit Lisbon in May"))
        .await
        .unwrap();
    h.memory.wait_for_background().await;
    h.memory
        .add_memory(turn("s1", "a1", Role::Assistant, "Lisbon is lovely in spring, I can help plan"))
        .await
        .unwrap();
    h.memory.wait_for_background().await;

    let found = h.memory.search_long_term("a1", "Lisbon trip", None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content_type, ContentType::Summary);
    assert_eq!(found[0].session_id.as_deref(), Some("s1"));

    // Consolidation leaves the buffer in place
    assert_eq!(h.memory.get_conversation("s1", "a1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_background_consolidation_respects_interval() {
    let completion = ScriptedCompletion::new()
        .reply("First summary.")
        .reply("Second summary.");
    let h = harness(eager(), Some(completion));

    for content in ["plan the sprint backlog", "review open pull requests", "write release notes"] {
        h.memory.add_memory(turn("s1", "a1", Role::User, content)).await.unwrap();
        h.memory.wait_for_background().await;
    }

    // The second add consolidated; the third is inside the interval
    assert_eq!(h.completion.as_ref().unwrap().call_count(), 1);
    assert_eq!(h.memory.long_term().get_memory_count("a1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_background_failure_is_only_counted() {
    let h = harness(eager(), Some(ScriptedCompletion::new().fail("endpoint down")));

    h.memory.add_memory(turn("s1", "a1", Role::User, "alpha beta gamma delta")).await.unwrap();
    h.memory.wait_for_background().await;
    let added = h
        .memory
        .add_memory(turn("s1", "a1", Role::User, "epsilon zeta eta theta"))
        .await;
    h.memory.wait_for_background().await;

    assert!(added.is_ok());
    assert_eq!(h.memory.runner_stats().failed, 1);
    assert_eq!(h.memory.long_term().get_memory_count("a1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_consolidation_reports_completion_failure() {
    let h = harness(eager(), Some(ScriptedCompletion::new().fail("endpoint down")));
    let short_term = h.memory.short_term();
    short_term.add_message(turn("s1", "a1", Role::User, "alpha beta gamma")).await.unwrap();
    short_term.add_message(turn("s1", "a1", Role::User, "delta epsilon zeta")).await.unwrap();

    let err = h
        .memory
        .consolidate_memory(&ConsolidationRequest::new("s1", "a1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SDKError::Store(_)));
    assert!(err.to_string().contains("endpoint down"));
}

#[tokio::test]
async fn test_forced_consolidation_with_facts() {
    let mut config = eager();
    config.consolidation.extract_facts = true;
    let completion = ScriptedCompletion::new()
        .reply("The user shared food preferences.")
        .reply("```json\n[\"The user is vegetarian\", \"The user dislikes cilantro\"]\n```");
    let h = harness(config, Some(completion));

    h.memory
        .short_term()
        .add_message(turn("s1", "a1", Role::User, "I'm vegetarian and hate cilantro"))
        .await
        .unwrap();

    let result = h
        .memory
        .consolidate_memory(&ConsolidationRequest::new("s1", "a1").forced())
        .await
        .unwrap();

    assert_eq!(result.entries_processed, 1);
    assert_eq!(result.summaries_created, 1);
    assert_eq!(result.facts_created, 2);

    let calls = h.completion.as_ref().unwrap().calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].temperature > calls[1].temperature);

    let state = h
        .memory
        .get_memory_state(&MemoryStateRequest::new("s1", "a1").with_query("vegetarian cilantro").with_top_k(10))
        .await
        .unwrap();
    assert!(state.long_term.iter().any(|e| e.content == "The user is vegetarian"));

    let stats = h.memory.get_memory_stats("s1", "a1").await.unwrap();
    assert_eq!(stats.long_term_entries, 3);
    assert!(stats.last_consolidated_at.is_some());
}

#[tokio::test]
async fn test_malformed_facts_mean_no_facts() {
    let mut config = eager();
    config.consolidation.extract_facts = true;
    let completion = ScriptedCompletion::new()
        .reply("A short chat.")
        .reply("Sorry, I could not find any facts.");
    let h = harness(config, Some(completion));

    h.memory.short_term().add_message(turn("s1", "a1", Role::User, "hi there friend")).await.unwrap();
    h.memory.short_term().add_message(turn("s1", "a1", Role::Assistant, "hello again")).await.unwrap();

    let result = h
        .memory
        .consolidate_memory(&ConsolidationRequest::new("s1", "a1"))
        .await
        .unwrap();

    assert_eq!(result.summaries_created, 1);
    assert_eq!(result.facts_created, 0);
}

#[tokio::test]
async fn test_no_completion_endpoint_never_schedules() {
    let h = harness(eager(), None);

    for content in ["one two three", "four five six", "seven eight nine"] {
        h.memory.add_memory(turn("s1", "a1", Role::User, content)).await.unwrap();
    }
    h.memory.wait_for_background().await;

    assert_eq!(h.memory.runner_stats().spawned, 0);
    assert!(h
        .memory
        .consolidate_memory(&ConsolidationRequest::new("s1", "a1"))
        .await
        .is_err());
}
