//! End-to-end behavior of the memory tiers through the orchestrator.

mod common;

use common::{harness, turn};
use ctxmem_sdk::ctxmem_core::estimate_tokens;
use ctxmem_sdk::{
    ConsolidationRequest, LoadedDocument, MemoryConfig, MemoryStateRequest, RetrievedChunk, Role,
};

fn ceilings(max_entries: usize, max_tokens: usize) -> MemoryConfig {
    let mut config = MemoryConfig::default();
    config.short_term.max_entries = max_entries;
    config.short_term.max_tokens = max_tokens;
    config
}

#[tokio::test]
async fn test_short_term_totals_and_ceilings_hold_after_every_write() {
    let h = harness(ceilings(5, 30), None);
    let lines = [
        "short",
        "a somewhat longer line of text",
        "x",
        "another message that has several words",
        "ok",
        "the quick brown fox jumps",
        "over the lazy dog",
        "final words here",
    ];

    for line in lines {
        h.memory.add_memory(turn("s1", "a1", Role::User, line)).await.unwrap();

        let stm = h.memory.get_conversation("s1", "a1").await.unwrap();
        let summed: usize = stm.entries.iter().map(|e| e.token_count).sum();
        assert_eq!(stm.total_tokens, summed);
        assert!(stm.len() <= 5);
        assert!(stm.total_tokens <= 30);
    }
}

#[tokio::test]
async fn test_eviction_is_oldest_first() {
    let h = harness(ceilings(3, 10_000), None);
    for i in 0..6 {
        h.memory
            .add_memory(turn("s1", "a1", Role::User, &format!("message {}", i)))
            .await
            .unwrap();
    }

    let stm = h.memory.get_conversation("s1", "a1").await.unwrap();
    let contents: Vec<&str> = stm.entries.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["message 3", "message 4", "message 5"]);
}

#[tokio::test]
async fn test_unseen_session_reads_as_empty() {
    let h = harness(MemoryConfig::default(), None);

    let state = h
        .memory
        .get_memory_state(&MemoryStateRequest::new("new-session", "new-agent"))
        .await
        .unwrap();

    let stm = state.short_term.unwrap();
    assert!(stm.is_empty());
    assert_eq!(stm.max_entries, 50);
    assert_eq!(stm.max_tokens, 4000);

    let wm = state.working.unwrap();
    assert!(wm.loaded_documents.is_empty());
    assert_eq!(wm.max_documents, 5);
    assert_eq!(wm.max_tokens, 8000);

    let stats = h.memory.get_memory_stats("new-session", "new-agent").await.unwrap();
    assert_eq!(stats.long_term_entries, 0);
    assert!(stats.last_consolidated_at.is_none());
}

#[tokio::test]
async fn test_unload_document_removes_its_chunks() {
    let h = harness(MemoryConfig::default(), None);
    h.memory
        .load_document("s1", "a1", LoadedDocument::new("d1", "Guide"))
        .await
        .unwrap();
    h.memory
        .load_document("s1", "a1", LoadedDocument::new("d2", "Notes"))
        .await
        .unwrap();
    h.memory
        .update_working_memory(
            "s1",
            "a1",
            vec![
                RetrievedChunk::new("d1", "Guide", "install the toolchain first"),
                RetrievedChunk::new("d2", "Notes", "remember the meeting"),
                RetrievedChunk::new("d1", "Guide", "then run the tests"),
            ],
            None,
        )
        .await
        .unwrap();

    assert!(h.memory.unload_document("s1", "a1", "d1").await.unwrap());
    assert!(!h.memory.unload_document("s1", "a1", "d1").await.unwrap());

    let wm = h.memory.working().get_working_memory("s1", "a1").await.unwrap();
    assert_eq!(wm.loaded_documents.len(), 1);
    assert!(wm.retrieved_chunks.iter().all(|c| c.document_id == "d2"));
    assert_eq!(wm.total_tokens, estimate_tokens("remember the meeting"));
}

#[tokio::test]
async fn test_staleness_rules() {
    let h = harness(MemoryConfig::default(), None);
    let working = h.memory.working();

    assert!(working.is_context_stale("s1", "a1", "anything", 0.5).await.unwrap());

    h.memory
        .update_working_memory(
            "s1",
            "a1",
            vec![RetrievedChunk::new("d1", "Doc", "borrow checker rules")],
            Some("how does the borrow checker work"),
        )
        .await
        .unwrap();

    for threshold in [0.01, 0.5, 1.0] {
        assert!(!working
            .is_context_stale("s1", "a1", "how does the borrow checker work", threshold)
            .await
            .unwrap());
    }
    assert!(working.is_context_stale("s1", "a1", "weather tomorrow", 0.5).await.unwrap());
    assert!(working.is_context_stale("s1", "a1", "weather tomorrow", 0.9).await.unwrap());
}

#[tokio::test]
async fn test_stale_when_no_chunks_cached() {
    let h = harness(MemoryConfig::default(), None);
    h.memory
        .update_working_memory("s1", "a1", Vec::new(), Some("same query"))
        .await
        .unwrap();

    assert!(h.memory.needs_document_refresh("s1", "a1", "same query").await.unwrap());
}

#[tokio::test]
async fn test_fourth_document_evicts_the_first() {
    let mut config = MemoryConfig::default();
    config.working.max_documents = 3;
    let h = harness(config, None);

    for (id, name) in [("d1", "One"), ("d2", "Two"), ("d3", "Three"), ("d4", "Four")] {
        h.memory
            .load_document("s1", "a1", LoadedDocument::new(id, name))
            .await
            .unwrap();
    }

    let wm = h.memory.working().get_working_memory("s1", "a1").await.unwrap();
    let ids: Vec<&str> = wm.loaded_documents.iter().map(|d| d.document_id.as_str()).collect();
    assert_eq!(ids, vec!["d2", "d3", "d4"]);
}

#[tokio::test]
async fn test_single_entry_is_not_consolidated() {
    let h = harness(MemoryConfig::default(), Some(common::ScriptedCompletion::new().reply("unused")));
    h.memory
        .short_term()
        .add_message(turn("s1", "a1", Role::User, "just one message"))
        .await
        .unwrap();

    let result = h
        .memory
        .consolidate_memory(&ConsolidationRequest::new("s1", "a1"))
        .await
        .unwrap();

    assert_eq!(result.entries_processed, 0);
    assert_eq!(result.summaries_created, 0);
    assert_eq!(h.completion.as_ref().unwrap().call_count(), 0);
    assert_eq!(h.memory.long_term().get_memory_count("a1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_formatted_memory_respects_budget() {
    let h = harness(MemoryConfig::default(), None);
    for i in 0..20 {
        h.memory
            .add_memory(turn("s1", "a1", Role::User, &format!("turn {} about project planning", i)))
            .await
            .unwrap();
    }
    h.memory
        .update_working_memory(
            "s1",
            "a1",
            vec![RetrievedChunk::new("d1", "Plan", "milestones and deadlines for the project")],
            Some("project planning"),
        )
        .await
        .unwrap();
    h.memory.store_fact("a1", None, "project planning happens on mondays").await.unwrap();

    let req = MemoryStateRequest::new("s1", "a1").with_query("project planning");
    for budget in [0, 1, 10, 40, 100, 400, 4000] {
        let formatted = h.memory.get_formatted_memory(&req, Some(budget)).await.unwrap();
        assert!(formatted.total_tokens <= budget || formatted.truncated);
        assert_eq!(formatted.budget, budget);
    }
}

#[tokio::test]
async fn test_two_turns_format_in_order() {
    let h = harness(MemoryConfig::default(), None);
    h.memory.add_memory(turn("s1", "a1", Role::User, "Hello")).await.unwrap();
    h.memory.add_memory(turn("s1", "a1", Role::Assistant, "Hi there")).await.unwrap();

    let stm = h.memory.get_conversation("s1", "a1").await.unwrap();
    assert_eq!(stm.len(), 2);
    assert_eq!(stm.entries[0].role, Role::User);
    assert_eq!(stm.entries[1].role, Role::Assistant);

    let formatted = h
        .memory
        .get_formatted_memory(&MemoryStateRequest::new("s1", "a1"), None)
        .await
        .unwrap();
    assert_eq!(formatted.short_term_text, "User: Hello\nAssistant: Hi there\n");
}

#[tokio::test]
async fn test_chunks_grouped_under_one_header_per_document() {
    let h = harness(MemoryConfig::default(), None);
    h.memory
        .update_working_memory(
            "s1",
            "a1",
            vec![
                RetrievedChunk::new("d1", "Doc1", "first part"),
                RetrievedChunk::new("d1", "Doc1", "second part"),
                RetrievedChunk::new("d2", "Doc2", "other part"),
            ],
            None,
        )
        .await
        .unwrap();

    let formatted = h
        .memory
        .get_formatted_memory(&MemoryStateRequest::new("s1", "a1"), None)
        .await
        .unwrap();

    assert_eq!(
        formatted.working_text,
        "Document: Doc1\nfirst part\nsecond part\n\nDocument: Doc2\nother part\n"
    );
    assert_eq!(formatted.text.matches("Document: Doc1").count(), 1);
}

#[tokio::test]
async fn test_clear_session_keeps_agent_knowledge() {
    let h = harness(MemoryConfig::default(), None);
    h.memory.add_memory(turn("s1", "a1", Role::User, "I like hiking")).await.unwrap();
    h.memory
        .update_working_memory("s1", "a1", vec![RetrievedChunk::new("d1", "Trails", "ridge loop")], Some("trails"))
        .await
        .unwrap();
    h.memory.store_fact("a1", Some("s1"), "the user likes hiking").await.unwrap();

    h.memory.clear_session("s1", "a1").await.unwrap();

    let state = h
        .memory
        .get_memory_state(&MemoryStateRequest::new("s1", "a1").with_query("hiking"))
        .await
        .unwrap();
    assert!(state.short_term.unwrap().is_empty());
    assert!(state.working.unwrap().retrieved_chunks.is_empty());
    assert_eq!(state.long_term.len(), 1);
    assert_eq!(state.long_term[0].content, "the user likes hiking");
}

#[tokio::test]
async fn test_long_term_is_scoped_per_agent() {
    let h = harness(MemoryConfig::default(), None);
    h.memory.store_fact("a1", None, "agent one knows rust").await.unwrap();
    h.memory.store_fact("a2", None, "agent two knows go").await.unwrap();

    let found = h.memory.search_long_term("a1", "knows", None).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].agent_id, "a1");
}

#[tokio::test]
async fn test_disabled_long_term_is_silent() {
    let mut config = MemoryConfig::default();
    config.long_term.enabled = false;
    let h = harness(config, None);

    assert!(h.memory.store_fact("a1", None, "ignored").await.unwrap().is_none());
    assert!(h.memory.search_long_term("a1", "ignored", None).await.unwrap().is_empty());
    assert_eq!(h.memory.prune_long_term("a1").await.unwrap(), 0);

    let stats = h.memory.get_memory_stats("s1", "a1").await.unwrap();
    assert!(!stats.long_term_enabled);
}
