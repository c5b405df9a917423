//! End-to-end planner scenarios over in-memory stores and scripted
//! capabilities: no network, no database, no real LLM.

use std::sync::Arc;

use chrono::Utc;

use research::traits::clock::{Clock, ManualClock, SystemClock};
use research::traits::llm::LLMClient;
use research::traits::repository::{
    AnswerRepository, SessionRepository, TraceRepository,
};
use research::traits::search::MockSearchProvider;
use research::{
    ClaimStatus, ConfidenceLevel, MemoryStore, PlannerAgent, PlannerConfig, QuerySession,
    ResearchContext, ScriptedLLM, SearchStrategy, SessionStatus, TestScenario,
    VerificationDecision, ABSTENTION_TEXT,
};

fn context(
    store: &Arc<MemoryStore>,
    search: MockSearchProvider,
    fetcher: research::traits::fetch::MockFetcher,
    llm: Arc<ScriptedLLM>,
    clock: Arc<dyn Clock>,
) -> ResearchContext {
    ResearchContext {
        search: Arc::new(search),
        fetcher: Arc::new(fetcher),
        llm,
        clock,
        sessions: store.clone(),
        traces: store.clone(),
        answers: store.clone(),
        cache: store.clone(),
    }
}

async fn start_session(store: &Arc<MemoryStore>, question: &str) -> QuerySession {
    let session = QuerySession::new(question, Utc::now());
    store.create_session(&session).await.unwrap();
    session
}

/// The keyword-expansion query the planner will issue on attempt 2.
async fn expanded_query(question: &str) -> String {
    let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLLM::new());
    SearchStrategy::KeywordExpansion
        .build_query(question, &llm)
        .await
}

const VOYAGER_QUESTION: &str = "What year was the Voyager 1 probe launched?";

fn voyager_claims_json() -> &'static str {
    r#"[
        {"text": "The Voyager 1 probe was launched on September 5, 1977.", "polarity": "AFFIRM"},
        {"text": "Voyager 1 was launched aboard a Titan IIIE rocket.", "polarity": "AFFIRM"}
    ]"#
}

fn voyager_scenario() -> (MockSearchProvider, research::traits::fetch::MockFetcher, Arc<ScriptedLLM>)
{
    let (search, fetcher) = TestScenario::new()
        .with_query_results(
            VOYAGER_QUESTION,
            &[
                (
                    "https://www.nasa.gov/voyager-1",
                    "NASA mission overview for the Voyager program, covering the 1977 launch window.",
                ),
                (
                    "https://www.britannica.com/topic/Voyager-1",
                    "Britannica encyclopedia entry describing the Voyager 1 space probe mission.",
                ),
                (
                    "https://www.space.com/voyager-1-history",
                    "Space history feature retracing the Voyager 1 launch campaign in detail.",
                ),
            ],
        )
        .build();

    let llm = Arc::new(
        ScriptedLLM::new()
            // Synthesis first so extraction keys cannot shadow it.
            .with_response(
                "Claims:\n- The Voyager 1 probe",
                "Voyager 1 was launched on September 5, 1977.",
            )
            .with_response("NASA mission overview", voyager_claims_json())
            .with_response(
                "Britannica encyclopedia entry",
                r#"[{"text": "The Voyager 1 probe was launched on September 5, 1977.", "polarity": "AFFIRM"}]"#,
            )
            .with_response("Space history feature", voyager_claims_json()),
    );

    (search, fetcher, llm)
}

#[tokio::test]
async fn scenario_happy_path() {
    let store = Arc::new(MemoryStore::new());
    let (search, fetcher, llm) = voyager_scenario();
    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());

    let session = start_session(&store, VOYAGER_QUESTION).await;
    planner.run(session.session_id).await.unwrap();

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Done);

    let trace = store.read_trace(session.session_id).await.unwrap();
    assert_eq!(trace.planner_traces.len(), 1);
    assert_eq!(
        trace.planner_traces[0].decision,
        VerificationDecision::Accept
    );
    assert_eq!(
        trace.planner_traces[0].strategy_used,
        SearchStrategy::Verbatim
    );

    let result = store
        .read_result(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(result.snapshot.answer_text.contains("1977"));
    assert_eq!(result.snapshot.confidence_level, ConfidenceLevel::High);
    assert!(result.evidence.len() >= 2);
}

#[tokio::test]
async fn scenario_retry_then_accept() {
    let question = "Who is the current CEO of Acme Corp?";
    let retry_query = expanded_query(question).await;

    let store = Arc::new(MemoryStore::new());
    let (search, fetcher) = TestScenario::new()
        // Attempt 1: everything the provider returns is blocklisted.
        .with_query_results(
            question,
            &[(
                "https://www.facebook.com/acmecorp",
                "Acme Corp official page on a social network.",
            )],
        )
        .with_query_results(
            &retry_query,
            &[
                (
                    "https://newsroom.acmecorp.com/leadership",
                    "Corporate newsroom leadership announcement with executive biographies.",
                ),
                (
                    "https://www.businesswire.com/acme-ceo",
                    "Business wire release covering the Acme Corp chief executive transition.",
                ),
                (
                    "https://www.techjournal.com/acme-profile",
                    "Tech journal company profile tracing the history of Acme Corp.",
                ),
            ],
        )
        .build();

    let ceo_claim =
        r#"[{"text": "Jane Morrow is the chief executive officer of Acme Corp.", "polarity": "AFFIRM"}]"#;
    let both_claims = r#"[
        {"text": "Jane Morrow is the chief executive officer of Acme Corp.", "polarity": "AFFIRM"},
        {"text": "Acme Corp was founded in 1912 as a machining company.", "polarity": "AFFIRM"}
    ]"#;
    let llm = Arc::new(
        ScriptedLLM::new()
            .with_response(
                "Claims:\n- Jane Morrow",
                "Jane Morrow is the current CEO of Acme Corp.",
            )
            .with_response("Corporate newsroom leadership", ceo_claim)
            .with_response("Business wire release", both_claims)
            .with_response(
                "Tech journal company profile",
                r#"[{"text": "Acme Corp was founded in 1912 as a machining company.", "polarity": "AFFIRM"}]"#,
            ),
    );

    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());

    let session = start_session(&store, question).await;
    planner.run(session.session_id).await.unwrap();

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Done);

    let trace = store.read_trace(session.session_id).await.unwrap();
    let decisions: Vec<_> = trace.planner_traces.iter().map(|t| t.decision).collect();
    assert_eq!(
        decisions,
        vec![VerificationDecision::Retry, VerificationDecision::Accept]
    );
    assert_eq!(
        trace.planner_traces[1].strategy_used,
        SearchStrategy::KeywordExpansion
    );

    let result = store
        .read_result(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(result.snapshot.answer_text.contains("Jane Morrow"));
    assert!(matches!(
        result.snapshot.confidence_level,
        ConfidenceLevel::High | ConfidenceLevel::Medium
    ));
}

#[tokio::test]
async fn scenario_conflict_abstains() {
    let question = "What is the population of Greenfield?";
    let retry_query = expanded_query(question).await;

    let population_pages: &[(&str, &str)] = &[
        (
            "https://www.almanac.com/greenfield",
            "Almanac demographic summary with census figures for Greenfield.",
        ),
        (
            "https://www.atlas.org/greenfield",
            "Atlas gazetteer entry listing geography and population of Greenfield.",
        ),
        (
            "https://www.oldstats.net/greenfield",
            "Archived statistics portal snapshot of Greenfield population records.",
        ),
    ];

    let store = Arc::new(MemoryStore::new());
    let (search, fetcher) = TestScenario::new()
        .with_query_results(question, population_pages)
        .with_query_results(&retry_query, population_pages)
        .build();

    let low_claim =
        r#"[{"text": "The population of Greenfield is 1.2 million people.", "polarity": "AFFIRM"}]"#;
    let high_claim =
        r#"[{"text": "The population of Greenfield is 2.0 million people.", "polarity": "AFFIRM"}]"#;
    let llm = Arc::new(
        ScriptedLLM::new()
            .with_response("Almanac demographic summary", low_claim)
            .with_response("Atlas gazetteer entry", low_claim)
            .with_response("Archived statistics portal", high_claim),
    );

    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());

    let session = start_session(&store, question).await;
    planner.run(session.session_id).await.unwrap();

    let trace = store.read_trace(session.session_id).await.unwrap();
    let decisions: Vec<_> = trace.planner_traces.iter().map(|t| t.decision).collect();
    assert_eq!(
        decisions,
        vec![VerificationDecision::Retry, VerificationDecision::Stop]
    );

    let result = store
        .read_result(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.snapshot.confidence_level, ConfidenceLevel::Low);
    assert_eq!(result.snapshot.answer_text, ABSTENTION_TEXT);
    assert!(result
        .evidence
        .iter()
        .any(|e| e.claim.status == ClaimStatus::Conflict));
}

#[tokio::test]
async fn scenario_cache_hit_skips_search() {
    let question = "What year was the Voyager 1 probe launched?";
    let retry_query = expanded_query(question).await;

    // Attempt 1 finds nothing; attempt 2 (keyword expansion) accepts.
    let pages: &[(&str, &str)] = &[
        (
            "https://www.nasa.gov/voyager-1",
            "NASA mission overview for the Voyager program, covering the 1977 launch window.",
        ),
        (
            "https://www.britannica.com/topic/Voyager-1",
            "Britannica encyclopedia entry describing the Voyager 1 space probe mission.",
        ),
        (
            "https://www.space.com/voyager-1-history",
            "Space history feature retracing the Voyager 1 launch campaign in detail.",
        ),
    ];

    let build_llm = || {
        Arc::new(
            ScriptedLLM::new()
                .with_response(
                    "Claims:\n- The Voyager 1 probe",
                    "Voyager 1 was launched on September 5, 1977.",
                )
                .with_response("NASA mission overview", voyager_claims_json())
                .with_response(
                    "Britannica encyclopedia entry",
                    r#"[{"text": "The Voyager 1 probe was launched on September 5, 1977.", "polarity": "AFFIRM"}]"#,
                )
                .with_response("Space history feature", voyager_claims_json()),
        )
    };

    let store = Arc::new(MemoryStore::new());

    // First session populates the cache.
    let search_a = {
        let (search, fetcher) = TestScenario::new()
            .with_query_results(&retry_query, pages)
            .build();
        let search = Arc::new(search);
        let ctx = ResearchContext {
            search: search.clone(),
            fetcher: Arc::new(fetcher),
            llm: build_llm(),
            clock: Arc::new(SystemClock),
            sessions: store.clone(),
            traces: store.clone(),
            answers: store.clone(),
            cache: store.clone(),
        };
        let planner = PlannerAgent::new(ctx, PlannerConfig::default());
        let session = start_session(&store, question).await;
        planner.run(session.session_id).await.unwrap();

        let result = store
            .read_result(session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(result.snapshot.answer_text.contains("1977"));
        assert_eq!(store.cached_entry_count(), 1);
        search
    };
    assert_eq!(search_a.calls().len(), 2);

    // Second session: identical question, fresh capabilities. The
    // verbatim attempt still searches; attempt 2 must hit the cache
    // instead of calling the provider again.
    let (search_b, fetcher_b) = TestScenario::new()
        .with_query_results(&retry_query, pages)
        .build();
    let search_b = Arc::new(search_b);
    let ctx = ResearchContext {
        search: search_b.clone(),
        fetcher: Arc::new(fetcher_b),
        llm: build_llm(),
        clock: Arc::new(SystemClock),
        sessions: store.clone(),
        traces: store.clone(),
        answers: store.clone(),
        cache: store.clone(),
    };
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());
    let session_b = start_session(&store, question).await;
    planner.run(session_b.session_id).await.unwrap();

    assert_eq!(search_b.calls().len(), 1, "attempt 2 must not search");

    let result_b = store
        .read_result(session_b.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        result_b.snapshot.answer_text,
        "Voyager 1 was launched on September 5, 1977."
    );
    assert_eq!(result_b.snapshot.confidence_level, ConfidenceLevel::High);

    let session_b = store
        .read_session(session_b.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session_b.status, SessionStatus::Done);
}

#[tokio::test]
async fn scenario_budget_exhaustion_stops_low() {
    let question = "How deep is Lake Vermilion?";
    let retry_query = expanded_query(question).await;

    // All documents come from one registered domain, so nothing ever
    // verifies.
    let pages: &[(&str, &str)] = &[
        (
            "https://www.onesource.org/lake-vermilion",
            "Onesource lake guide describing Lake Vermilion depths and shoreline.",
        ),
        (
            "https://maps.onesource.org/vermilion-bathymetry",
            "Onesource bathymetric chart notes for the Lake Vermilion basin survey.",
        ),
    ];

    let store = Arc::new(MemoryStore::new());
    let (search, fetcher) = TestScenario::new()
        .with_query_results(question, pages)
        .with_query_results(&retry_query, pages)
        .build();

    let depth_claim =
        r#"[{"text": "Lake Vermilion reaches a maximum depth of 76 feet.", "polarity": "AFFIRM"}]"#;
    let llm = Arc::new(
        ScriptedLLM::new()
            .with_response("Onesource lake guide", depth_claim)
            .with_response("Onesource bathymetric chart", depth_claim),
    );

    let config = PlannerConfig {
        max_attempts: 2,
        ..PlannerConfig::default()
    };
    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, config);

    let session = start_session(&store, question).await;
    planner.run(session.session_id).await.unwrap();

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Done);

    let trace = store.read_trace(session.session_id).await.unwrap();
    assert_eq!(trace.planner_traces.len(), 2);
    assert_eq!(
        trace.planner_traces.last().unwrap().decision,
        VerificationDecision::Stop
    );

    let result = store
        .read_result(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.snapshot.confidence_level, ConfidenceLevel::Low);
    assert_eq!(result.snapshot.answer_text, ABSTENTION_TEXT);
}

#[tokio::test]
async fn search_provider_failure_is_retried_then_failed() {
    let question = "What is the tallest building in Milltown?";
    let store = Arc::new(MemoryStore::new());

    // Every query fails at the provider, on every strategy.
    let retry_query = expanded_query(question).await;
    let (search, fetcher) = TestScenario::new()
        .with_failing_query(question)
        .with_failing_query(&retry_query)
        .build();
    // Reframing falls back to the verbatim question (already failing)
    // and domain restriction appends site: filters; register that too.
    let search = search.fail_query(&format!(
        "{question} site:wikipedia.org OR site:britannica.com OR site:reuters.com OR site:apnews.com OR site:nature.com"
    ));

    let llm = Arc::new(ScriptedLLM::new());
    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());

    let session = start_session(&store, question).await;
    planner.run(session.session_id).await.unwrap();

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Failed);

    // Failed sessions still serve an abstention result.
    let result = store
        .read_result(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.snapshot.answer_text, ABSTENTION_TEXT);
    assert_eq!(result.snapshot.confidence_level, ConfidenceLevel::Low);
}

#[tokio::test]
async fn run_on_non_init_session_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let (search, fetcher, llm) = voyager_scenario();
    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let planner = PlannerAgent::new(ctx, PlannerConfig::default());

    let session = start_session(&store, VOYAGER_QUESTION).await;
    planner.run(session.session_id).await.unwrap();

    let trace_before = store.read_trace(session.session_id).await.unwrap();
    let status_before = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap()
        .status;

    // Second invocation must change nothing.
    planner.run(session.session_id).await.unwrap();

    let trace_after = store.read_trace(session.session_id).await.unwrap();
    assert_eq!(
        trace_before.planner_traces.len(),
        trace_after.planner_traces.len()
    );
    assert_eq!(
        status_before,
        store
            .read_session(session.session_id)
            .await
            .unwrap()
            .unwrap()
            .status
    );
}

#[tokio::test]
async fn deadline_exceeded_fails_session() {
    let store = Arc::new(MemoryStore::new());
    let (search, fetcher, llm) = voyager_scenario();
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let config = PlannerConfig {
        session_timeout: std::time::Duration::ZERO,
        ..PlannerConfig::default()
    };
    let ctx = context(&store, search, fetcher, llm, clock);
    let planner = PlannerAgent::new(ctx, config);

    let session = start_session(&store, VOYAGER_QUESTION).await;
    assert!(planner.run(session.session_id).await.is_err());

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
}

#[tokio::test]
async fn invariants_hold_across_scenarios() {
    let store = Arc::new(MemoryStore::new());
    let (search, fetcher, llm) = voyager_scenario();
    let ctx = context(&store, search, fetcher, llm, Arc::new(SystemClock));
    let config = PlannerConfig::default();
    let max_attempts = config.max_attempts as usize;
    let max_searches = config.max_searches as usize;
    let planner = PlannerAgent::new(ctx, config);

    let session = start_session(&store, VOYAGER_QUESTION).await;
    planner.run(session.session_id).await.unwrap();

    let session = store
        .read_session(session.session_id)
        .await
        .unwrap()
        .unwrap();
    let trace = store.read_trace(session.session_id).await.unwrap();
    let result = store.read_result(session.session_id).await.unwrap();

    // Trace and search budgets are hard caps.
    assert!(trace.planner_traces.len() <= max_attempts);
    assert!(trace.search_logs.len() <= max_searches);

    // Search logs precede the attempt trace they belong to.
    for t in &trace.planner_traces {
        if t.num_docs > 0 {
            assert!(trace
                .search_logs
                .iter()
                .any(|l| l.attempt_number == t.attempt_number));
        }
    }

    // A snapshot implies a terminal session.
    if result.is_some() {
        assert!(session.status.is_terminal());
    }

    // Every VERIFIED evidence row is backed by at least two domains.
    for evidence in result.unwrap().evidence {
        if evidence.claim.status == ClaimStatus::Verified {
            assert!(evidence.claim.distinct_domains >= 2);
        }
    }
}
