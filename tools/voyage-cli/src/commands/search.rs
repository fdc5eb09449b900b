//! Keystroke replay through the search orchestrator.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;
use voyage_search::{SearchOrchestrator, SearchPhase, SearchSnapshot};

use super::SearchArgs;
use crate::context::Context;
use crate::output::{format_millis, phase_badge};

/// One observed change of the search box.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub at_ms: u64,
    #[serde(flatten)]
    pub snapshot: SearchSnapshot,
}

/// Run the search command.
pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client(args.fixtures.as_deref())?;
    let search = client.search();
    if let Some(location) = &args.location {
        search.set_filters(json!({ "location": location }));
    }

    // Long enough for the last debounce window plus one full request.
    let settle = client.search_config().debounce() + ctx.config.service.timeouts.total();
    let transitions = replay(&search, &args.keystrokes, Duration::from_millis(args.gap_ms), settle).await;

    if ctx.output.is_json() {
        ctx.output.json(&transitions);
    } else {
        ctx.output.header("Search replay");
        for transition in &transitions {
            let snapshot = &transition.snapshot;
            let mut line = format!(
                "{:>8}  {:<16} {:?}",
                format_millis(transition.at_ms),
                phase_badge(snapshot.phase),
                snapshot.query
            );
            if let Some(results) = &snapshot.results {
                line.push_str(&format!("  ({} found)", count_records(results)));
            }
            if let Some(error) = &snapshot.error {
                line.push_str(&format!("  {}", error));
            }
            ctx.output.list_item(&line);
        }
    }

    if ctx.output.is_verbose() && !ctx.output.is_json() {
        ctx.output.info(&client.metrics().snapshot().to_summary());
    }

    Ok(())
}

/// Type `keystrokes` one by one, `gap` apart, and record every change until
/// the search settles or `settle` elapses after the last keystroke.
pub async fn replay(
    search: &SearchOrchestrator,
    keystrokes: &[String],
    gap: Duration,
    settle: Duration,
) -> Vec<Transition> {
    let mut updates = search.subscribe();
    updates.borrow_and_update();
    let started = Instant::now();
    let mut transitions = Vec::new();

    for keystroke in keystrokes {
        search.set_query(keystroke);
        record_until(&mut updates, Instant::now() + gap, started, &mut transitions, |_| false).await;
    }

    if !is_quiet(&search.snapshot()) {
        record_until(&mut updates, Instant::now() + settle, started, &mut transitions, is_quiet).await;
    }

    transitions
}

async fn record_until(
    updates: &mut watch::Receiver<SearchSnapshot>,
    deadline: Instant,
    started: Instant,
    transitions: &mut Vec<Transition>,
    stop: impl Fn(&SearchSnapshot) -> bool,
) {
    while let Ok(Ok(())) = tokio::time::timeout_at(deadline, updates.changed()).await {
        let snapshot = updates.borrow_and_update().clone();
        let done = stop(&snapshot);
        transitions.push(Transition {
            at_ms: started.elapsed().as_millis() as u64,
            snapshot,
        });
        if done {
            break;
        }
    }
}

fn is_quiet(snapshot: &SearchSnapshot) -> bool {
    snapshot.phase == SearchPhase::Idle || snapshot.phase.is_settled()
}

fn count_records(results: &serde_json::Value) -> usize {
    match results {
        serde_json::Value::Array(items) => items.len(),
        serde_json::Value::Object(map) => map.values().filter_map(|v| v.as_array()).map(Vec::len).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voyage_cache::{CacheStore, StalenessPolicy};
    use voyage_data::{InMemoryService, ResourceApi};
    use voyage_search::SearchConfig;

    fn keystrokes(typed: &[&str]) -> Vec<String> {
        typed.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_issues_one_search_for_a_burst() {
        let service = Arc::new(
            InMemoryService::new()
                .with_get("properties/?search=male", json!([{"id": 42}]))
                .with_get("packages/?search=male", json!([]))
                .with_latency(Duration::from_millis(50)),
        );
        let search = SearchOrchestrator::for_api(
            CacheStore::new(StalenessPolicy::default()),
            ResourceApi::new(service.clone()),
            SearchConfig::default(),
        );

        let transitions = replay(
            &search,
            &keystrokes(&["m", "ma", "mal", "male"]),
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
        .await;

        let phases: Vec<SearchPhase> = transitions.iter().map(|t| t.snapshot.phase).collect();
        assert_eq!(phases.iter().filter(|p| **p == SearchPhase::Fetching).count(), 1);
        assert_eq!(phases.last(), Some(&SearchPhase::ShowingResults));
        assert_eq!(service.total_requests(), 2);

        let last = transitions.last().unwrap();
        assert_eq!(last.snapshot.query, "male");
        assert_eq!(count_records(last.snapshot.results.as_ref().unwrap()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_short_query_ends_idle() {
        let service = Arc::new(InMemoryService::new());
        let search = SearchOrchestrator::for_api(
            CacheStore::default(),
            ResourceApi::new(service.clone()),
            SearchConfig::default(),
        );

        let transitions = replay(&search, &keystrokes(&["m"]), Duration::from_millis(10), Duration::from_secs(1)).await;

        assert_eq!(transitions.last().map(|t| t.snapshot.phase), Some(SearchPhase::Idle));
        assert_eq!(service.total_requests(), 0);
    }
}
