use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::compare::{aggregate_group, compare_units, group_commanders, FieldComparison};
use crate::config::QuartermasterConfig;
use crate::data::{commander_entries, ComparisonRef, ComparisonRefWithQuantity, Unit};
use crate::resolve::{resolve_comparison, ResolutionSnapshot, UnitCache};
use crate::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Commanders,
    Aggregate,
    Compare,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("commanders") => Some(Command::Commanders),
        Some("aggregate") => Some(Command::Aggregate),
        Some("compare") => Some(Command::Compare),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Commanders) => handle_commanders(args),
        Some(Command::Aggregate) => handle_aggregate(args),
        Some(Command::Compare) => handle_compare(args),
        None => {
            eprintln!("usage: quartermaster <commanders|aggregate|compare>");
            2
        }
    }
}

/// Runs `future` on a single-threaded runtime; spawned fetch tasks share the one thread.
fn block_on<F: std::future::Future>(future: F) -> Option<F::Output> {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => Some(runtime.block_on(future)),
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            None
        }
    }
}

fn session_cache() -> Arc<UnitCache> {
    let config = QuartermasterConfig::from_env();
    info!(
        "reading factions from {} (max {} concurrent fetches)",
        config.data_dir.display(),
        config.max_concurrent_fetches
    );
    UnitCache::from_config(&config)
}

fn print_json<T: Serialize>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

/// Reports every errored slot on stderr. Returns how many there were.
fn report_errors(refs: &[ComparisonRef], snapshot: &ResolutionSnapshot) -> usize {
    let mut failed = 0;
    for (r, error) in refs.iter().zip(&snapshot.errors) {
        if let Some(error) = error {
            eprintln!("could not resolve {}:{}: {error}", r.faction_id, r.unit_id);
            failed += 1;
        }
    }
    failed
}

fn handle_commanders(args: &[String]) -> i32 {
    let Some(faction) = args.get(2) else {
        eprintln!("usage: quartermaster commanders <faction>");
        return 2;
    };

    let cache = session_cache();
    let outcome = block_on(async {
        let index = cache.list_units(faction).await?;
        let entries = commander_entries(&index);
        let refs: Vec<ComparisonRef> = entries
            .iter()
            .map(|entry| ComparisonRef::new(faction.as_str(), entry.unit_id.as_str()))
            .collect();
        let snapshot = resolve_comparison(Arc::clone(&cache), refs.clone()).await;
        Ok::<_, ResolveError>((entries, refs, snapshot))
    });
    let (entries, refs, snapshot) = match outcome {
        Some(Ok(resolved)) => resolved,
        Some(Err(err)) => {
            eprintln!("failed to list faction '{faction}': {err}");
            return 1;
        }
        None => return 1,
    };
    report_errors(&refs, &snapshot);

    let by_id: HashMap<&str, &Unit> = entries
        .iter()
        .zip(&snapshot.units)
        .filter_map(|(entry, unit)| unit.as_deref().map(|unit| (entry.unit_id.as_str(), unit)))
        .collect();
    let groups = group_commanders(&entries, |entry| by_id.get(entry.unit_id.as_str()).copied());
    info!(
        "{} commander(s) of '{faction}' in {} group(s)",
        entries.len(),
        groups.len()
    );
    print_json(&groups, "commander groups")
}

fn handle_aggregate(args: &[String]) -> i32 {
    if args.len() < 3 {
        eprintln!("usage: quartermaster aggregate <faction:unit[@version][xN]>...");
        return 2;
    }
    let mut members = Vec::with_capacity(args.len() - 2);
    for raw in &args[2..] {
        match ComparisonRefWithQuantity::parse(raw) {
            Ok(member) => members.push(member),
            Err(err) => {
                eprintln!("{err}");
                return 2;
            }
        }
    }
    let refs: Vec<ComparisonRef> = members.iter().map(|m| m.unit.clone()).collect();
    let quantities: Vec<u32> = members.iter().map(|m| m.quantity).collect();

    let cache = session_cache();
    let Some(snapshot) = block_on(resolve_comparison(cache, refs.clone())) else {
        return 1;
    };
    let failed = report_errors(&refs, &snapshot);

    let stats = aggregate_group(snapshot.group_members(&quantities));
    let status = print_json(&stats, "group stats");
    if failed > 0 {
        1
    } else {
        status
    }
}

#[derive(Debug, Serialize)]
struct UnitComparison<'a> {
    unit: &'a ComparisonRef,
    baseline: &'a ComparisonRef,
    fields: Vec<FieldComparison>,
}

fn handle_compare(args: &[String]) -> i32 {
    let (Some(unit_raw), Some(baseline_raw)) = (args.get(2), args.get(3)) else {
        eprintln!("usage: quartermaster compare <faction:unit> <faction:unit>");
        return 2;
    };
    let refs = match (ComparisonRef::parse(unit_raw), ComparisonRef::parse(baseline_raw)) {
        (Ok(unit), Ok(baseline)) => vec![unit, baseline],
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("{err}");
            return 2;
        }
    };

    let cache = session_cache();
    let Some(snapshot) = block_on(resolve_comparison(cache, refs.clone())) else {
        return 1;
    };
    if report_errors(&refs, &snapshot) > 0 {
        return 1;
    }
    let (Some(unit), Some(baseline)) = (&snapshot.units[0], &snapshot.units[1]) else {
        eprintln!("comparison requires two resolved units");
        return 1;
    };

    let comparison = UnitComparison {
        unit: &refs[0],
        baseline: &refs[1],
        fields: compare_units(unit, baseline),
    };
    print_json(&comparison, "comparison")
}
