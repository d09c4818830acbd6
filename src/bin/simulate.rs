use chrono::{SecondsFormat, Utc};
use clap::Parser;
use grab_guard::config::GameConfig;
use grab_guard::constants::TICK_MS;
use grab_guard::engine::{GameSession, SessionOptions};
use grab_guard::rng::Rng;
use grab_guard::types::{GameEvent, GameOverReason, RoundPhase, Snapshot};
use log::{LevelFilter, Metadata, Record};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

const REACTION_DELAY_MIN_MS: u64 = 150;
const REACTION_DELAY_MAX_MS: u64 = 900;
const ENGAGE_CHECK_INTERVAL_MS: u64 = 1_000;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// Probability of blocking each grab round.
    #[arg(long)]
    reaction_rate: Option<f64>,
    /// Probability of clicking each visible protestor crowd once per second.
    #[arg(long)]
    engage_rate: Option<f64>,
    #[arg(long)]
    duration_s: Option<u32>,
    #[arg(long)]
    touch: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// Forward engine lifecycle logs (info level) to stderr.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    #[serde(rename = "reactionRate")]
    reaction_rate: f64,
    #[serde(rename = "engageRate")]
    engage_rate: f64,
    touch: bool,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    #[serde(rename = "reactionRate")]
    reaction_rate: f64,
    #[serde(rename = "engageRate")]
    engage_rate: f64,
    touch: bool,
    reason: Option<GameOverReason>,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    score: u32,
    rounds: u32,
    blocks: u32,
    #[serde(rename = "grabsConceded")]
    grabs_conceded: u32,
    annexations: u32,
    #[serde(rename = "regionsLiberated")]
    regions_liberated: u32,
    #[serde(rename = "protestorEngagements")]
    protestor_engagements: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    time: String,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

/// Bridges the engine's `log` records into the same JSON lines as the
/// simulator's own events.
struct JsonLogger {
    match_id: String,
    level: LevelFilter,
}

impl log::Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        emit_log(
            &record.level().as_str().to_lowercase(),
            "engine_log",
            &self.match_id,
            None,
            None,
            None,
            json!({
                "target": record.target(),
                "message": record.args().to_string(),
            }),
        );
    }

    fn flush(&self) {}
}

fn install_logger(match_id: &str, verbose: bool) {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    let logger = Box::leak(Box::new(JsonLogger {
        match_id: match_id.to_string(),
        level,
    }));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    install_logger(&match_id, cli.verbose);

    let mut config = match cli.config.as_ref() {
        Some(path) => match GameConfig::from_json_file(path) {
            Ok(config) => config,
            Err(error) => {
                emit_log(
                    "error",
                    "config_load_failed",
                    &match_id,
                    None,
                    None,
                    None,
                    json!({
                        "path": path.to_string_lossy(),
                        "error": error.to_string(),
                    }),
                );
                std::process::exit(2);
            }
        },
        None => GameConfig::default(),
    };
    if let Some(duration_s) = cli.duration_s {
        config.game_duration_s = duration_s.max(1);
    }

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "reactionRate": scenario.reaction_rate,
                "engageRate": scenario.engage_rate,
                "touch": scenario.touch,
                "gameDurationS": config.game_duration_s,
            }),
        );
        let scenario_run = run_scenario(&scenario, &config);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;
        *reason_counts
            .entry(game_over_reason_key(scenario_run.result.reason))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "reason": scenario_run.result.reason,
                "durationMs": scenario_run.result.duration_ms,
                "score": scenario_run.result.score,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("failed to serialize scenario result: {error}"),
        }
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        reason_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

/// Scripted stand-in for a human: decides once per round whether to block and
/// after how long, and pokes at protestor crowds on a fixed cadence.
struct ScriptedPlayer {
    rng: Rng,
    reaction_rate: f64,
    engage_rate: f64,
    decided_round: Option<u64>,
    block_at_ms: Option<u64>,
    next_engage_check_ms: u64,
}

impl ScriptedPlayer {
    fn new(scenario: &Scenario) -> Self {
        Self {
            rng: Rng::new(scenario.seed ^ 0x9e37_79b9),
            reaction_rate: scenario.reaction_rate,
            engage_rate: scenario.engage_rate,
            decided_round: None,
            block_at_ms: None,
            next_engage_check_ms: ENGAGE_CHECK_INTERVAL_MS,
        }
    }

    /// Returns how many protestor engagements were made this tick.
    fn act(&mut self, session: &mut GameSession, snapshot: &Snapshot) -> u32 {
        if let Some(round) = snapshot.round.as_ref() {
            if round.phase == RoundPhase::Armed && self.decided_round != Some(round.id) {
                self.decided_round = Some(round.id);
                self.block_at_ms = if self.rng.chance(self.reaction_rate) {
                    let delay = self
                        .rng
                        .range_u64(REACTION_DELAY_MIN_MS, REACTION_DELAY_MAX_MS);
                    Some(round.started_at_ms + delay)
                } else {
                    None
                };
            }
        }

        if let (Some(block_at), Some(hitbox)) = (self.block_at_ms, snapshot.hitbox) {
            if snapshot.elapsed_ms >= block_at {
                let area = hitbox.interactive;
                let x = (area.x + area.width / 2) as f64;
                let y = (area.y + area.height / 2) as f64;
                session.activate_at(x, y);
                self.block_at_ms = None;
            }
        }

        let mut engagements = 0;
        if snapshot.elapsed_ms >= self.next_engage_check_ms {
            self.next_engage_check_ms = snapshot.elapsed_ms + ENGAGE_CHECK_INTERVAL_MS;
            for crowd in &snapshot.protestors {
                if !self.rng.chance(self.engage_rate) {
                    continue;
                }
                let area = crowd.placement;
                let x = (area.x + area.width / 2) as f64;
                let y = (area.y + area.height / 2) as f64;
                if session.engage_at(x, y) {
                    engagements += 1;
                }
            }
        }
        engagements
    }
}

fn run_scenario(scenario: &Scenario, config: &GameConfig) -> ScenarioRunResult {
    let mut session = GameSession::new(
        config.clone(),
        scenario.seed,
        SessionOptions {
            touch_device: scenario.touch,
            ..SessionOptions::default()
        },
    );
    session.start();
    let mut player = ScriptedPlayer::new(scenario);
    let max_claims = config.max_claims;

    let mut rounds = 0;
    let mut annexations = 0;
    let mut protestor_engagements = 0;
    let mut open_rounds = 0i32;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_tick = 0u64;
    let tick_limit = (config.game_duration_s as u64 * 1_000 / TICK_MS) * 2 + 1_000;

    while !session.is_ended() {
        session.step(TICK_MS);
        let observed = session.build_snapshot(false);
        protestor_engagements += player.act(&mut session, &observed);

        let snapshot = session.build_snapshot(true);
        last_tick = snapshot.tick;
        for event in &snapshot.events {
            match event {
                GameEvent::RoundStarted { .. } => {
                    rounds += 1;
                    open_rounds += 1;
                }
                GameEvent::RoundResolved { .. } => open_rounds -= 1,
                GameEvent::RegionAnnexed { .. } => annexations += 1,
                _ => {}
            }
        }
        let mut found = collect_snapshot_anomalies(&snapshot, max_claims);
        if !(0..=1).contains(&open_rounds) {
            found.push(format!("open round count out of range: {open_rounds}"));
        }
        for message in found {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }

        if snapshot.tick > tick_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = session.build_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            reaction_rate: scenario.reaction_rate,
            engage_rate: scenario.engage_rate,
            touch: scenario.touch,
            reason: summary.reason,
            duration_ms: summary.duration_ms,
            score: summary.stats.score,
            rounds,
            blocks: summary.stats.successful_blocks,
            grabs_conceded: summary.stats.grabs_conceded,
            annexations,
            regions_liberated: summary.stats.regions_liberated,
            protestor_engagements,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, max_claims: u8) -> Vec<String> {
    let mut anomalies = Vec::new();

    for region in &snapshot.regions {
        if region.claims > max_claims {
            anomalies.push(format!(
                "claims out of range: {} {}/{}",
                region.name, region.claims, max_claims
            ));
        }
        if region.protestors_visible && region.claims < region.max_claims {
            anomalies.push(format!("protestors on unoccupied region: {}", region.name));
        }
        if region.claims < region.max_claims
            && (region.annexed_elapsed_ms > 0 || region.resistance_eligible)
        {
            anomalies.push(format!("annexation clock running on {}", region.name));
        }
    }

    for event in &snapshot.events {
        if let GameEvent::RegionLiberated { region_id, .. } = event {
            let claims = snapshot.regions.get(*region_id).map(|region| region.claims);
            if claims != Some(0) {
                anomalies.push(format!(
                    "liberated region {region_id} still has claims: {claims:?}"
                ));
            }
        }
    }

    let armed = snapshot
        .round
        .as_ref()
        .is_some_and(|round| round.phase == RoundPhase::Armed);
    if snapshot.hitbox.is_some() && !armed {
        anomalies.push("hitbox interactive outside an armed round".to_string());
    }

    if snapshot.regions.is_empty() {
        anomalies.push("invalid region configuration".to_string());
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(rand::random::<u64>));

    if cli.single || cli.reaction_rate.is_some() || cli.engage_rate.is_some() {
        let reaction_rate = clamp_rate(cli.reaction_rate.unwrap_or(0.5));
        let engage_rate = clamp_rate(cli.engage_rate.unwrap_or(0.5));
        return vec![Scenario {
            name: format!("custom-r{:.0}-e{:.0}", reaction_rate * 100.0, engage_rate * 100.0),
            reaction_rate,
            engage_rate,
            touch: cli.touch,
            seed,
        }];
    }

    vec![
        Scenario {
            name: "idle-player".to_string(),
            reaction_rate: 0.0,
            engage_rate: 0.0,
            touch: cli.touch,
            seed,
        },
        Scenario {
            name: "casual-player".to_string(),
            reaction_rate: 0.4,
            engage_rate: 0.3,
            touch: cli.touch,
            seed: normalize_seed(seed as u64 + 1),
        },
        Scenario {
            name: "sharp-player".to_string(),
            reaction_rate: 0.9,
            engage_rate: 0.9,
            touch: cli.touch,
            seed: normalize_seed(seed as u64 + 2),
        },
    ]
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        reason_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let now = Utc::now();
    let log_line = StructuredLogLine {
        timestamp_ms: now.timestamp_millis().max(0) as u64,
        time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => eprintln!("{line}"),
        Err(error) => eprintln!("failed to serialize log line: {error}"),
    }
}

fn game_over_reason_key(reason: Option<GameOverReason>) -> String {
    match reason {
        Some(GameOverReason::Survived) => "survived",
        Some(GameOverReason::Annexed) => "annexed",
        None => "unfinished",
    }
    .to_string()
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(reason: Option<GameOverReason>, duration_ms: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            reaction_rate: 0.5,
            engage_rate: 0.5,
            touch: false,
            reason,
            duration_ms,
            score: 0,
            rounds: 0,
            blocks: 0,
            grabs_conceded: 0,
            annexations: 0,
            regions_liberated: 0,
            protestor_engagements: 0,
            anomalies: Vec::new(),
        }
    }

    fn make_scenario(name: &str, reaction_rate: f64, engage_rate: f64) -> Scenario {
        Scenario {
            name: name.to_string(),
            reaction_rate,
            engage_rate,
            touch: false,
            seed: 1234,
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result(Some(GameOverReason::Survived), 168_000),
                make_scenario_result(Some(GameOverReason::Annexed), 60_000),
            ],
            BTreeMap::from([
                ("survived".to_string(), 1usize),
                ("annexed".to_string(), 1usize),
            ]),
            1,
            228_000,
        );
        assert_eq!(summary.average_duration_ms, 114_000);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("grab-guard-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result(None, 60_000)],
            BTreeMap::from([("unfinished".to_string(), 1usize)]),
            0,
            60_000,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn reason_keys_cover_unfinished_runs() {
        assert_eq!(game_over_reason_key(Some(GameOverReason::Survived)), "survived");
        assert_eq!(game_over_reason_key(Some(GameOverReason::Annexed)), "annexed");
        assert_eq!(game_over_reason_key(None), "unfinished");
    }

    #[test]
    fn custom_rates_are_clamped_into_a_single_scenario() {
        let cli = Cli::parse_from([
            "simulate",
            "--seed",
            "9",
            "--reaction-rate",
            "1.7",
            "--engage-rate",
            "-0.2",
        ]);
        let scenarios = resolve_scenarios(&cli);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].reaction_rate, 1.0);
        assert_eq!(scenarios[0].engage_rate, 0.0);
        assert_eq!(scenarios[0].seed, 9);
    }

    #[test]
    fn default_run_has_three_seeded_scenarios() {
        let cli = Cli::parse_from(["simulate", "--seed", "100"]);
        let seeds: Vec<u32> = resolve_scenarios(&cli).iter().map(|s| s.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102]);
    }

    #[test]
    fn idle_player_loses_every_region_without_anomalies() {
        let mut config = GameConfig::default();
        config.resistance_chance_per_second = 0.0;
        let run = run_scenario(&make_scenario("idle", 0.0, 0.0), &config);
        assert_eq!(run.result.reason, Some(GameOverReason::Annexed));
        assert_eq!(run.result.blocks, 0);
        assert_eq!(run.result.grabs_conceded, 9);
        assert_eq!(run.result.annexations, 3);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
    }

    #[test]
    fn perfect_player_survives_the_countdown() {
        let mut config = GameConfig::default();
        config.game_duration_s = 40;
        let run = run_scenario(&make_scenario("perfect", 1.0, 1.0), &config);
        assert_eq!(run.result.reason, Some(GameOverReason::Survived));
        assert_eq!(run.result.grabs_conceded, 0);
        assert!(run.result.score > 0);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
    }

    #[test]
    fn fresh_session_has_no_anomalies() {
        let mut session = GameSession::new(GameConfig::default(), 5, SessionOptions::default());
        session.start();
        session.step(TICK_MS);
        let snapshot = session.build_snapshot(true);
        assert!(collect_snapshot_anomalies(&snapshot, 3).is_empty());
    }
}
