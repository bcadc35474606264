//! Delve Headless Simulation Harness
//!
//! Drives the scheduler, pathfinder, AI state machine and full engine
//! in-process and checks their invariants. No rendering, no input.
//!
//! Usage:
//!   cargo run -p delve-simtest
//!   cargo run -p delve-simtest -- --verbose
//!   cargo run -p delve-simtest -- --config engine.json

mod logging;

use std::collections::HashSet;

use delve_core::prelude::*;
use delve_core::world::WorldGrid;
use delve_logic::behavior::{AiState, BehaviorState, Senses};
use delve_logic::pathfinding::{is_path_valid, Pathfinder};
use delve_logic::schedule::{SchedulerConfig, TurnQueue};
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Fixture map ─────────────────────────────────────────────────────────

const FIXTURE: &[&str] = &[
    "##############################",
    "#......#.............#.......#",
    "#......#.............#.......#",
    "#......#....####.....#.......#",
    "#.................#..........#",
    "#......#....#.....#..#.......#",
    "###.####....#.....#..####.####",
    "#......#....#######..#.......#",
    "#......#.............#.......#",
    "#......#.............#.......#",
    "#............................#",
    "##############################",
];

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Options {
    verbose: bool,
    config: EngineConfig,
}

fn parse_args() -> Result<Options, String> {
    let mut verbose = false;
    let mut config = EngineConfig::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a file path")?;
                let json = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {}", path, e))?;
                config = EngineConfig::from_json(&json)
                    .map_err(|e| format!("bad config {}: {}", path, e))?;
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(Options { verbose, config })
}

fn main() {
    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };
    logging::init(options.verbose);
    let verbose = options.verbose;
    println!("=== Delve Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Turn queue ordering and cleanup
    results.extend(validate_scheduler(verbose));

    // 2. Pathfinding on the fixture map
    results.extend(validate_pathfinding(&options.config, verbose));

    // 3. AI transition sweep
    results.extend(validate_ai_transitions(verbose));

    // 4. Engine soak run
    results.extend(validate_engine_soak(&options.config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        error!("{} harness checks failed", failed);
        std::process::exit(1);
    }
}

// ── 1. Scheduler ────────────────────────────────────────────────────────

fn validate_scheduler(verbose: bool) -> Vec<TestResult> {
    println!("--- Scheduler ---");
    let mut results = Vec::new();

    let mut queue = TurnQueue::new();
    queue.add(EntityId(7), 50);
    queue.add(EntityId(3), 50);
    let first = queue.next().map(|e| e.entity);
    results.push(TestResult {
        name: "tie_break_by_id".into(),
        passed: first == Some(EntityId(3)),
        detail: format!("first pop at t=50: {:?}", first),
    });

    // Random fill, then drain: pops must be non-decreasing in (time, id).
    let mut rng = StdRng::seed_from_u64(11);
    let mut queue = TurnQueue::new();
    for id in 0..2_000u64 {
        queue.add(EntityId(id), rng.gen_range(0..500));
    }
    let mut previous = None;
    let mut ordered = true;
    let mut popped = 0;
    while let Some(entry) = queue.next() {
        let key = (entry.time, entry.entity);
        if previous.is_some_and(|p| p > key) {
            ordered = false;
        }
        previous = Some(key);
        popped += 1;
    }
    results.push(TestResult {
        name: "drain_is_ordered".into(),
        passed: ordered && popped == 2_000,
        detail: format!("{} entries popped, ordered={}", popped, ordered),
    });

    // Half the entities die; the gated sweep must eventually remove them.
    let mut queue = TurnQueue::with_config(SchedulerConfig::default());
    for id in 0..400u64 {
        queue.add(EntityId(id), id);
    }
    let mut swept = None;
    for _ in 0..4 {
        if let Some(metrics) = queue.cleanup_dead_entities(400, |id: EntityId| id.0 % 2 == 0) {
            swept = Some(metrics);
            break;
        }
        queue.add(EntityId(0), 0);
    }
    results.push(TestResult {
        name: "cleanup_removes_dead".into(),
        passed: swept.is_some_and(|m| m.removed == 200),
        detail: match swept {
            Some(m) => format!("removed {} of {} in {:?}", m.removed, m.before, m.duration),
            None => "sweep never ran".into(),
        },
    });

    if verbose {
        println!("  cleanup cadence: {}", queue.config().threshold_for(400, queue.len()));
    }
    results
}

// ── 2. Pathfinding ──────────────────────────────────────────────────────

fn validate_pathfinding(config: &EngineConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();
    let world = GameWorld::new(GameMap::from_ascii(FIXTURE));
    let grid = WorldGrid::new(&world, None);
    let pathfinder = Pathfinder::new(config.pathfinding.clone()).with_debug(true);

    let pairs = [
        (Point::new(1, 1), Point::new(28, 9)),
        (Point::new(2, 9), Point::new(26, 2)),
        (Point::new(9, 4), Point::new(15, 5)),
        (Point::new(1, 10), Point::new(28, 10)),
    ];

    for &strategy in PathStrategy::all() {
        let mut bad = Vec::new();
        for &(from, to) in &pairs {
            match pathfinder.find_path(&grid, from, to, strategy) {
                Some(path) => {
                    let ends = path.first() == Some(&from) && path.last() == Some(&to);
                    if !ends || !is_path_valid(&grid, &path) {
                        bad.push(format!("{}->{}", from, to));
                    } else if verbose {
                        println!("    {} {}->{}: {} steps", strategy, from, to, path.len() - 1);
                    }
                }
                None => bad.push(format!("{}->{} unreachable", from, to)),
            }
        }
        results.push(TestResult {
            name: format!("paths_{}", strategy),
            passed: bad.is_empty(),
            detail: if bad.is_empty() {
                format!("{} routes valid", pairs.len())
            } else {
                format!("bad routes: {}", bad.join(", "))
            },
        });
    }

    // Walled-off pocket: no route.
    let mut sealed = GameMap::from_ascii(FIXTURE);
    for p in [Point::new(23, 1), Point::new(23, 2), Point::new(24, 2)] {
        sealed.set_tile(p, Tile::Wall);
    }
    for x in 22..29 {
        sealed.set_tile(Point::new(x, 3), Tile::Wall);
    }
    let sealed_world = GameWorld::new(sealed);
    let sealed_grid = WorldGrid::new(&sealed_world, None);
    let none = pathfinder.find_path(&sealed_grid, Point::new(1, 1), Point::new(28, 1), PathStrategy::Direct);
    results.push(TestResult {
        name: "unreachable_is_none".into(),
        passed: none.is_none(),
        detail: format!("sealed corner route: {:?}", none.map(|p| p.len())),
    });

    // Open room: a direct path is exactly Manhattan-long, JPS or not.
    let open = GameWorld::new(GameMap::bordered_room(40, 40));
    let open_grid = WorldGrid::new(&open, None);
    let from = Point::new(1, 1);
    let mut off = Vec::new();
    for to in [Point::new(5, 3), Point::new(38, 38), Point::new(20, 35)] {
        let len = pathfinder
            .find_path(&open_grid, from, to, PathStrategy::Direct)
            .map(|p| p.len() - 1);
        if len != Some(from.manhattan(to) as usize) {
            off.push(format!("{} got {:?}", to, len));
        }
    }
    results.push(TestResult {
        name: "direct_is_shortest".into(),
        passed: off.is_empty(),
        detail: if off.is_empty() {
            "all open-room routes optimal".into()
        } else {
            off.join(", ")
        },
    });

    let traces = pathfinder.recent_traces();
    info!("{} searches traced", traces.len());
    results.push(TestResult {
        name: "debug_traces_recorded".into(),
        passed: !traces.is_empty(),
        detail: format!("{} traces", traces.len()),
    });
    results
}

// ── 3. AI transitions ───────────────────────────────────────────────────

fn validate_ai_transitions(verbose: bool) -> Vec<TestResult> {
    println!("--- AI Transitions ---");
    let mut results = Vec::new();
    let home = Point::new(10, 10);
    let states = [
        BehaviorState::Idle,
        BehaviorState::Patrolling,
        BehaviorState::Chasing,
        BehaviorState::Attacking,
        BehaviorState::Searching,
        BehaviorState::Fleeing,
    ];

    let mut checked = 0;
    let mut violations = Vec::new();
    for &archetype in Archetype::all() {
        for &prior in &states {
            for hp in [1, 2, 3, 5, 8, 10] {
                for distance in [1, 3, 9, 20] {
                    for visible in [true, false] {
                        let mut ai = AiState::for_archetype(archetype, home);
                        ai.state = prior;
                        ai.last_known_target = Some(Point::new(10, 12));
                        let target = Point::new(10 + distance, 10);
                        let senses = Senses::toward(home, target, visible).with_health(hp, 10);
                        let next = ai.transition(&senses).state;
                        checked += 1;

                        let fraction = hp as f32 / 10.0;
                        let expected = if visible && fraction <= ai.flee_threshold {
                            Some(BehaviorState::Fleeing)
                        } else if distance == 1 {
                            Some(BehaviorState::Attacking)
                        } else if visible && distance as u32 <= ai.aggro_range {
                            Some(BehaviorState::Chasing)
                        } else {
                            None
                        };
                        if let Some(expected) = expected {
                            if next != expected {
                                violations.push(format!(
                                    "{} {} hp={} d={} vis={}: {} != {}",
                                    archetype.name(),
                                    prior,
                                    hp,
                                    distance,
                                    visible,
                                    next,
                                    expected
                                ));
                            }
                        }
                    }
                }
            }
        }
    }
    if verbose {
        for v in violations.iter().take(10) {
            println!("    {}", v);
        }
    }
    results.push(TestResult {
        name: "transition_priorities".into(),
        passed: violations.is_empty(),
        detail: format!("{} cases, {} violations", checked, violations.len()),
    });

    // A search gives up after its cap and forgets the target.
    let mut ai = AiState::for_archetype(Archetype::Hunter, home);
    ai.state = BehaviorState::Chasing;
    ai.last_known_target = Some(Point::new(3, 3));
    let blind = Senses::default();
    let mut turns = 0;
    while ai.step(&blind) != BehaviorState::Idle && turns < 100 {
        turns += 1;
    }
    results.push(TestResult {
        name: "search_expires".into(),
        passed: ai.state == BehaviorState::Idle && ai.last_known_target.is_none(),
        detail: format!("idle after {} turns (cap {})", turns, ai.max_search_turns),
    });
    results
}

// ── 4. Engine soak ──────────────────────────────────────────────────────

fn validate_engine_soak(config: &EngineConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Engine Soak ---");
    let mut results = Vec::new();

    let mut engine = SimulationEngine::new(GameMap::from_ascii(FIXTURE), config.clone());
    let player = engine.spawn_player(Point::new(4, 4), 500);
    let spawns = [
        (Point::new(25, 2), Archetype::Hunter, "orc"),
        (Point::new(25, 9), Archetype::Pack, "wolf"),
        (Point::new(26, 9), Archetype::Pack, "wolf"),
        (Point::new(15, 9), Archetype::Guard, "sentry"),
        (Point::new(3, 9), Archetype::Wander, "bat"),
        (Point::new(15, 1), Archetype::Passive, "newt"),
        (Point::new(10, 2), Archetype::Fleeing, "imp"),
    ];
    for (at, archetype, name) in spawns {
        engine.spawn_monster(at, archetype, name, 6, 1);
    }
    engine.spawn_simple_monster(Point::new(27, 5), "slime", 4);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut last_time = 0;
    let mut went_back = false;
    let mut overlaps = 0;
    let mut rounds = 0;
    for _ in 0..300 {
        let report = engine.run();
        rounds += 1;
        if engine.time() < last_time {
            went_back = true;
        }
        last_time = engine.time();
        overlaps += count_overlaps(&engine);
        match report.outcome {
            TurnOutcome::AwaitingInput(_) => {
                let step = Delta::new(rng.gen_range(-1..=1), 0);
                let action = if step.is_zero() {
                    Action::wait()
                } else {
                    Action::step(step)
                };
                engine.queue_player_action(action);
            }
            TurnOutcome::QueueEmpty => break,
            TurnOutcome::IterationCapReached => {}
        }
        if !engine.world().read().is_alive(player) {
            break;
        }
    }

    results.push(TestResult {
        name: "clock_monotonic".into(),
        passed: !went_back,
        detail: format!("t={} after {} rounds", last_time, rounds),
    });
    results.push(TestResult {
        name: "no_shared_cells".into(),
        passed: overlaps == 0,
        detail: format!("{} overlapping blockers seen", overlaps),
    });

    let stats = engine.snapshot_stats();
    results.push(TestResult {
        name: "stats_consistent".into(),
        passed: stats.queued <= stats.entities && stats.pathfinding.valid <= stats.pathfinding.tracked,
        detail: format!(
            "{} entities, {} queued, {} paths cached",
            stats.entities, stats.queued, stats.pathfinding.tracked
        ),
    });

    let mut image = Vec::new();
    let saved = engine
        .save_schedule(&mut image)
        .and_then(|_| engine.load_schedule(image.as_slice()));
    results.push(TestResult {
        name: "schedule_save_load".into(),
        passed: saved.is_ok(),
        detail: match saved {
            Ok(()) => format!("{} bytes", image.len()),
            Err(e) => e.to_string(),
        },
    });

    if verbose {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("  stats not serializable: {}", e),
        }
    }
    results
}

/// Living movement blockers sharing a cell.
fn count_overlaps(engine: &SimulationEngine) -> usize {
    let world = engine.world().read();
    let mut seen = HashSet::new();
    let mut overlaps = 0;
    for (_, (pos, _)) in world
        .ecs()
        .query::<(&Position, &BlocksMovement)>()
        .without::<&Corpse>()
        .iter()
    {
        if !seen.insert(pos.point()) {
            overlaps += 1;
        }
    }
    overlaps
}
