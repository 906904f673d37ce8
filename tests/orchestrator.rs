use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use pickem_standings::config::PoolConfig;
use pickem_standings::error::Error;
use pickem_standings::feed::{ScoreFeed, StaticFeed};
use pickem_standings::hooks::{HookEvent, RecordingHooks, SeasonHooks};
use pickem_standings::model::{FeedGame, Game, GameStatus, Pipeline, TeamMeta};
use pickem_standings::orchestrator::Orchestrator;
use pickem_standings::standings::{RecomputeOutcome, StandingsEngine};
use pickem_standings::store::{self, SeasonSeed};
use pickem_standings::sync;

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 13, 17, 0, 0).unwrap()
}

/// Week 1: games 1 and 2 three hours apart. Week 2: game 3.
fn schedule() -> Vec<Game> {
    vec![
        Game::scheduled(1, 1, 10, 11, kickoff()),
        Game::scheduled(2, 1, 12, 13, kickoff() + Duration::hours(3)),
        Game::scheduled(3, 2, 10, 12, kickoff() + Duration::days(7)),
    ]
}

fn team(id: i64) -> TeamMeta {
    TeamMeta {
        id,
        abbreviation: format!("T{id}"),
        name: format!("Team {id}"),
        ..TeamMeta::default()
    }
}

fn feed_game(game: &Game, status: GameStatus, score: Option<(u32, u32)>) -> FeedGame {
    FeedGame {
        feed_id: format!("feed-{}", game.id),
        home_team_id: game.home_team_id,
        visitor_team_id: game.visitor_team_id,
        kickoff: game.kickoff,
        status,
        status_detail: None,
        home_score: score.map(|s| s.0),
        visitor_score: score.map(|s| s.1),
        spread: Some(-3.5),
        home_team: Some(team(game.home_team_id)),
        visitor_team: Some(team(game.visitor_team_id)),
    }
}

struct Harness {
    orchestrator: Orchestrator,
    feed: Arc<StaticFeed>,
    hooks: Arc<RecordingHooks>,
    games: Vec<Game>,
}

impl Harness {
    fn new(cfg: PoolConfig) -> Self {
        let games = schedule();
        let mut conn = store::open_in_memory().unwrap();
        store::seed_season(
            &mut conn,
            &SeasonSeed {
                games: games.clone(),
                users: vec![1, 2],
                survivor_users: vec![1, 2],
            },
        )
        .unwrap();

        // User 1 fills in everything; user 2 leaves game 1 and survivor blank.
        let early = kickoff() - Duration::days(1);
        store::submit_pick(&conn, 1, 1, 10, 1, early).unwrap();
        store::submit_pick(&conn, 1, 2, 12, 2, early).unwrap();
        store::submit_pick(&conn, 2, 2, 13, 1, early).unwrap();
        store::submit_tiebreaker(&conn, 1, 1, 40, early).unwrap();
        store::submit_survivor_pick(&conn, 1, 1, 10, early).unwrap();

        let feed = Arc::new(StaticFeed::new());
        let hooks = Arc::new(RecordingHooks::new());
        let orchestrator = Orchestrator::new(
            conn,
            Arc::clone(&feed) as Arc<dyn ScoreFeed>,
            Arc::clone(&hooks) as Arc<dyn SeasonHooks>,
            Arc::new(StandingsEngine::new(cfg)),
        );
        Self {
            orchestrator,
            feed,
            hooks,
            games,
        }
    }

    fn week1(&self, first: (GameStatus, Option<(u32, u32)>), second: (GameStatus, Option<(u32, u32)>)) {
        self.feed.set_week(
            1,
            vec![
                feed_game(&self.games[0], first.0, first.1),
                feed_game(&self.games[1], second.0, second.1),
            ],
        );
    }

    fn stored(&self, game_id: i64) -> Game {
        store::load_game(self.orchestrator.connection(), game_id)
            .unwrap()
            .unwrap()
    }
}

#[test]
fn pregame_tick_only_refreshes_metadata() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::Pregame, None), (GameStatus::Pregame, None));

    let report = h.orchestrator.tick(kickoff() - Duration::hours(2)).unwrap();
    assert_eq!(report.week, Some(1));
    assert_eq!(report.games_seen, 2);
    assert!(report.kickoffs.is_empty());
    assert!(report.recomputed.is_empty());
    assert_eq!(h.stored(1).status, GameStatus::Pregame);
    assert_eq!(h.stored(1).spread, Some(-3.5));
    let meta = store::load_team(h.orchestrator.connection(), 10).unwrap().unwrap();
    assert_eq!(meta.abbreviation, "T10");
    assert!(h.hooks.events().is_empty());
}

#[test]
fn kickoff_locks_missed_picks_and_sweeps_survivor() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::InProgress, Some((7, 0))), (GameStatus::Pregame, None));
    let now = kickoff() + Duration::minutes(5);

    let report = h.orchestrator.tick(now).unwrap();
    assert_eq!(report.kickoffs, vec![1]);
    assert_eq!(report.picks_locked, 1);
    assert_eq!(report.survivors_removed, 1);
    assert!(report
        .recomputed
        .iter()
        .any(|(p, o)| *p == Pipeline::Survivor && matches!(o, RecomputeOutcome::Replaced { .. })));
    assert_eq!(h.hooks.events(), vec![HookEvent::WeekStarted(1)]);

    let conn = h.orchestrator.connection();
    let missed = store::load_pick(conn, 2, 1).unwrap().unwrap();
    assert!(missed.missed);
    assert_eq!(missed.team_id, None);
    let err = store::submit_pick(conn, 2, 1, 11, 2, now).unwrap_err();
    assert!(matches!(err, Error::GuardViolation { user_id: 2, game_id: 1 }));
    // The finalized row refuses writes even below the API.
    assert!(conn
        .execute("UPDATE picks SET team_id = 11 WHERE user_id = 2 AND game_id = 1", [])
        .is_err());

    // Same feed data again: nothing new to lock, no second week start.
    let again = h.orchestrator.tick(now + Duration::minutes(1)).unwrap();
    assert!(again.kickoffs.is_empty());
    assert_eq!(again.picks_locked, 0);
    assert_eq!(h.hooks.events(), vec![HookEvent::WeekStarted(1)]);
}

#[test]
fn last_final_of_the_week_fires_end_of_week_once() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Pregame, None));
    let report = h.orchestrator.tick(kickoff() + Duration::minutes(170)).unwrap();
    assert_eq!(report.finals, vec![1]);
    assert_eq!(report.recomputed.len(), 4);
    assert!(!report.week_completed);

    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Final, Some((24, 20))));
    let report = h.orchestrator.tick(kickoff() + Duration::hours(7)).unwrap();
    assert_eq!(report.finals, vec![2]);
    assert!(report.week_completed);
    assert!(!report.season_completed);

    let weekly = store::load_weekly_standings(h.orchestrator.connection(), 1).unwrap();
    assert_eq!(weekly[0].user_id, 1);
    assert_eq!(weekly[0].points_earned, 3);
    assert_eq!(weekly[0].last_score, Some(44));

    let expected = vec![
        HookEvent::WeekStarted(1),
        HookEvent::Payouts {
            week: 1,
            winners: vec![1],
        },
        HookEvent::WeekEnded(1),
        HookEvent::LatePayments(1),
    ];
    assert_eq!(h.hooks.events(), expected);
    assert_eq!(store::current_week(h.orchestrator.connection()).unwrap(), Some(2));

    // Week 1 is done; the next tick looks at week 2 and fires nothing for week 1.
    let report = h.orchestrator.tick(kickoff() + Duration::hours(8)).unwrap();
    assert_eq!(report.week, Some(2));
    assert!(!report.week_completed);
    assert_eq!(h.hooks.events(), expected);
}

#[test]
fn week_left_final_by_an_interrupted_tick_closes_on_the_next_tick() {
    let mut h = Harness::new(PoolConfig::default());
    let finals = vec![
        feed_game(&h.games[0], GameStatus::Final, Some((21, 14))),
        feed_game(&h.games[1], GameStatus::Final, Some((24, 20))),
    ];
    let now = kickoff() + Duration::hours(7);
    // Games written, then the tick died before standings or notifications.
    sync::sync_week(h.orchestrator.connection(), 1, &finals, now).unwrap();
    assert!(store::load_weekly_standings(h.orchestrator.connection(), 1)
        .unwrap()
        .is_empty());
    assert_eq!(store::current_week(h.orchestrator.connection()).unwrap(), Some(1));

    h.feed.set_week(1, finals);
    let report = h.orchestrator.tick(now + Duration::minutes(1)).unwrap();
    assert_eq!(report.week, Some(1));
    assert!(report.finals.is_empty());
    assert!(report.week_completed);

    let weekly = store::load_weekly_standings(h.orchestrator.connection(), 1).unwrap();
    assert_eq!(weekly[0].user_id, 1);
    assert_eq!(weekly[0].last_score, Some(44));
    assert!(weekly.iter().all(|r| r.week_final));
    let expected = vec![
        HookEvent::Payouts {
            week: 1,
            winners: vec![1],
        },
        HookEvent::WeekEnded(1),
        HookEvent::LatePayments(1),
    ];
    assert_eq!(h.hooks.events(), expected);

    let report = h.orchestrator.tick(now + Duration::minutes(2)).unwrap();
    assert_eq!(report.week, Some(2));
    assert!(!report.week_completed);
    assert_eq!(h.hooks.events(), expected);
}

#[test]
fn final_week_completes_the_season() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Final, Some((24, 20))));
    h.orchestrator.tick(kickoff() + Duration::hours(7)).unwrap();

    h.feed.set_week(2, vec![feed_game(&h.games[2], GameStatus::Final, Some((3, 0)))]);
    let report = h.orchestrator.tick(kickoff() + Duration::days(7) + Duration::hours(4)).unwrap();
    assert!(report.week_completed);
    assert!(report.season_completed);
    assert_eq!(report.picks_locked, 2);

    let events = h.hooks.events();
    assert!(events.contains(&HookEvent::WeekStarted(2)));
    assert_eq!(
        events.last(),
        Some(&HookEvent::SeasonEnded {
            champions: vec![1]
        })
    );
}

#[test]
fn feed_failure_aborts_the_tick_without_writes() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::InProgress, Some((7, 0))), (GameStatus::Pregame, None));
    h.feed.fail_with(Some("connection refused"));

    let err = h.orchestrator.tick(kickoff() + Duration::minutes(5)).unwrap_err();
    assert!(matches!(err, Error::FeedUnavailable(_)));
    assert_eq!(h.stored(1).status, GameStatus::Pregame);
    let pick = store::load_pick(h.orchestrator.connection(), 2, 1).unwrap().unwrap();
    assert!(!pick.missed);
    assert!(h.hooks.events().is_empty());
}

#[test]
fn slow_feed_times_out_before_any_mutation() {
    let mut h = Harness::new(PoolConfig {
        feed_timeout: StdDuration::from_millis(50),
        ..PoolConfig::default()
    });
    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Final, Some((24, 20))));
    h.feed.set_delay(Some(StdDuration::from_millis(400)));

    let err = h.orchestrator.tick(kickoff() + Duration::hours(7)).unwrap_err();
    assert!(matches!(err, Error::FeedUnavailable(_)));
    assert_eq!(h.stored(1).status, GameStatus::Pregame);
    assert_eq!(h.stored(2).status, GameStatus::Pregame);
    assert!(store::load_weekly_standings(h.orchestrator.connection(), 1)
        .unwrap()
        .is_empty());
}

#[test]
fn unmatched_and_scoreless_games_are_skipped_not_fatal() {
    let mut h = Harness::new(PoolConfig::default());
    let stranger = Game::scheduled(99, 1, 40, 41, kickoff());
    h.feed.set_week(
        1,
        vec![
            feed_game(&h.games[0], GameStatus::Final, None),
            feed_game(&h.games[1], GameStatus::InProgress, Some((0, 3))),
            feed_game(&stranger, GameStatus::InProgress, Some((0, 0))),
        ],
    );

    let report = h.orchestrator.tick(kickoff() + Duration::hours(4)).unwrap();
    assert_eq!(report.inconsistencies.len(), 2);
    assert_eq!(report.games_seen, 2);
    assert_eq!(h.stored(1).status, GameStatus::Pregame);
    assert_eq!(h.stored(2).status, GameStatus::InProgress);
    assert_eq!(h.stored(2).visitor_score, Some(3));
}

#[test]
fn final_never_regresses() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Pregame, None));
    h.orchestrator.tick(kickoff() + Duration::hours(2)).unwrap();

    h.week1((GameStatus::InProgress, Some((21, 14))), (GameStatus::Pregame, None));
    let report = h.orchestrator.tick(kickoff() + Duration::hours(2)).unwrap();
    assert_eq!(report.inconsistencies.len(), 1);
    assert_eq!(h.stored(1).status, GameStatus::Final);
}

#[test]
fn heal_season_catches_up_without_notifications() {
    let mut h = Harness::new(PoolConfig::default());
    h.week1((GameStatus::Final, Some((21, 14))), (GameStatus::Final, Some((24, 20))));
    h.feed.set_week(2, vec![feed_game(&h.games[2], GameStatus::InProgress, Some((0, 7)))]);

    let report = h.orchestrator.heal_season(kickoff() + Duration::days(7) + Duration::hours(1)).unwrap();
    assert_eq!(report.week, Some(2));
    assert_eq!(report.finals, vec![1, 2]);
    // User 2's blank pick on game 1 plus both blanks on game 3.
    assert_eq!(report.picks_locked, 3);
    assert!(report.recompute_failures.is_empty());
    assert!(h.hooks.events().is_empty());
    assert_eq!(h.stored(3).status, GameStatus::InProgress);

    // Week 1 went final during the outage and has its own table now.
    let conn = h.orchestrator.connection();
    let weekly = store::load_weekly_standings(conn, 1).unwrap();
    assert_eq!(weekly.len(), 2);
    assert_eq!(weekly[0].user_id, 1);
    assert_eq!(weekly[0].last_score, Some(44));
    assert!(weekly.iter().all(|r| r.week_final));
    assert!(store::week_settled(conn, 1).unwrap());
    let overall = store::load_overall_standings(conn).unwrap();
    assert_eq!(overall.iter().find(|r| r.user_id == 1).unwrap().points_earned, 3);
}
