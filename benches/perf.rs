use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pickem_standings::aggregate::{WeekSnapshot, overall_standings, weekly_standings};
use pickem_standings::config::PoolConfig;
use pickem_standings::model::{Game, GameStatus, Pick, Tiebreaker};
use pickem_standings::ranking::{OverallKey, assign_ranks};

const USERS: i64 = 500;
const GAMES_PER_WEEK: i64 = 16;
const WEEKS: u32 = 18;

fn season() -> (Vec<Game>, Vec<Pick>, Vec<Tiebreaker>) {
    let start = Utc.with_ymd_and_hms(2026, 9, 10, 17, 0, 0).unwrap();
    let mut games = Vec::new();
    let mut picks = Vec::new();
    let mut tiebreakers = Vec::new();
    for week in 1..=WEEKS {
        for slot in 0..GAMES_PER_WEEK {
            let id = i64::from(week) * 100 + slot;
            let kickoff = start + Duration::days(7 * i64::from(week - 1)) + Duration::hours(slot);
            let mut game = Game::scheduled(id, week, slot * 2, slot * 2 + 1, kickoff);
            game.status = GameStatus::Final;
            game.home_score = Some(((id * 7) % 35) as u32);
            game.visitor_score = Some(((id * 11) % 31) as u32);
            for user in 1..=USERS {
                picks.push(Pick {
                    user_id: user,
                    game_id: id,
                    team_id: Some(if (user + id) % 3 == 0 {
                        game.visitor_team_id
                    } else {
                        game.home_team_id
                    }),
                    points: Some(((user + slot) % GAMES_PER_WEEK + 1) as u32),
                    missed: false,
                });
            }
            games.push(game);
        }
        for user in 1..=USERS {
            tiebreakers.push(Tiebreaker {
                user_id: user,
                week,
                score: Some((user % 60) as u32),
                submitted: true,
            });
        }
    }
    (games, picks, tiebreakers)
}

fn bench_assign_ranks(c: &mut Criterion) {
    let items: Vec<(i64, u32, u32)> = (1..=10_000)
        .map(|user| (user, ((user * 37) % 200) as u32, ((user * 13) % 16) as u32))
        .collect();
    c.bench_function("assign_ranks_10k", |b| {
        b.iter(|| {
            let ranked = assign_ranks(
                black_box(items.clone()),
                |(_, earned, correct)| OverallKey::new(*earned, *correct),
                |(user, _, _)| *user,
            );
            black_box(ranked.len());
        })
    });
}

fn bench_weekly_standings(c: &mut Criterion) {
    let (games, picks, tiebreakers) = season();
    let snapshot = WeekSnapshot {
        week: 1,
        games: games.iter().filter(|g| g.week == 1).cloned().collect(),
        picks: picks.iter().filter(|p| p.game_id < 200).cloned().collect(),
        tiebreakers: tiebreakers.iter().filter(|t| t.week == 1).cloned().collect(),
    };
    let cfg = PoolConfig::default();
    c.bench_function("weekly_standings_500_users", |b| {
        b.iter(|| {
            let rows = weekly_standings(black_box(&snapshot), &cfg);
            black_box(rows.len());
        })
    });
}

fn bench_overall_standings(c: &mut Criterion) {
    let (games, picks, _) = season();
    let cfg = PoolConfig::default();
    c.bench_function("overall_standings_full_season", |b| {
        b.iter(|| {
            let rows = overall_standings(WEEKS, black_box(&games), black_box(&picks), &cfg);
            black_box(rows.len());
        })
    });
}

criterion_group!(
    benches,
    bench_assign_ranks,
    bench_weekly_standings,
    bench_overall_standings
);
criterion_main!(benches);
