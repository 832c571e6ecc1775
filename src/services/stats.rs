//! Interval-average aggregation.
//!
//! Turns the provider's raw per-minute-bucket event counters into
//! half-by-half per-game averages. Pure functions, no I/O; this is the one
//! place where averages are rounded, at the boundary between raw counters
//! and persisted stats.

use std::collections::HashMap;

use crate::services::provider::{MinuteBucket, PredictionTeam};

const FIRST_HALF: [&str; 3] = ["0-15", "16-30", "31-45"];
const SECOND_HALF: [&str; 3] = ["46-60", "61-75", "76-90"];

/// Per-team averages for one venue split plus the venue-independent card
/// averages. `None` means the provider reported no data for that half, which
/// is not the same thing as an average of zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamAverages {
    pub scored_home_first_half: Option<f64>,
    pub scored_home_second_half: Option<f64>,
    pub scored_away_first_half: Option<f64>,
    pub scored_away_second_half: Option<f64>,
    pub conceded_home_first_half: Option<f64>,
    pub conceded_home_second_half: Option<f64>,
    pub conceded_away_first_half: Option<f64>,
    pub conceded_away_second_half: Option<f64>,
    pub yellow_cards_first_half: Option<f64>,
    pub yellow_cards_second_half: Option<f64>,
}

/// First-half and second-half per-game averages for one bucket map.
///
/// Each half's average exists only when at least one of its three buckets
/// carries a non-null total; a bucket reported as zero counts as data. Null
/// buckets contribute 0 to the sum once the half has any data at all.
pub fn interval_averages(
    buckets: &HashMap<String, MinuteBucket>,
    games_played: i64,
) -> (Option<f64>, Option<f64>) {
    if games_played == 0 {
        return (None, None);
    }
    (
        half_average(buckets, &FIRST_HALF, games_played),
        half_average(buckets, &SECOND_HALF, games_played),
    )
}

fn half_average(
    buckets: &HashMap<String, MinuteBucket>,
    labels: &[&str; 3],
    games_played: i64,
) -> Option<f64> {
    let has_data = labels
        .iter()
        .any(|label| buckets.get(*label).and_then(|b| b.total).is_some());
    if !has_data {
        return None;
    }
    let sum: i64 = labels
        .iter()
        .map(|label| buckets.get(*label).and_then(|b| b.total).unwrap_or(0))
        .sum();
    Some(round2(sum as f64 / games_played as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// All relevant averages for one team of a prediction document.
///
/// Goal averages use the games played in that venue split only, and are
/// computed only when that split has games. Card averages always use total
/// games (home plus away) and only exist when the team has played at all.
pub fn team_averages(team: &PredictionTeam) -> TeamAverages {
    let mut stats = TeamAverages::default();

    let home_games = team.league.fixtures.played.home.unwrap_or(0);
    let away_games = team.league.fixtures.played.away.unwrap_or(0);

    let scored = &team.league.goals.scored.minute;
    let conceded = &team.league.goals.against.minute;

    if home_games > 0 {
        let (first, second) = interval_averages(scored, home_games);
        stats.scored_home_first_half = first;
        stats.scored_home_second_half = second;

        let (first, second) = interval_averages(conceded, home_games);
        stats.conceded_home_first_half = first;
        stats.conceded_home_second_half = second;
    }

    if away_games > 0 {
        let (first, second) = interval_averages(scored, away_games);
        stats.scored_away_first_half = first;
        stats.scored_away_second_half = second;

        let (first, second) = interval_averages(conceded, away_games);
        stats.conceded_away_first_half = first;
        stats.conceded_away_second_half = second;
    }

    let total_games = home_games + away_games;
    if total_games > 0 {
        let (first, second) = interval_averages(&team.league.cards.yellow, total_games);
        stats.yellow_cards_first_half = first;
        stats.yellow_cards_second_half = second;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(total: Option<i64>) -> MinuteBucket {
        MinuteBucket {
            total,
            percentage: None,
        }
    }

    fn buckets(entries: &[(&str, Option<i64>)]) -> HashMap<String, MinuteBucket> {
        entries
            .iter()
            .map(|(label, total)| (label.to_string(), bucket(*total)))
            .collect()
    }

    #[test]
    fn zero_games_yields_no_averages() {
        let data = buckets(&[("0-15", Some(4)), ("46-60", Some(2))]);
        assert_eq!(interval_averages(&data, 0), (None, None));
    }

    #[test]
    fn all_null_half_is_none_not_zero() {
        let data = buckets(&[
            ("0-15", None),
            ("16-30", None),
            ("31-45", None),
            ("46-60", Some(1)),
        ]);
        let (first, second) = interval_averages(&data, 3);
        assert_eq!(first, None);
        assert_eq!(second, Some(0.33));
    }

    #[test]
    fn null_bucket_counts_as_zero_once_half_has_data() {
        let data = buckets(&[("0-15", Some(2)), ("16-30", Some(0)), ("31-45", None)]);
        let (first, second) = interval_averages(&data, 2);
        assert_eq!(first, Some(1.0));
        assert_eq!(second, None);
    }

    #[test]
    fn zero_total_is_data() {
        let data = buckets(&[("0-15", Some(0)), ("16-30", None), ("31-45", None)]);
        let (first, _) = interval_averages(&data, 5);
        assert_eq!(first, Some(0.0));
    }

    #[test]
    fn missing_buckets_are_treated_as_null() {
        let data = buckets(&[("46-60", Some(3))]);
        let (first, second) = interval_averages(&data, 2);
        assert_eq!(first, None);
        assert_eq!(second, Some(1.5));
    }

    #[test]
    fn averages_round_to_two_decimals() {
        let data = buckets(&[("0-15", Some(1)), ("16-30", Some(1)), ("31-45", None)]);
        let (first, _) = interval_averages(&data, 3);
        assert_eq!(first, Some(0.67));
    }

    #[test]
    fn extended_buckets_are_ignored() {
        let data = buckets(&[("46-60", Some(2)), ("91-105", Some(9)), ("106-120", Some(9))]);
        let (first, second) = interval_averages(&data, 2);
        assert_eq!(first, None);
        assert_eq!(second, Some(1.0));
    }

    #[test]
    fn team_averages_split_by_venue_and_use_total_games_for_cards() {
        let raw = r#"{
            "league": {
                "fixtures": {"played": {"home": 2, "away": 0, "total": 2}},
                "goals": {
                    "for": {"minute": {"0-15": {"total": 4, "percentage": "100%"}}},
                    "against": {"minute": {"76-90": {"total": 2, "percentage": "100%"}}}
                },
                "cards": {"yellow": {"31-45": {"total": 3, "percentage": "100%"}}}
            }
        }"#;
        let team: PredictionTeam = serde_json::from_str(raw).unwrap();
        let stats = team_averages(&team);

        assert_eq!(stats.scored_home_first_half, Some(2.0));
        assert_eq!(stats.scored_home_second_half, None);
        assert_eq!(stats.conceded_home_second_half, Some(1.0));
        // No away games: the away split is never computed.
        assert_eq!(stats.scored_away_first_half, None);
        assert_eq!(stats.conceded_away_second_half, None);
        // Cards divide by total games, not a venue split.
        assert_eq!(stats.yellow_cards_first_half, Some(1.5));
        assert_eq!(stats.yellow_cards_second_half, None);
    }

    #[test]
    fn team_with_no_games_has_no_averages() {
        let team = PredictionTeam::default();
        assert_eq!(team_averages(&team), TeamAverages::default());
    }
}
