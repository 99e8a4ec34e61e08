// Integration tests for the filter and merge passes.
//
// These run the same sequence the export binary does: filter a player
// universe, read ranking CSVs, merge them, then inspect the enriched roster,
// the statistics and the emitted events.

use adpmerge_core::events::MergeEvent;
use adpmerge_core::filter::filter_players;
use adpmerge_core::merge::{merge_rankings, MergeOptions, UnmatchedReason};
use adpmerge_core::player::RosterEntry;
use adpmerge_core::ranking::{RankingSource, RankingTable};
use serde_json::{json, Map, Value};

// ===========================================================================
// Test helpers
// ===========================================================================

fn universe() -> Map<String, Value> {
    let value = json!({
        "4046": { "full_name": "Patrick Mahomes", "position": "QB", "team": "KC",
                  "status": "Active", "fantasy_positions": ["QB"] },
        "4984": { "full_name": "Josh Allen", "position": "QB", "team": "BUF",
                  "status": "Active", "fantasy_positions": ["QB"] },
        "1379": { "full_name": "Josh Allen", "position": "LB", "team": "JAX",
                  "status": "Active", "fantasy_positions": ["LB"] },
        "5848": { "full_name": "Marquise Brown", "position": "WR", "team": "KC",
                  "status": "Active", "fantasy_positions": ["WR"] },
        "6794": { "full_name": "Justin Jefferson", "position": "WR", "team": "MIN",
                  "status": "Active", "fantasy_positions": ["WR"] },
        "4068": { "full_name": "Mike Williams", "position": "WR", "team": "PIT",
                  "status": "Active", "fantasy_positions": ["WR"] },
        "4037": { "full_name": "Mike Williams", "position": "WR", "team": "NYJ",
                  "status": "Active", "fantasy_positions": ["WR"] },
        "8151": { "full_name": "Kenneth Walker", "position": "RB", "team": "SEA",
                  "status": "Active", "fantasy_positions": ["RB"] },
        "KC":   { "first_name": "Kansas City", "last_name": "Chiefs", "position": "DEF",
                  "team": "KC", "fantasy_positions": ["DEF"] },
        "1000": { "full_name": "Gone Guy", "status": "Inactive", "fantasy_positions": ["RB"] },
        "1001": "not a record"
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

const FFPC_CSV: &str = "\
Name,Position,Team,ADP,ETR_Rank,Delta,Pos_Rank
Patrick Mahomes,QB,KC,30.2,28,2.2,QB2
Josh Allen,QB,BUF,25.0,22,3.0,QB1
Hollywood Brown,WR,KC,95.0,90,5.0,WR40
Mike Williams,WR,PIT,150.3,160,-9.7,WR70
Ken Walker,RB,SEA,40.0,42,-2.0,RB15
Kansas City Chiefs,DST,KC,180.0,175,5.0,DST3
Justin Jeffersen,WR,MIN,1.5,1,-0.5,WR1
Nobody Atall,WR,FA,300,,,
";

const UD_CSV: &str = "\
Name,Pos,Team,ADP,ETR_Rank,Delta,Pos_Rank
Justin Jefferson,WR,MIN,2.0,2,0.0,WR2
Mike Williams,WR,LAR,170.0,180,-10.0,WR80
,WR,DAL,10.0,9,1.0,WR5
";

fn tables() -> Vec<RankingTable> {
    vec![
        RankingTable::from_reader(RankingSource::ffpc(), FFPC_CSV.as_bytes()).unwrap(),
        RankingTable::from_reader(RankingSource::underdog(), UD_CSV.as_bytes()).unwrap(),
    ]
}

fn find<'a>(roster: &'a [RosterEntry], id: &str) -> &'a RosterEntry {
    roster.iter().find(|p| p.sleeper_id == id).unwrap()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn filter_then_merge_end_to_end() {
    let mut events: Vec<MergeEvent> = Vec::new();
    let filtered = filter_players(&universe(), None, &mut events);
    assert_eq!(filtered.stats.processed, 11);
    assert_eq!(filtered.stats.kept, 8);
    assert_eq!(filtered.stats.invalid_fantasy_position, 1);
    assert_eq!(filtered.stats.inactive, 1);
    assert_eq!(filtered.stats.data_errors, 1);

    let outcome = merge_rankings(
        filtered.roster,
        &tables(),
        &MergeOptions::default(),
        &mut events,
    );
    let roster = &outcome.roster;

    // Same name on the other side of the ball was filtered out, so the QB
    // is an unambiguous exact match.
    let allen = find(roster, "4984").ranking("ffpc").unwrap();
    assert_eq!(allen.adp, Some(25.0));
    assert_eq!(allen.pos_rank.as_deref(), Some("QB1"));

    // Nickname table links both spellings.
    assert_eq!(find(roster, "5848").ranking("ffpc").unwrap().adp, Some(95.0));
    assert_eq!(find(roster, "8151").ranking("ffpc").unwrap().rank, Some(42.0));

    // Defense matched through first + last name.
    assert_eq!(find(roster, "KC").ranking("ffpc").unwrap().adp, Some(180.0));

    // Team breaks the Mike Williams tie for FFPC; Underdog's LAR row fits
    // neither and stays unmatched.
    assert!(find(roster, "4068").ranking("ffpc").is_some());
    assert!(find(roster, "4037").ranking("ffpc").is_none());
    assert!(find(roster, "4068").ranking("ud").is_none());

    // Typo resolved by similarity.
    let jj = find(roster, "6794");
    assert_eq!(jj.ranking("ffpc").unwrap().adp, Some(1.5));
    assert_eq!(jj.ranking("ud").unwrap().adp, Some(2.0));

    let ffpc = outcome.stats.source("ffpc").unwrap();
    assert_eq!(ffpc.total, 8);
    assert_eq!(ffpc.exact_matched, 6);
    assert_eq!(ffpc.fuzzy_matched, 1);
    assert_eq!(ffpc.unmatched.len(), 1);
    assert_eq!(ffpc.unmatched[0].name, "Nobody Atall");
    assert_eq!(ffpc.unmatched[0].reason, UnmatchedReason::NoMatch);

    let ud = outcome.stats.source("ud").unwrap();
    assert_eq!(ud.exact_matched, 1);
    let reasons: Vec<UnmatchedReason> = ud.unmatched.iter().map(|u| u.reason).collect();
    assert_eq!(
        reasons,
        vec![UnmatchedReason::Ambiguous, UnmatchedReason::BlankName]
    );
    assert_eq!(ud.unmatched[1].team, "DAL");

    assert_eq!(outcome.stats.roster_size, 8);
    assert_eq!(outcome.stats.players_with_rankings, 7);

    assert!(events.iter().any(|e| matches!(
        e,
        MergeEvent::FuzzyMatched { source, roster_name, .. }
            if source == "ffpc" && roster_name == "Justin Jefferson"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        MergeEvent::AmbiguousExactMatch { source, resolved: false, .. } if source == "ud"
    )));
}

#[test]
fn rerunning_merge_is_stable() {
    let filtered = filter_players(&universe(), None, &mut Vec::<MergeEvent>::new());
    let tables = tables();
    let once = merge_rankings(
        filtered.roster,
        &tables,
        &MergeOptions::default(),
        &mut Vec::<MergeEvent>::new(),
    );
    let twice = merge_rankings(
        once.roster.clone(),
        &tables,
        &MergeOptions::default(),
        &mut Vec::<MergeEvent>::new(),
    );
    assert_eq!(once, twice);
}

#[test]
fn league_positions_narrow_the_roster() {
    let positions = vec!["QB".to_string(), "SUPER_FLEX".to_string()];
    let filtered = filter_players(&universe(), Some(positions.as_slice()), &mut Vec::<MergeEvent>::new());
    assert_eq!(filtered.stats.kept, 2);
    assert!(filtered.roster.iter().all(|p| p.position == "QB"));
}
