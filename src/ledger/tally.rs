//! Vote counting for results pages.

use std::cmp::Reverse;
use std::collections::HashMap;

use mongodb::{
    bson::{doc, from_document},
    Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    api::results::{CandidateResult, PositionResults},
    db::{candidate::Candidate, position::Position, vote::Vote},
    mongodb::{Coll, Id},
};

/// One row of the counting aggregation.
#[derive(Debug, Deserialize)]
struct CandidateCount {
    #[serde(rename = "_id")]
    candidate_id: Id,
    count: u64,
}

/// Tally one campaign, or every campaign if none is given.
///
/// Reads outside any transaction, so a vote committing concurrently may or
/// may not be included.
pub async fn tally(db: &Database, campaign_id: Option<Id>) -> Result<Vec<PositionResults>> {
    let filter = campaign_id
        .map(|id| doc! { "campaign_id": id })
        .unwrap_or_default();

    let positions: Vec<Position> = Coll::<Position>::from_db(db)
        .find(None, None)
        .await?
        .try_collect()
        .await?;
    let candidates: Vec<Candidate> = Coll::<Candidate>::from_db(db)
        .find(filter.clone(), None)
        .await?
        .try_collect()
        .await?;

    let pipeline = vec![
        doc! { "$match": filter },
        doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
    ];
    let mut rows = Coll::<Vote>::from_db(db).aggregate(pipeline, None).await?;
    let mut counts = HashMap::new();
    while let Some(row) = rows.try_next().await? {
        let row: CandidateCount = from_document(row)?;
        counts.insert(row.candidate_id, row.count);
    }

    Ok(rank(positions, candidates, &counts))
}

/// Group candidates under their positions and order everything for display.
///
/// Positions go by display order then name. Candidates go by votes (most
/// first), then display order, then name. Candidates without votes count zero
/// and positions without candidates are kept with an empty list.
pub fn rank(
    mut positions: Vec<Position>,
    candidates: Vec<Candidate>,
    counts: &HashMap<Id, u64>,
) -> Vec<PositionResults> {
    positions.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));

    let mut by_position: HashMap<Id, Vec<CandidateResult>> = HashMap::new();
    for candidate in candidates {
        let votes = counts.get(&candidate.id).copied().unwrap_or(0);
        by_position
            .entry(candidate.position_id)
            .or_default()
            .push(CandidateResult {
                candidate: candidate.into(),
                votes,
            });
    }

    positions
        .into_iter()
        .map(|position| {
            let mut candidates = by_position.remove(&position.id).unwrap_or_default();
            candidates.sort_by(|a, b| {
                (Reverse(a.votes), a.candidate.order, &a.candidate.name).cmp(&(
                    Reverse(b.votes),
                    b.candidate.order,
                    &b.candidate.name,
                ))
            });
            PositionResults {
                position: position.into(),
                candidates,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::model::db::{candidate::CandidateCore, position::PositionCore};

    use super::*;

    fn position(core: PositionCore) -> Position {
        Position {
            id: Id::new(),
            position: core,
        }
    }

    fn candidate(name: &str, order: u32, position: &Position, campaign_id: Id) -> Candidate {
        Candidate {
            id: Id::new(),
            candidate: CandidateCore::example(name, order, position.id, campaign_id),
        }
    }

    fn names(results: &PositionResults) -> Vec<(&str, u64)> {
        results
            .candidates
            .iter()
            .map(|c| (c.candidate.name.as_str(), c.votes))
            .collect()
    }

    #[test]
    fn ranks_by_votes_then_order() {
        let campaign = Id::new();
        let president = position(PositionCore::president());
        let a = candidate("Alvarez", 1, &president, campaign);
        let b = candidate("Benitez", 2, &president, campaign);
        let c = candidate("Castro", 3, &president, campaign);
        let counts = HashMap::from([(a.id, 1), (b.id, 4), (c.id, 1)]);

        let results = rank(vec![president], vec![c, a, b], &counts);
        assert_eq!(results.len(), 1);
        assert_eq!(
            names(&results[0]),
            vec![("Benitez", 4), ("Alvarez", 1), ("Castro", 1)]
        );
    }

    #[test]
    fn includes_zero_vote_candidates_and_empty_positions() {
        let campaign = Id::new();
        let president = position(PositionCore::president());
        let treasurer = position(PositionCore::treasurer());
        let auditor = position(PositionCore::auditor());
        let a = candidate("Alvarez", 1, &president, campaign);
        let t = candidate("Torres", 1, &treasurer, campaign);
        let counts = HashMap::from([(a.id, 2)]);

        let results = rank(
            vec![auditor.clone(), treasurer.clone(), president.clone()],
            vec![t, a],
            &counts,
        );
        let order: Vec<_> = results.iter().map(|r| r.position.name.as_str()).collect();
        assert_eq!(order, vec!["President", "Treasurer", "Auditor"]);
        assert_eq!(names(&results[0]), vec![("Alvarez", 2)]);
        assert_eq!(names(&results[1]), vec![("Torres", 0)]);
        assert!(results[2].candidates.is_empty());
    }

    #[test]
    fn equal_order_positions_sort_by_name() {
        let mut x = PositionCore::secretary();
        let mut y = PositionCore::treasurer();
        x.order = 1;
        y.order = 1;
        let results = rank(vec![position(y), position(x)], vec![], &HashMap::new());
        let order: Vec<_> = results.iter().map(|r| r.position.name.as_str()).collect();
        assert_eq!(order, vec!["Secretary", "Treasurer"]);
    }
}
