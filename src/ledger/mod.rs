//! The vote ledger: eligibility checks, ballot status and the vote-casting transaction.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, Document},
    options::{
        Acknowledgment, FindOneAndUpdateOptions, ReadConcern, ReturnDocument, TransactionOptions,
        WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::vote::{BallotStatus, Eligibility, VoteRecord},
    common::window::Clock,
    db::{
        campaign::Campaign,
        candidate::Candidate,
        position::Position,
        vote::{Vote, VoteCore},
        voter::Voter,
    },
    mongodb::{
        errors::is_duplicate_key_error,
        transaction::{finish, retry_transient},
        Coll, Id,
    },
};

pub mod rules;
pub mod tally;

pub use rules::{BallotSnapshot, Missing, VoteRejection};

use rules::votes_remaining;

/// A single vote a member wants to cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub voter_id: Id,
    pub campaign_id: Id,
    pub position_id: Id,
    pub candidate_id: Id,
}

/// Owns every write to the votes collection.
///
/// Placed in Rocket's managed state by the database fairing.
pub struct VoteLedger {
    client: Client,
    db: Database,
    clock: Arc<dyn Clock>,
    global_quota: u32,
    retry_window: Duration,
}

impl VoteLedger {
    pub fn new(
        client: Client,
        db: Database,
        clock: Arc<dyn Clock>,
        global_quota: u32,
        retry_window: Duration,
    ) -> Self {
        Self {
            client,
            db,
            clock,
            global_quota,
            retry_window,
        }
    }

    /// The current time according to the ledger's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Advisory check of whether the voter could vote for the position right now.
    ///
    /// Reads outside any transaction; the writer re-checks everything.
    pub async fn check_eligibility(
        &self,
        voter_id: Id,
        campaign_id: Id,
        position_id: Id,
    ) -> Result<Eligibility> {
        let campaign = Coll::<Campaign>::from_db(&self.db)
            .find_one(campaign_id.as_doc(), None)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Campaign))?;
        Coll::<Position>::from_db(&self.db)
            .find_one(position_id.as_doc(), None)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Position))?;

        let scope = campaign.scope_key();
        let votes = Coll::<Vote>::from_db(&self.db);
        let position_taken = votes
            .count_documents(position_filter(voter_id, position_id, &scope), None)
            .await?;
        let votes_used = votes
            .count_documents(scope_filter(voter_id, &scope), None)
            .await?;

        let snapshot = BallotSnapshot {
            window: campaign.window(self.now()),
            position_taken,
            votes_used,
            quota: campaign.quota(self.global_quota),
        };
        Ok(rules::check(snapshot).into())
    }

    /// How much of their quota the voter has used in this campaign's scope.
    pub async fn ballot_status(&self, voter_id: Id, campaign_id: Id) -> Result<BallotStatus> {
        let campaign = Coll::<Campaign>::from_db(&self.db)
            .find_one(campaign_id.as_doc(), None)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Campaign))?;

        let scope = campaign.scope_key();
        let cast: Vec<Vote> = Coll::<Vote>::from_db(&self.db)
            .find(scope_filter(voter_id, &scope), None)
            .await?
            .try_collect()
            .await?;
        let positions_voted: BTreeSet<Id> = cast.iter().map(|vote| vote.position_id).collect();

        let window = campaign.window(self.now());
        let quota = campaign.quota(self.global_quota);
        let votes_used = cast.len() as u64;
        let votes_remaining = votes_remaining(votes_used, quota);
        Ok(BallotStatus {
            campaign_id: campaign.id.into(),
            window,
            quota,
            votes_used,
            votes_remaining,
            positions_voted: positions_voted.into_iter().map(Into::into).collect(),
            can_vote_now: window.is_open() && votes_remaining > 0,
        })
    }

    /// Atomically validate and record a vote.
    ///
    /// Write conflicts with a concurrent transaction restart the whole
    /// transaction after a randomised backoff, so the loser re-reads the
    /// winner's vote and is rejected by the rules.
    pub async fn cast_vote(&self, ballot: Ballot) -> Result<VoteRecord> {
        let result = retry_transient("Vote transaction", self.retry_window, move || {
            self.transaction(ballot)
        })
        .await;

        match &result {
            Ok(record) => info!(
                "Vote {} recorded in campaign {} ({}/{} used)",
                record.vote.id, ballot.campaign_id, record.votes_used, record.quota
            ),
            Err(Error::Vote(rejection)) => debug!(
                "Vote in campaign {} rejected: {}",
                ballot.campaign_id,
                rejection.kind()
            ),
            Err(_) => {}
        }
        result
    }

    /// Run one vote transaction from start to commit.
    async fn transaction(&self, ballot: Ballot) -> Result<VoteRecord> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(transaction_options()).await?;

        let result = self.attempt(&ballot, &mut session).await;
        finish(&mut session, result).await
    }

    /// One pass of the vote transaction. Every read and write goes through `session`.
    async fn attempt(&self, ballot: &Ballot, session: &mut ClientSession) -> Result<VoteRecord> {
        let now = self.now();
        let voters = Coll::<Voter>::from_db(&self.db);
        let votes = Coll::<Vote>::from_db(&self.db);

        // Touch the voter first so concurrent transactions for the same voter
        // conflict before either can insert.
        let lock = doc! { "$inc": { "ledger_seq": 1_i64 } };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let voter = voters
            .find_one_and_update_with_session(
                ballot.voter_id.as_doc(),
                lock.clone(),
                options,
                session,
            )
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Voter))?;

        let campaign = Coll::<Campaign>::from_db(&self.db)
            .find_one_with_session(ballot.campaign_id.as_doc(), None, session)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Campaign))?;
        let window = campaign.window(now);
        rules::check_window(window)?;

        Coll::<Position>::from_db(&self.db)
            .find_one_with_session(ballot.position_id.as_doc(), None, session)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Position))?;

        // Touch the candidate too, so deleting or moving them conflicts with
        // this vote instead of leaving it orphaned.
        let candidate_filter = doc! {
            "_id": ballot.candidate_id,
            "position_id": ballot.position_id,
            "campaign_id": ballot.campaign_id,
        };
        Coll::<Candidate>::from_db(&self.db)
            .find_one_and_update_with_session(candidate_filter, lock, None, session)
            .await?
            .ok_or(VoteRejection::NotFound(Missing::Candidate))?;

        let scope = campaign.scope_key();
        let quota = campaign.quota(self.global_quota);
        let position_taken = votes
            .count_documents_with_session(
                position_filter(ballot.voter_id, ballot.position_id, &scope),
                None,
                session,
            )
            .await?;
        let votes_used = votes
            .count_documents_with_session(scope_filter(ballot.voter_id, &scope), None, session)
            .await?;
        rules::check(BallotSnapshot {
            window,
            position_taken,
            votes_used,
            quota,
        })?;

        let vote = Vote {
            id: Id::new(),
            vote: VoteCore {
                voter_id: ballot.voter_id,
                candidate_id: ballot.candidate_id,
                position_id: ballot.position_id,
                campaign_id: ballot.campaign_id,
                scope: scope.clone(),
                region: voter.region,
                cast_at: now,
            },
        };
        if let Err(e) = votes.insert_one_with_session(&vote, None, session).await {
            return Err(if is_duplicate_key_error(&e) {
                VoteRejection::DuplicatePosition.into()
            } else {
                e.into()
            });
        }

        let votes_used = votes_used + 1;
        let completed = votes_used == u64::from(quota);
        if completed {
            // Only ever set, never cleared.
            let update = doc! {
                "$set": { "has_fully_voted": true },
                "$addToSet": { "completed_scopes": scope.as_str() },
            };
            voters
                .update_one_with_session(ballot.voter_id.as_doc(), update, None, session)
                .await?;
        }

        Ok(VoteRecord {
            vote: vote.into(),
            quota,
            votes_used,
            votes_remaining: votes_remaining(votes_used, quota),
            completed,
        })
    }
}

/// Votes by this voter for this position within the scope.
fn position_filter(voter_id: Id, position_id: Id, scope: &str) -> Document {
    doc! {
        "voter_id": voter_id,
        "position_id": position_id,
        "scope": scope,
    }
}

/// Votes by this voter within the scope.
fn scope_filter(voter_id: Id, scope: &str) -> Document {
    doc! {
        "voter_id": voter_id,
        "scope": scope,
    }
}

fn transaction_options() -> TransactionOptions {
    TransactionOptions::builder()
        .read_concern(ReadConcern::snapshot())
        .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
        .build()
}
