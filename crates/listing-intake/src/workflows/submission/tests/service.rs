use std::sync::Barrier;

use super::common::*;
use crate::workflows::matching::BuyerRequest;
use crate::workflows::submission::domain::{AdminAction, AdminId, SubmissionId};
use crate::workflows::submission::error::IntakeError;
use crate::workflows::submission::lifecycle::ModerationRequest;
use crate::workflows::submission::schema::{SchemaVersion, StepKey};

fn approve(harness: &Harness, id: &SubmissionId) {
    harness
        .service
        .moderate(
            id,
            ModerationRequest {
                admin_id: AdminId("mod-1".to_string()),
                action: AdminAction::Approve,
                reason: None,
                existing_post: None,
            },
        )
        .expect("approve");
}

#[test]
fn an_owner_keeps_a_single_active_record() {
    let harness = harness();

    let first = harness
        .service
        .start_or_resume(&owner("owner-1"), Some(SchemaVersion::Extended))
        .expect("first start");
    let second = harness
        .service
        .start_or_resume(&owner("owner-1"), Some(SchemaVersion::Legacy))
        .expect("second start");

    assert!(!first.resumed);
    assert!(second.resumed);
    assert_eq!(first.submission.submission_id, second.submission.submission_id);
    assert_eq!(second.submission.schema, SchemaVersion::Extended);
}

#[test]
fn concurrent_starts_converge_on_one_record() {
    let harness = harness();
    let barrier = Barrier::new(4);

    let ids: Vec<SubmissionId> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = harness.service.clone();
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    service
                        .start_or_resume(&owner("owner-1"), None)
                        .expect("start")
                        .submission
                        .submission_id
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("starter thread"))
            .collect()
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn published_owners_can_start_again() {
    let harness = harness();
    let id = submitted_legacy(&harness, "owner-1");
    approve(&harness, &id);

    let session = harness
        .service
        .start_or_resume(&owner("owner-1"), None)
        .expect("new draft");

    assert!(!session.resumed);
    assert_ne!(session.submission.submission_id, id);
    assert_eq!(session.step.step, StepKey::Welcome);
}

#[test]
fn moderation_queue_is_oldest_first_and_limited() {
    let harness = harness();
    let first = submitted_legacy(&harness, "owner-1");
    let second = submitted_legacy(&harness, "owner-2");
    submitted_legacy(&harness, "owner-3");

    let queue = harness.service.moderation_queue(2).expect("queue");
    let ids: Vec<_> = queue.iter().map(|view| view.submission_id.clone()).collect();
    assert_eq!(ids, vec![first.clone(), second]);

    approve(&harness, &first);
    let queue = harness.service.moderation_queue(10).expect("queue");
    assert_eq!(queue.len(), 2);
    assert!(queue.iter().all(|view| view.status == "submitted"));
}

#[test]
fn lead_matching_only_considers_published_listings() {
    let harness = harness();
    let published = submitted_legacy(&harness, "owner-1");
    approve(&harness, &published);
    submitted_legacy(&harness, "owner-2");

    let request = BuyerRequest {
        id: "req-7".to_string(),
        want: "crm for agencies".to_string(),
        budget: String::new(),
    };
    let leads = harness.service.match_leads(&request).expect("leads");

    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].submission_id, published.to_string());
    assert_eq!(leads[0].request_id, "req-7");
    assert_eq!(leads[0].score, 20);

    let unrelated = BuyerRequest {
        id: "req-8".to_string(),
        want: "telegram bot".to_string(),
        budget: String::new(),
    };
    assert!(harness
        .service
        .match_leads(&unrelated)
        .expect("leads")
        .is_empty());
}

#[test]
fn audit_trail_requires_a_known_record() {
    let harness = harness();
    let id = submitted_legacy(&harness, "owner-1");
    approve(&harness, &id);
    let other = submitted_legacy(&harness, "owner-2");
    harness
        .service
        .moderate(
            &other,
            ModerationRequest {
                admin_id: AdminId("mod-1".to_string()),
                action: AdminAction::Reject,
                reason: Some("duplicate".to_string()),
                existing_post: None,
            },
        )
        .expect("reject");

    assert!(matches!(
        harness
            .service
            .audit_trail(&SubmissionId("sub-missing".to_string())),
        Err(IntakeError::NotFound(_))
    ));
    assert_eq!(harness.service.audit_trail(&id).expect("trail").len(), 1);

    let log = harness.service.audit_log().expect("log");
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].target_submission_id, id);
    assert_eq!(log[1].action, AdminAction::Reject);
    assert_eq!(log[1].comment.as_deref(), Some("duplicate"));
}

#[test]
fn storage_outages_surface_as_repository_errors() {
    let harness = harness_with(UnavailableRepository, intake_config());

    assert!(matches!(
        harness.service.start_or_resume(&owner("owner-1"), None),
        Err(IntakeError::Repository(_))
    ));
    assert!(matches!(
        harness.service.get(&SubmissionId("sub-1".to_string())),
        Err(IntakeError::Repository(_))
    ));
}

#[test]
fn short_form_submits_after_two_answers() {
    let harness = short_form_harness();
    let id = start(&harness, "owner-1", SchemaVersion::Legacy);

    for input in ["start", "Invoice bot", "300"] {
        harness.service.apply(&id, advance(input)).expect("answer");
    }
    let view = harness.service.submit(&id).expect("submit");

    assert_eq!(view.status, "submitted");
    assert_eq!(view.revision, 1);
}
