//! End-to-end runs of the sync engine against a mock feed and a real
//! temporary document store and state file.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use nfesync_engine::{
    record_cancellation, CancellationOutcome, FixedClock, MockTransport, RetryConfig, SyncConfig,
    SyncEngine, SyncOutcome, SyncReport,
};
use nfesync_protocol::{AccessKey, Environment};
use nfesync_testkit::prelude::*;
use proptest::prelude::*;

fn start_of_day() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn engine_for(ws: &TestWorkspace, mock: MockTransport) -> SyncEngine<MockTransport, FixedClock> {
    let config = SyncConfig::new().with_retry(RetryConfig::no_retry());
    SyncEngine::new(config, mock, ws.store.clone())
        .with_state_file(ws.state_file.clone())
        .with_clock(FixedClock::new(start_of_day()))
}

fn report(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::Blocked(block) => panic!("blocked: {}", block.message()),
    }
}

#[test]
fn drain_cooldown_then_resume() {
    let ws = TestWorkspace::new();
    let taxpayer = sample_taxpayer();
    let mock = MockTransport::with_responses([
        ResponseBuilder::documents_found(42, 42)
            .soap()
            .document(41, "resNFe_v1.01.xsd", &summary_xml(SAMPLE_KEY))
            .document(42, "procEventoNFe_v1.00.xsd", &event_xml(SAMPLE_KEY, "110111", 1))
            .build(),
        ResponseBuilder::no_documents().last_sequence(42).max_sequence(42).build(),
        ResponseBuilder::documents_found(43, 43)
            .document(43, "procNFe_v4.00.xsd", &complete_xml(SAMPLE_KEY))
            .build(),
    ]);
    let engine = engine_for(&ws, mock);

    // First run drains the feed on a 138 page: no cooldown.
    let mut state = ws.state_file.load().unwrap();
    let first = report(engine.sync(&taxpayer, &mut state, None, |_| {}).unwrap());
    assert_eq!(first.documents.len(), 2);
    assert!(first.cooldown_until.is_none());
    assert_eq!(
        ws.store.list_pending_summaries(&taxpayer.id).unwrap().into_iter().collect::<Vec<_>>(),
        vec![SAMPLE_KEY.to_string()]
    );

    // Second run sees 137 and arms the cooldown.
    let mut state = ws.state_file.load().unwrap();
    let second = report(engine.sync(&taxpayer, &mut state, None, |_| {}).unwrap());
    assert_eq!(second.status_code(), Some("137"));
    assert_eq!(second.cooldown_until, Some(start_of_day() + Duration::minutes(61)));

    // Within the window the engine refuses to poll.
    let mut state = ws.state_file.load().unwrap();
    engine.clock().advance(Duration::minutes(60));
    assert!(engine.sync(&taxpayer, &mut state, None, |_| {}).unwrap().is_blocked());
    assert_eq!(engine.transport().call_count(), 2);

    // After it, the run resumes from the persisted position.
    engine.clock().advance(Duration::minutes(1));
    let third = report(engine.sync(&taxpayer, &mut state, None, |_| {}).unwrap());
    assert_eq!(third.start_sequence, 42);
    assert_eq!(third.last_sequence, 43);
    assert!(ws.store.list_pending_summaries(&taxpayer.id).unwrap().is_empty());

    let persisted = ws.state_file.load().unwrap();
    assert_eq!(persisted.last_sequence(&taxpayer.id, Environment::Production), 43);
}

#[test]
fn zero_document_pages_still_terminate_at_tip() {
    let ws = TestWorkspace::new();
    let mock = MockTransport::with_responses([
        ResponseBuilder::documents_found(50, 120).build(),
        ResponseBuilder::documents_found(120, 120).build(),
    ]);
    let engine = engine_for(&ws, mock);
    let mut state = ws.state_file.load().unwrap();

    let run = report(engine.sync(&sample_taxpayer(), &mut state, None, |_| {}).unwrap());
    assert_eq!(run.pages, 2);
    assert!(run.documents.is_empty());
    assert_eq!(run.last_sequence, 120);
    assert!(run.cooldown_until.is_none());
}

#[test]
fn taxpayers_share_one_state_file() {
    let ws = TestWorkspace::new();
    let acme = sample_taxpayer();
    let other = taxpayer("OTHER", OTHER_CNPJ, "mg");
    let mock = MockTransport::with_responses([
        ResponseBuilder::documents_found(5, 5).build(),
        ResponseBuilder::documents_found(9, 9).build(),
    ]);
    let engine = engine_for(&ws, mock);

    let mut state = ws.state_file.load().unwrap();
    engine.sync(&acme, &mut state, None, |_| {}).unwrap();
    let mut state = ws.state_file.load().unwrap();
    engine.sync(&other, &mut state, None, |_| {}).unwrap();

    let persisted = ws.state_file.load().unwrap();
    assert_eq!(persisted.last_sequence(&acme.id, Environment::Production), 5);
    assert_eq!(persisted.last_sequence(&other.id, Environment::Production), 9);
}

#[test]
fn canceled_lookup_files_record_and_removes_summary() {
    let ws = TestWorkspace::new();
    let taxpayer = sample_taxpayer();
    ws.store
        .save(&taxpayer.id, &format!("{SAMPLE_KEY}.xml"), &summary_xml(SAMPLE_KEY))
        .unwrap();
    let engine = engine_for(&ws, MockTransport::with_responses([ResponseBuilder::canceled().build()]));
    let key = AccessKey::parse(SAMPLE_KEY).unwrap();

    let lookup = engine.fetch_by_key(&taxpayer, &key).unwrap();
    let cancellation = lookup.cancellation.as_deref().unwrap();
    let record = record_cancellation(engine.store(), &taxpayer.id, &key, cancellation).unwrap();

    assert_eq!(record.outcome, Some(CancellationOutcome::SummaryRemoved));
    assert_eq!(
        ws.store.list(&taxpayer.id).unwrap(),
        vec![format!("{SAMPLE_KEY}-cancelamento.xml")]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn checkpoint_is_monotonic(marks in page_marks(15), persisted_before in 0u64..5_000) {
        let ws = TestWorkspace::new();
        let taxpayer = sample_taxpayer();
        let tip = *marks.last().unwrap();

        let mut initial = ws.state_file.load().unwrap();
        initial.advance_last_sequence(&taxpayer.id, taxpayer.environment, persisted_before);
        ws.state_file.save(&initial).unwrap();

        let mock = MockTransport::new();
        for mark in &marks {
            mock.push_response(ResponseBuilder::documents_found(*mark, tip).build());
        }
        let engine = engine_for(&ws, mock);

        let mut state = ws.state_file.load().unwrap();
        let run = report(engine.sync(&taxpayer, &mut state, Some(0), |_| {}).unwrap());
        prop_assert_eq!(run.pages as usize, marks.len());

        let persisted = ws.state_file.load().unwrap();
        let seq = persisted.last_sequence(&taxpayer.id, taxpayer.environment);
        prop_assert_eq!(seq, tip.max(persisted_before));
        prop_assert!(persisted.cooldown_until(&taxpayer.id, taxpayer.environment).is_none());
    }

    #[test]
    fn every_entry_is_accounted_for(
        entries in prop::collection::vec(access_key().prop_flat_map(feed_document), 1..6),
        corrupt in 0usize..6,
    ) {
        let ws = TestWorkspace::new();
        let count = entries.len() as u64;
        let mut page = ResponseBuilder::documents_found(count, count);
        for (i, (schema, xml)) in entries.iter().enumerate() {
            page = if i == corrupt {
                page.raw_entry(&feed_sequence(i as u64 + 1), schema, "@@not-a-payload@@")
            } else {
                page.document(i as u64 + 1, schema, xml)
            };
        }
        let engine = engine_for(&ws, MockTransport::with_responses([page.build()]));
        let mut state = ws.state_file.load().unwrap();

        let run = report(engine.sync(&sample_taxpayer(), &mut state, None, |_| {}).unwrap());
        prop_assert_eq!(run.documents.len(), entries.len());
        let expected_failures = usize::from(corrupt < entries.len());
        prop_assert_eq!(run.failed_count(), expected_failures);
    }
}
