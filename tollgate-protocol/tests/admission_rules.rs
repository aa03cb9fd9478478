//! Every admission rule, reached through the public request types
//!
//! Each test starts from a request that is admitted and breaks exactly one
//! thing, so the reported rule must be the one that was broken.

use chrono::{Duration, DurationRound};
use tollgate_lib::config::{MessageServiceConfig, WalletServiceConfig};
use tollgate_lib::namespace::EMISSION;
use tollgate_lib::test_utils::{client_cert, fixed_now, IdSource};
use tollgate_lib::{AdmissionRule, ClientId, PrivateCertificate, ProtocolErrorCode, PublicCertificate};
use tollgate_protocol::{
    Amount, CommentKeyRecord, KeyValidity, SendMessageRequest, SimpleTransferRequest,
    TransferToInfo,
};

fn rule(result: tollgate_lib::Result<()>) -> AdmissionRule {
    let err = result.unwrap_err();
    assert_eq!(err.code(), ProtocolErrorCode::AdmissionRejected);
    err.admission_rule().unwrap()
}

fn message(ids: &mut IdSource) -> SendMessageRequest {
    SendMessageRequest::new(
        ids.next_id(),
        ids.next_id(),
        ids.next_id(),
        b"status report".to_vec(),
        fixed_now(),
        Duration::days(7),
    )
    .with_max_fee(Amount::from_units(100))
}

fn transfers(ids: &mut IdSource, count: usize) -> SimpleTransferRequest {
    let items = (0..count)
        .map(|_| TransferToInfo::new(ids.next_id(), ids.next_id(), 10))
        .collect();
    SimpleTransferRequest::new(ids.next_id(), items, fixed_now()).with_max_fee(100)
}

// ============================================================
// Message requests
// ============================================================

mod message_rules {
    use super::*;

    fn check(request: &SendMessageRequest) -> tollgate_lib::Result<()> {
        request.validate_at(&MessageServiceConfig::default(), fixed_now())
    }

    #[test]
    fn test_baseline_is_admitted() {
        let mut ids = IdSource::production(100);
        assert!(check(&message(&mut ids)).is_ok());
    }

    #[test]
    fn test_required_identifier() {
        let mut ids = IdSource::production(101);
        let mut request = message(&mut ids);
        request.to = ClientId::NIL;
        assert_eq!(rule(check(&request)), AdmissionRule::RequiredIdentifier);
    }

    #[test]
    fn test_identifier_namespace() {
        let mut ids = IdSource::production(102);
        let mut request = message(&mut ids);
        request.message_id = ClientId::from_u128(42);
        assert_eq!(rule(check(&request)), AdmissionRule::IdentifierNamespace);

        let mut request = message(&mut ids);
        request.to = ClientId::from_u128(1 << 90);
        assert_eq!(rule(check(&request)), AdmissionRule::IdentifierNamespace);
    }

    #[test]
    fn test_payload_size() {
        let mut ids = IdSource::production(103);
        let mut request = message(&mut ids);
        request.body = vec![0u8; 64_000];
        assert!(check(&request).is_ok());
        request.body.push(0);
        assert_eq!(rule(check(&request)), AdmissionRule::PayloadSize);
    }

    #[test]
    fn test_value_range() {
        let mut ids = IdSource::production(104);
        let request = message(&mut ids).with_max_fee(Amount::from_units(-1));
        assert_eq!(rule(check(&request)), AdmissionRule::ValueRange);
    }

    #[test]
    fn test_timestamp_precision() {
        let mut ids = IdSource::production(105);
        let mut request = message(&mut ids);
        request.sent_time += Duration::milliseconds(250);
        assert_eq!(rule(check(&request)), AdmissionRule::TimestampPrecision);
    }

    #[test]
    fn test_time_window() {
        let mut ids = IdSource::production(106);
        let mut request = message(&mut ids);
        request.sent_time = fixed_now() - Duration::seconds(301);
        assert_eq!(rule(check(&request)), AdmissionRule::TimeWindow);

        request.sent_time = fixed_now() + Duration::seconds(300);
        assert!(check(&request).is_ok());
    }

    #[test]
    fn test_timestamp_ordering() {
        let mut ids = IdSource::production(107);
        let mut request = message(&mut ids);
        request.save_until = request.sent_time;
        assert_eq!(rule(check(&request)), AdmissionRule::TimestampOrdering);
    }

    #[test]
    fn test_span_limit() {
        let mut ids = IdSource::production(108);
        let mut request = message(&mut ids);
        request.save_until = request.sent_time + Duration::days(180);
        assert!(check(&request).is_ok());
        request.save_until += Duration::seconds(1);
        assert_eq!(rule(check(&request)), AdmissionRule::SpanLimit);
    }

    #[test]
    fn test_signature_mode() {
        let mut ids = IdSource::production(109);
        let mut request = message(&mut ids);
        request.message_key_id = ids.next_id();
        assert_eq!(rule(check(&request)), AdmissionRule::SignatureMode);
    }

    #[test]
    fn test_first_broken_rule_wins() {
        let mut ids = IdSource::production(110);
        let mut request = message(&mut ids);
        request.to = ClientId::NIL;
        request.body = vec![0u8; 70_000];
        request.sent_time = fixed_now() - Duration::days(1);
        assert_eq!(rule(check(&request)), AdmissionRule::RequiredIdentifier);
    }

    #[test]
    fn test_rounding_never_breaks_precision() {
        let mut ids = IdSource::production(111);
        let now = fixed_now() + Duration::microseconds(999_999);
        let request = SendMessageRequest::new(
            ids.next_id(),
            ids.next_id(),
            ids.next_id(),
            Vec::new(),
            now,
            Duration::hours(1),
        );
        assert_eq!(
            request.sent_time,
            now.duration_trunc(Duration::seconds(1)).unwrap()
        );
        assert!(request
            .validate_at(&MessageServiceConfig::default(), now)
            .is_ok());
    }
}

// ============================================================
// Wallet requests
// ============================================================

mod wallet_rules {
    use super::*;

    fn check(request: &SimpleTransferRequest) -> tollgate_lib::Result<()> {
        request.validate_at(&WalletServiceConfig::default(), fixed_now())
    }

    #[test]
    fn test_baseline_is_admitted() {
        let mut ids = IdSource::production(200);
        assert!(check(&transfers(&mut ids, 3)).is_ok());
    }

    #[test]
    fn test_count_range() {
        let mut ids = IdSource::production(201);
        assert_eq!(rule(check(&transfers(&mut ids, 0))), AdmissionRule::CountRange);
        assert!(check(&transfers(&mut ids, 30)).is_ok());
        assert_eq!(rule(check(&transfers(&mut ids, 31))), AdmissionRule::CountRange);
    }

    #[test]
    fn test_duplicate_entries() {
        let mut ids = IdSource::production(202);
        let mut request = transfers(&mut ids, 2);
        request.transfers[1].transfer_id = request.transfers[0].transfer_id;
        assert_eq!(rule(check(&request)), AdmissionRule::DuplicateEntries);
    }

    #[test]
    fn test_emission_wallet_refuses_simple_transfers() {
        let mut ids = IdSource::production(203);
        let mut request = transfers(&mut ids, 1);
        request.transfers[0].to = EMISSION.equal;
        assert_eq!(rule(check(&request)), AdmissionRule::IdentifierNamespace);
    }

    #[test]
    fn test_amount_and_fee_ranges() {
        let mut ids = IdSource::production(204);
        let mut request = transfers(&mut ids, 1);
        request.transfers[0].amount = 0;
        assert_eq!(rule(check(&request)), AdmissionRule::ValueRange);

        let request = transfers(&mut ids, 1).with_max_fee(-1);
        assert_eq!(rule(check(&request)), AdmissionRule::ValueRange);
    }

    #[test]
    fn test_comment_size() {
        let mut ids = IdSource::production(205);
        let mut request = transfers(&mut ids, 1);
        request.transfers[0].comment = vec![0u8; 64_257];
        assert_eq!(rule(check(&request)), AdmissionRule::PayloadSize);
    }

    #[test]
    fn test_sent_time_window() {
        let mut ids = IdSource::production(206);
        let mut request = transfers(&mut ids, 1);
        request.sent_time = fixed_now() + Duration::seconds(301);
        assert_eq!(rule(check(&request)), AdmissionRule::TimeWindow);
    }

    #[test]
    fn test_key_rules() {
        let mut ids = IdSource::production(207);
        let alice = client_cert(&mut ids);
        let bob = client_cert(&mut ids);
        let carol = client_cert(&mut ids);
        let validity = KeyValidity::starting_at(fixed_now(), Duration::days(7));

        let key_id = ids.next_id();
        let (record, _) =
            CommentKeyRecord::mint(key_id, &alice, bob.public(), validity, false).unwrap();
        let transfer = TransferToInfo::new(ids.next_id(), bob.public().id(), 5)
            .with_comment(b"note".to_vec(), key_id);
        let from = alice.public().id();

        assert!(transfer.check_comment_key(&record, from, fixed_now()).is_ok());
        assert_eq!(
            rule(transfer.check_comment_key(&record, carol.public().id(), fixed_now())),
            AdmissionRule::KeyMismatch
        );
        assert_eq!(
            rule(transfer.clone().anonymous().check_comment_key(&record, from, fixed_now())),
            AdmissionRule::AnonymityMismatch
        );
        assert_eq!(
            rule(transfer.check_comment_key(&record, from, record.valid_until)),
            AdmissionRule::ExpiredKey
        );
    }
}
