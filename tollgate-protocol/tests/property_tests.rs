//! Property-based tests for tollgate-protocol
//!
//! These tests use proptest to verify invariants across a wide range of inputs.

#[cfg(test)]
mod fee_properties {
    use chrono::Duration;
    use proptest::prelude::*;
    use tollgate_lib::config::{MessageFeeSchedule, WalletFeeSchedule};
    use tollgate_protocol::fee::{message_fee, wallet_fee};

    proptest! {
        /// A larger body never costs less
        #[test]
        fn message_fee_monotone_in_size(
            size in 0usize..64_000,
            extra in 0usize..64_000,
            hours in 0i64..4_320,
        ) {
            let schedule = MessageFeeSchedule::default();
            let retention = Duration::hours(hours);
            prop_assert!(
                message_fee(&schedule, size, retention) <= message_fee(&schedule, size + extra, retention)
            );
        }

        /// Longer retention never costs less
        #[test]
        fn message_fee_monotone_in_retention(
            size in 0usize..64_000,
            secs in 0i64..15_552_000,
            extra in 0i64..15_552_000,
        ) {
            let schedule = MessageFeeSchedule::default();
            prop_assert!(
                message_fee(&schedule, size, Duration::seconds(secs))
                    <= message_fee(&schedule, size, Duration::seconds(secs + extra))
            );
        }

        /// Retention counts by its magnitude only
        #[test]
        fn message_fee_ignores_retention_sign(size in 0usize..64_000, secs in 0i64..15_552_000) {
            let schedule = MessageFeeSchedule::default();
            prop_assert_eq!(
                message_fee(&schedule, size, Duration::seconds(secs)),
                message_fee(&schedule, size, Duration::seconds(-secs))
            );
        }

        /// Wallet fees are whole units and grow with the transfer count
        #[test]
        fn wallet_fee_whole_and_monotone(
            count in 1usize..30,
            amount in 1i64..i64::from(i32::MAX),
            comment in 0usize..64_256,
        ) {
            let schedule = WalletFeeSchedule::default();
            let fee = wallet_fee(&schedule, count, amount, comment);
            prop_assert_eq!(fee.truncate(), fee);
            prop_assert!(fee <= wallet_fee(&schedule, count + 1, amount, comment));
            prop_assert!(fee <= wallet_fee(&schedule, count, amount, comment + 1024));
        }
    }
}

#[cfg(test)]
mod codec_properties {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use tollgate_lib::{ClientId, WholeSeconds};
    use tollgate_protocol::{MessageSignatureType, SignableRecord};

    fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, nanos).unwrap()
    }

    fn record(
        ids: (u128, u128, u128),
        body: &[u8],
        sent: DateTime<Utc>,
        keep: i64,
    ) -> SignableRecord<'_> {
        SignableRecord::MessageSend {
            message_id: ClientId::from_u128(ids.0),
            from: ClientId::from_u128(ids.1),
            to: ClientId::from_u128(ids.2),
            message_type: 0,
            body,
            sent_time: WholeSeconds::round(sent),
            message_key_id: ClientId::NIL,
            save_until: WholeSeconds::round(sent + Duration::seconds(keep)),
            signature_type: MessageSignatureType::None,
        }
    }

    proptest! {
        /// The same record always digests the same way
        #[test]
        fn digest_is_deterministic(
            ids in any::<(u128, u128, u128)>(),
            body in proptest::collection::vec(any::<u8>(), 0..512),
            secs in 946_684_800i64..4_102_444_800,
            keep in 1i64..15_552_000,
        ) {
            let sent = at(secs, 0);
            let first = record(ids, &body, sent, keep).digest().unwrap();
            let second = record(ids, &body, sent, keep).digest().unwrap();
            prop_assert_eq!(first, second);
        }

        /// Sub-second parts never reach the digest
        #[test]
        fn sub_second_precision_is_truncated(
            ids in any::<(u128, u128, u128)>(),
            secs in 946_684_800i64..4_102_444_800,
            nanos in 0u32..1_000_000_000,
        ) {
            let body = b"tick";
            let whole = record(ids, body, at(secs, 0), 60).digest().unwrap();
            let fractional = record(ids, body, at(secs, nanos), 60).digest().unwrap();
            prop_assert_eq!(whole, fractional);
        }

        /// Swapping sender and recipient changes the digest
        #[test]
        fn direction_is_signed(
            message_id in any::<u128>(),
            a in any::<u128>(),
            b in any::<u128>(),
        ) {
            prop_assume!(a != b);
            let sent = at(1_772_366_400, 0);
            let forward = record((message_id, a, b), b"x", sent, 60).digest().unwrap();
            let backward = record((message_id, b, a), b"x", sent, 60).digest().unwrap();
            prop_assert_ne!(forward, backward);
        }
    }
}

#[cfg(test)]
mod window_properties {
    use chrono::Duration;
    use proptest::prelude::*;
    use tollgate_lib::config::MessageServiceConfig;
    use tollgate_lib::test_utils::{fixed_now, IdSource};
    use tollgate_lib::AdmissionRule;
    use tollgate_protocol::{Amount, SendMessageRequest};

    proptest! {
        /// Admission of the sent time depends only on its distance from now
        #[test]
        fn sent_time_window_is_inclusive(offset in -600i64..600, seed in any::<u64>()) {
            let mut ids = IdSource::production(seed);
            let config = MessageServiceConfig::default();
            let mut request = SendMessageRequest::new(
                ids.next_id(),
                ids.next_id(),
                ids.next_id(),
                b"ping".to_vec(),
                fixed_now(),
                Duration::hours(1),
            )
            .with_max_fee(Amount::from_units(10));
            request.sent_time = fixed_now() + Duration::seconds(offset);
            request.save_until = request.sent_time + Duration::hours(1);

            let result = request.validate_at(&config, fixed_now());
            if offset.abs() <= 300 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(
                    result.unwrap_err().admission_rule(),
                    Some(AdmissionRule::TimeWindow)
                );
            }
        }
    }
}
