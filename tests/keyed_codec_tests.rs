//! Keyed record codec tests
//!
//! Records declared outside the library with `keyed_fields!`, and
//! compatibility between two versions of the same record.

mod common;

use common::mock_transport::MockTransport;
use common::test_helpers::test_config;
use realtime_session::keyed_fields;
use realtime_session::messages::{Bytes, CodecError, Field, KeyedRecord, MessageCodec, Profile};
use realtime_session::network::SessionError;
use realtime_session::Session;

/// First version of a score record
#[derive(Debug, Default, Clone, PartialEq)]
struct ScoreV1 {
    player: String,
    points: i64,
}

impl KeyedRecord for ScoreV1 {
    const TYPE_NAME: &'static str = "ScoreV1";

    fn fields() -> Vec<Field<Self>> {
        keyed_fields![ScoreV1 {
            0 => player,
            1 => points,
        }]
    }
}

/// Later version: same keys for surviving fields, new fields on new keys
#[derive(Debug, Default, Clone, PartialEq)]
struct ScoreV2 {
    player: String,
    points: i64,
    tags: Vec<String>,
    avatar: Option<Bytes>,
}

impl KeyedRecord for ScoreV2 {
    const TYPE_NAME: &'static str = "ScoreV2";

    fn fields() -> Vec<Field<Self>> {
        keyed_fields![ScoreV2 {
            0 => player,
            1 => points,
            2 => tags,
            5 => avatar,
        }]
    }
}

#[derive(Debug, Default)]
struct Clash {
    left: u8,
    right: u8,
}

impl KeyedRecord for Clash {
    const TYPE_NAME: &'static str = "Clash";

    fn fields() -> Vec<Field<Self>> {
        keyed_fields![Clash {
            3 => left,
            3 => right,
        }]
    }
}

#[test]
fn test_newer_record_reads_older_payload() {
    let old = ScoreV1 {
        player: "ivy".to_string(),
        points: -12,
    };
    let payload = MessageCodec::<ScoreV1>::register()
        .unwrap()
        .encode(&old)
        .unwrap();

    let new = MessageCodec::<ScoreV2>::register()
        .unwrap()
        .decode(&payload)
        .unwrap();

    assert_eq!(new.player, "ivy");
    assert_eq!(new.points, -12);
    assert!(new.tags.is_empty());
    assert_eq!(new.avatar, None);
}

#[test]
fn test_older_record_ignores_newer_fields() {
    let new = ScoreV2 {
        player: "kai".to_string(),
        points: 9_000_000_000,
        tags: vec!["fast".to_string(), "left-handed".to_string()],
        avatar: Some(Bytes(vec![0xff, 0x00, 0x10])),
    };
    let payload = MessageCodec::<ScoreV2>::register()
        .unwrap()
        .encode(&new)
        .unwrap();

    let old = MessageCodec::<ScoreV1>::register()
        .unwrap()
        .decode(&payload)
        .unwrap();

    assert_eq!(
        old,
        ScoreV1 {
            player: "kai".to_string(),
            points: 9_000_000_000,
        }
    );
}

#[test]
fn test_collections_and_binary_survive_transfer() {
    let codec = MessageCodec::<ScoreV2>::register().unwrap();
    let score = ScoreV2 {
        player: "lee".to_string(),
        points: 0,
        tags: vec!["a".to_string()],
        avatar: Some(Bytes(vec![1, 2, 3])),
    };

    assert_eq!(codec.decode(&codec.encode(&score).unwrap()).unwrap(), score);
}

#[test]
fn test_profile_wire_layout_uses_integer_keys() {
    let payload = MessageCodec::<Profile>::register()
        .unwrap()
        .encode(&Profile::default())
        .unwrap();

    let mut expected = vec![0x83, 0x00, 0x64, 0x01, 0xa4];
    expected.extend_from_slice(b"dark");
    expected.extend_from_slice(&[0x02, 0xa6]);
    expected.extend_from_slice(b"compet");
    assert_eq!(payload, expected);
}

#[test]
fn test_duplicate_keys_rejected_at_registration() {
    let err = MessageCodec::<Clash>::register().unwrap_err();
    match err {
        CodecError::DuplicateKey {
            key, first, second, ..
        } => {
            assert_eq!(key, 3);
            assert_eq!(first, "left");
            assert_eq!(second, "right");
        }
        other => panic!("expected DuplicateKey, got {:?}", other),
    }
}

#[test]
fn test_session_refuses_invalid_record_type() {
    let transport = MockTransport::new();
    let result = Session::<Clash>::new(test_config(), transport.connector());
    assert!(matches!(
        result,
        Err(SessionError::Codec(CodecError::DuplicateKey { .. }))
    ));
}
