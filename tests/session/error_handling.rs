//! Tests for error reporting and session failure

use streamux::{FrameHeader, Session, SessionConfig, SessionPhase, StreamuxError};

use super::{negotiated_pair, Recorder};

#[test]
fn test_invalid_priority_is_rejected_without_emitting() {
    let (mut initiator, _responder) = negotiated_pair(8, 4, 10);
    assert_eq!(initiator.encode_request(65535, b"x"), Err(StreamuxError::InvalidPriority(65535)));
    assert!(initiator.handler().sent.is_empty());
    assert_eq!(initiator.outstanding_requests(), 0);
}

#[test]
fn test_custom_priority_bounds() {
    let mut session = Session::new(
        SessionConfig::initiator().with_priorities(100, 200),
        Recorder::default(),
    )
    .unwrap();
    session.init(8, 4).unwrap();
    session.decode_feed(&[0, 1]).unwrap();

    assert_eq!(session.handler().sent[0].priority, 200);
    assert!(session.encode_request(100, b"ok").is_ok());
    assert_eq!(session.encode_request(101, b"no"), Err(StreamuxError::InvalidPriority(101)));
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let result = Session::new(SessionConfig::initiator().with_versions(0, 1), Recorder::default());
    assert!(matches!(result, Err(StreamuxError::InvalidConfig(_))));
}

#[test]
fn test_zero_width_init_is_rejected() {
    let mut session = Session::new(SessionConfig::responder(), Recorder::default()).unwrap();
    assert!(matches!(session.init(0, 4), Err(StreamuxError::InvalidConfig(_))));
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn test_cancel_on_ping_id_is_fatal() {
    let (_initiator, mut responder) = negotiated_pair(8, 4, 10);
    let codec = *responder.header_codec().unwrap();
    let bad = codec.encode(&FrameHeader::new(15, 0, false, false)).unwrap();

    let err = responder.decode_feed(&bad).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(responder.phase(), SessionPhase::Failed);
    assert_eq!(responder.ping(), Err(StreamuxError::SessionClosed));
    assert_eq!(responder.decode_feed(&[0]), Err(StreamuxError::SessionClosed));
}

#[test]
fn test_frames_before_violation_are_still_delivered() {
    let (mut initiator, mut responder) = negotiated_pair(8, 4, 10);
    let id = initiator.encode_request(1, b"good").unwrap();
    let mut wire = initiator.handler_mut().take_wire();
    let codec = *responder.header_codec().unwrap();
    wire.extend_from_slice(&codec.encode(&FrameHeader::new(15, 3, false, true)).unwrap());
    wire.extend_from_slice(b"bad");

    assert!(responder.decode_feed(&wire).is_err());
    assert_eq!(responder.handler().request_bytes(id), b"good");
}

#[test]
fn test_reset_allows_a_new_session() {
    let (mut initiator, _responder) = negotiated_pair(8, 4, 10);
    initiator.encode_request(1, b"x").unwrap();
    initiator.reset();
    assert_eq!(initiator.phase(), SessionPhase::Idle);
    assert_eq!(initiator.outstanding_requests(), 0);
    assert_eq!(initiator.encode_request(1, b"x"), Err(StreamuxError::NotNegotiated));
}
