//! Tests for request/response chunking and reassembly

use proptest::prelude::*;
use streamux::{FrameHeader, Session};

use super::{negotiated_pair, pump, Event, Recorder};

fn decoded_headers(session: &Session<Recorder>) -> Vec<(u16, FrameHeader, Option<Vec<u8>>)> {
    let codec = *session.header_codec().unwrap();
    session
        .handler()
        .sent
        .iter()
        .map(|s| (s.priority, codec.decode(&s.header).unwrap(), s.payload.clone()))
        .collect()
}

#[test]
fn test_seventeen_byte_request_in_two_chunks() {
    let (mut initiator, mut responder) = negotiated_pair(8, 4, 10);
    let payload: Vec<u8> = (100..117).collect();

    let id = initiator.encode_request(10, &payload).unwrap();
    assert_eq!(id, 0);

    let chunks = decoded_headers(&initiator);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].0, 10);
    assert_eq!(chunks[0].1, FrameHeader::new(0, 10, false, false));
    assert_eq!(chunks[0].2.as_deref(), Some(&payload[..10]));
    assert_eq!(chunks[1].0, 10);
    assert_eq!(chunks[1].1, FrameHeader::new(0, 7, false, true));
    assert_eq!(chunks[1].2.as_deref(), Some(&payload[10..]));

    pump(&mut initiator, &mut responder).unwrap();
    assert_eq!(
        responder.handler().events,
        vec![
            Event::Request { id: 0, data: payload[..10].to_vec(), is_end: false },
            Event::Request { id: 0, data: payload[10..].to_vec(), is_end: true },
        ]
    );
}

#[test]
fn test_response_completes_the_exchange() {
    let (mut initiator, mut responder) = negotiated_pair(8, 4, 10);
    let id = initiator.encode_request(5, b"question").unwrap();
    pump(&mut initiator, &mut responder).unwrap();

    responder.encode_response(7, id, b"a rather long answer").unwrap();
    assert!(responder.handler().sent.iter().all(|s| s.priority == 7));
    pump(&mut responder, &mut initiator).unwrap();

    let events = &initiator.handler().events;
    assert_eq!(events.len(), 2);
    let mut body = Vec::new();
    for event in events {
        match event {
            Event::Response { id: got, data, .. } => {
                assert_eq!(*got, id);
                body.extend_from_slice(data);
            }
            other => panic!("Expected Response event, got {:?}", other),
        }
    }
    assert_eq!(body, b"a rather long answer");
    assert!(matches!(events[1], Event::Response { is_end: true, .. }));
    assert_eq!(initiator.outstanding_requests(), 0);
}

#[test]
fn test_empty_request_and_empty_response() {
    let (mut initiator, mut responder) = negotiated_pair(8, 4, 10);
    let id = initiator.encode_request(1, &[]).unwrap();
    assert_eq!(initiator.handler().sent.len(), 1);
    assert!(initiator.handler().sent[0].payload.is_none());

    pump(&mut initiator, &mut responder).unwrap();
    assert_eq!(
        responder.handler().events,
        vec![Event::Request { id, data: Vec::new(), is_end: true }]
    );

    responder.encode_response(1, id, &[]).unwrap();
    pump(&mut responder, &mut initiator).unwrap();
    assert_eq!(
        initiator.handler().events,
        vec![Event::Response { id, data: Vec::new(), is_end: true }]
    );
    assert_eq!(initiator.outstanding_requests(), 0);
}

#[test]
fn test_interleaved_streams_reassemble_independently() {
    let (mut initiator, mut responder) = negotiated_pair(8, 4, 4);
    let first = initiator.encode_request(1, b"aaaaaaaaaa").unwrap();
    let second = initiator.encode_request(2, b"bbbbbbb").unwrap();
    assert_ne!(first, second);

    // Interleave the chunks of both streams as a priority queue might.
    let mut frames = std::mem::take(&mut initiator.handler_mut().sent);
    let tail = frames.split_off(3);
    let mut wire = Vec::new();
    let mut push = |f: &super::Sent| {
        wire.extend_from_slice(&f.header);
        wire.extend_from_slice(f.payload.as_deref().unwrap_or_default());
    };
    push(&tail[0]);
    push(&frames[0]);
    push(&tail[1]);
    push(&frames[1]);
    push(&frames[2]);
    responder.decode_feed(&wire).unwrap();

    let recorder = responder.handler();
    assert_eq!(recorder.request_bytes(first), b"aaaaaaaaaa");
    assert_eq!(recorder.request_bytes(second), b"bbbbbbb");
    let ends: Vec<_> = recorder
        .events
        .iter()
        .filter(|e| matches!(e, Event::Request { is_end: true, .. }))
        .collect();
    assert_eq!(ends.len(), 2);
}

#[test]
fn test_chunk_length_limited_by_length_field() {
    let (mut initiator, _responder) = negotiated_pair(4, 4, 1000);
    assert_eq!(initiator.max_chunk_length(), Some(15));
    initiator.encode_request(1, &[0u8; 40]).unwrap();
    let lengths: Vec<usize> = initiator
        .handler()
        .sent
        .iter()
        .map(|s| s.payload.as_ref().map_or(0, |p| p.len()))
        .collect();
    assert_eq!(lengths, vec![15, 15, 10]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chunking_roundtrip(
        payload in proptest::collection::vec(any::<u8>(), 0..600),
        max_chunk in 1u32..64,
        split_at in any::<prop::sample::Index>(),
    ) {
        let (mut initiator, mut responder) = negotiated_pair(10, 6, max_chunk);
        let id = initiator.encode_request(3, &payload).unwrap();

        // Feed the wire in two arbitrary pieces.
        let wire = initiator.handler_mut().take_wire();
        let cut = if wire.is_empty() { 0 } else { split_at.index(wire.len() + 1) };
        responder.decode_feed(&wire[..cut]).unwrap();
        responder.decode_feed(&wire[cut..]).unwrap();

        let events = &responder.handler().events;
        let mut ends = 0;
        for event in events {
            match event {
                Event::Request { id: got, data, is_end } => {
                    prop_assert_eq!(*got, id);
                    prop_assert!(data.len() <= max_chunk as usize);
                    if *is_end {
                        ends += 1;
                    }
                }
                other => prop_assert!(false, "unexpected event {:?}", other),
            }
        }
        prop_assert_eq!(ends, 1);
        let last_is_end = matches!(events.last(), Some(Event::Request { is_end: true, .. }));
        prop_assert!(last_is_end);
        prop_assert_eq!(responder.handler().request_bytes(id), payload);
    }
}
