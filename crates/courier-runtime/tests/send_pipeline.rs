//! End-to-end tests for the outbound delivery pipeline
//!
//! These drive the full send path over scripted fakes: transform,
//! destination strategy, packet exchange, escalation, and receipt
//! correlation.


use std::sync::Arc;

use courier_core::chain::{
    Element, ForwardBundle, ForwardNode, ImageOrigin, ImageRef, Marker, MessageChain, MusicShare,
};
use courier_core::config::SendConfig;
use courier_core::errors::{CourierError, UploadError};
use courier_core::outgoing::{OutgoingSource, SeqResolution};
use courier_core::packet::{PacketCommand, PacketResponse};
use courier_core::types::{ResourceId, Timestamp, UserId};
use courier_runtime::MessageSender;

use test_utils::*;

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

struct Harness {
    layer: Arc<FakePacketLayer>,
    uploader: Arc<FakeUploader>,
    bus: Arc<FakeEventBus>,
    estimator: Arc<ThresholdEstimator>,
    sender: MessageSender,
    config: SendConfig,
}

impl Harness {
    /// Pipeline over fast-timeout config and the given estimator budget
    fn new(estimator_budget: usize) -> Self {
        Self::with_config(estimator_budget, SendConfig::fast())
    }

    fn with_config(estimator_budget: usize, config: SendConfig) -> Self {
        let layer = Arc::new(FakePacketLayer::new());
        let uploader = Arc::new(FakeUploader::new());
        let bus = Arc::new(FakeEventBus::new());
        let estimator = Arc::new(ThresholdEstimator::new(estimator_budget));
        let sender = MessageSender::with_config(
            layer.clone(),
            uploader.clone(),
            bus.clone(),
            estimator.clone(),
            test_account(),
            config.clone(),
        );
        Self {
            layer,
            uploader,
            bus,
            estimator,
            sender,
            config,
        }
    }
}

fn forward_chain(nodes: usize) -> MessageChain {
    let nodes = (0..nodes)
        .map(|i| ForwardNode {
            sender: UserId::new(i as u64),
            sender_name: format!("member-{i}"),
            time: Timestamp::new(i as u64),
            chain: MessageChain::text(format!("node {i}")),
        })
        .collect();
    MessageChain::from_element(Element::Forward(ForwardBundle::new(nodes)))
}

fn music_chain() -> MessageChain {
    MessageChain::from_element(Element::Music(MusicShare {
        title: "Night Drive".into(),
        summary: "synthwave".into(),
        jump_url: "https://music.example/track/9".into(),
        music_url: "https://music.example/stream/9".into(),
    }))
}

// ----------------------------------------------------------------------------
// Direct Sends
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_friend_send_uses_one_packet_and_resolves_from_ack() {
    let h = Harness::new(4500);

    let receipt = h
        .sender
        .send_message(&friend_destination(), MessageChain::text("hello alice"))
        .await
        .unwrap();

    let sent = h.layer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, PacketCommand::SendFriendMessage);
    assert!(sent[0].group_info.is_none());
    assert!(sent[0].fragment.is_none());

    // Direct acks carry the authoritative sequence.
    assert!(receipt.resolution().is_resolved());
    assert_eq!(receipt.source().sequence(), Some(1));
}

#[tokio::test]
async fn test_ignore_length_marker_skips_estimation_entirely() {
    let h = Harness::new(0); // would reject everything if consulted

    let chain = MessageChain::new(vec![
        Element::Text("hello".into()),
        Element::Marker(Marker::IgnoreLengthCheck),
    ]);
    h.sender
        .send_message(&friend_destination(), chain)
        .await
        .unwrap();

    assert_eq!(h.estimator.calls(), 0);
    assert_eq!(h.layer.sent().len(), 1);
}

#[tokio::test]
async fn test_rejection_surfaces_response_detail() {
    let h = Harness::new(4500);
    h.layer.push_response(PacketResponse::Rejected {
        code: 120,
        reason: "blocked by recipient".into(),
    });

    let err = h
        .sender
        .send_message(&friend_destination(), MessageChain::text("hi"))
        .await
        .unwrap_err();

    match err {
        CourierError::SendRejected { code, reason } => {
            assert_eq!(code, 120);
            assert_eq!(reason, "blocked by recipient");
        }
        other => panic!("expected SendRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_network_error_propagates_unchanged() {
    let h = Harness::new(4500);
    h.layer.push_error(
        courier_core::errors::NetworkError::Timeout { duration_ms: 5000 }.into(),
    );

    let err = h
        .sender
        .send_message(&friend_destination(), MessageChain::text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Network(_)));
}

// ----------------------------------------------------------------------------
// Escalation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_oversized_group_text_escalates_to_long_message_once() {
    let h = Harness::new(4500);
    h.bus
        .push(group_receipt_event(h.config.app_channel_id, 7210));

    let receipt = h
        .sender
        .send_message(&group_destination(), MessageChain::text("a".repeat(50_000)))
        .await
        .unwrap();

    // Exactly one upload: the long-message conversion.
    assert_eq!(h.uploader.upload_count(), 1);
    assert!(h.uploader.uploads()[0].long_message);

    // Exactly one packet: the first attempt never reached the network.
    let sent = h.layer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].command, PacketCommand::SendGroupMessage);

    // The final chain is a single long-message reference with a 27-unit
    // preview.
    let elements = sent[0].chain.elements();
    assert_eq!(elements.len(), 1);
    let Element::LongRef(long) = &elements[0] else {
        panic!("expected a long-message reference, got {elements:?}");
    };
    assert_eq!(long.preview.chars().count(), 27);

    assert_eq!(
        receipt.resolution(),
        SeqResolution::Resolved {
            sequence: 7210,
            internal_id: 721_000,
        }
    );
}

#[tokio::test]
async fn test_never_long_marker_falls_back_to_fragmentation() {
    let mut config = SendConfig::fast();
    config.inline_budget = 10;
    let h = Harness::with_config(10, config);

    let chain = MessageChain::new(vec![
        Element::Text("abcdefghijklmnopqrstuvwxy".into()), // 25 chars, 3 fragments
        Element::Marker(Marker::NeverLongMessage),
    ]);
    // The long-message attempt leaves the chain unchanged, so the server
    // rejects it again and the send falls through to fragmentation.
    h.layer.push_response(PacketResponse::TooLarge);

    let receipt = h
        .sender
        .send_message(&friend_destination(), chain)
        .await
        .unwrap();

    assert_eq!(h.uploader.upload_count(), 0);

    let sent = h.layer.sent();
    // One inline attempt at the long-message step, then three fragments.
    assert_eq!(sent.len(), 4);
    assert!(sent[0].fragment.is_none());
    for (i, packet) in sent[1..].iter().enumerate() {
        let fragment = packet.fragment.unwrap();
        assert_eq!(fragment.index, i as u8);
        assert_eq!(fragment.count, 3);
    }
    assert!(receipt.resolution().is_resolved());
}

#[tokio::test]
async fn test_fragmented_rejection_is_fatal() {
    let mut config = SendConfig::fast();
    config.inline_budget = 10;
    let h = Harness::with_config(10, config);

    let chain = MessageChain::new(vec![
        Element::Text("abcdefghijklmnopqrstuvwxy".into()),
        Element::Marker(Marker::NeverLongMessage),
    ]);
    h.layer.push_response(PacketResponse::TooLarge); // long-message attempt
    h.layer.push_response(PacketResponse::TooLarge); // first fragment

    let err = h
        .sender
        .send_message(&friend_destination(), chain)
        .await
        .unwrap_err();
    assert!(err.is_too_large());

    // The ladder is exhausted after the first fragment bounces: nothing
    // further is sent.
    assert_eq!(h.layer.sent().len(), 2);
}

// ----------------------------------------------------------------------------
// Forward Bundles
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_forward_bundle_at_node_limit_is_uploaded() {
    let h = Harness::new(4500);

    h.sender
        .send_message(&friend_destination(), forward_chain(200))
        .await
        .unwrap();

    assert_eq!(h.uploader.upload_count(), 1);
    assert_eq!(h.uploader.uploads()[0].node_count, 200);
    assert!(!h.uploader.uploads()[0].long_message);

    let sent = h.layer.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        sent[0].chain.elements(),
        [Element::ForwardRef(_)]
    ));
}

#[tokio::test]
async fn test_forward_bundle_over_node_limit_fails_before_any_network_call() {
    let h = Harness::new(4500);

    let err = h
        .sender
        .send_message(&friend_destination(), forward_chain(201))
        .await
        .unwrap_err();

    assert!(err.is_too_large());
    assert_eq!(h.uploader.upload_count(), 0);
    assert_eq!(h.layer.sent().len(), 0);
}

#[tokio::test]
async fn test_upload_failure_propagates_unchanged() {
    let h = Harness::new(4500);
    h.uploader.fail_with(UploadError::Rejected {
        reason: "quota exceeded".into(),
    });

    let err = h
        .sender
        .send_message(&friend_destination(), forward_chain(3))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::Upload(_)));
    assert_eq!(h.layer.sent().len(), 0);
}

// ----------------------------------------------------------------------------
// Group Correlation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_group_receipt_arrives_within_timeout() {
    let h = Harness::new(4500);
    h.bus.push(group_receipt_event(h.config.app_channel_id, 88));

    let receipt = h
        .sender
        .send_message(&group_destination(), MessageChain::text("evening"))
        .await
        .unwrap();

    assert_eq!(
        receipt.resolution(),
        SeqResolution::Resolved {
            sequence: 88,
            internal_id: 8800,
        }
    );
}

#[tokio::test]
async fn test_group_receipt_timeout_still_succeeds() {
    let h = Harness::new(4500);

    let receipt = h
        .sender
        .send_message(&group_destination(), MessageChain::text("evening"))
        .await
        .unwrap();

    assert_eq!(receipt.resolution(), SeqResolution::Unresolved);
    assert_eq!(receipt.source().sequence(), None);
}

#[tokio::test]
async fn test_group_packets_carry_group_info() {
    let h = Harness::new(4500);

    h.sender
        .send_message(&group_destination(), MessageChain::text("evening"))
        .await
        .unwrap();

    let sent = h.layer.sent();
    let info = sent[0].group_info.as_ref().unwrap();
    assert_eq!(info.sender_card, "night owl");
}

// ----------------------------------------------------------------------------
// Music Shares
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_music_share_to_group_routes_through_share_packet() {
    let h = Harness::new(4500);
    h.bus.push(group_receipt_event(h.config.app_channel_id, 31));

    let receipt = h
        .sender
        .send_message(&group_destination(), music_chain())
        .await
        .unwrap();

    assert_eq!(h.layer.sent_commands(), vec![PacketCommand::ShareMusic]);
    assert_eq!(receipt.resolution().sequence(), Some(31));
}

#[tokio::test]
async fn test_music_share_to_friend_is_unsupported() {
    let h = Harness::new(4500);

    let err = h
        .sender
        .send_message(&friend_destination(), music_chain())
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Unsupported { .. }));
    // The share itself went out; only receipt construction is undefined for
    // one-to-one kinds.
    assert_eq!(h.layer.sent_commands(), vec![PacketCommand::ShareMusic]);
}

// ----------------------------------------------------------------------------
// Group Image Registration
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_direct_images_are_registered_before_a_group_send() {
    let h = Harness::new(4500);

    let chain = MessageChain::new(vec![
        Element::Text("look at this".into()),
        Element::Image(ImageRef {
            resource: ResourceId::new("img-direct"),
            origin: ImageOrigin::Direct,
        }),
        Element::Image(ImageRef {
            resource: ResourceId::new("img-group"),
            origin: ImageOrigin::Group,
        }),
    ]);

    h.sender
        .send_message(&group_destination(), chain)
        .await
        .unwrap();

    // Only the direct-origin image needs a group-scoped copy, and its
    // registration precedes the message itself.
    assert_eq!(
        h.layer.sent_commands(),
        vec![
            PacketCommand::RegisterGroupImage,
            PacketCommand::SendGroupMessage,
        ]
    );
}

#[tokio::test]
async fn test_friend_send_never_registers_images() {
    let h = Harness::new(4500);

    let chain = MessageChain::new(vec![Element::Image(ImageRef {
        resource: ResourceId::new("img-direct"),
        origin: ImageOrigin::Direct,
    })]);

    h.sender
        .send_message(&friend_destination(), chain)
        .await
        .unwrap();

    assert_eq!(
        h.layer.sent_commands(),
        vec![PacketCommand::SendFriendMessage]
    );
}

// ----------------------------------------------------------------------------
// Quote Resolution
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_reply_waits_for_the_quoted_sends_sequence() {
    let h = Harness::new(4500);

    // A prior send whose correlation is still in flight.
    let prior = OutgoingSource::new(
        UserId::new(1000),
        group_destination().target(),
        MessageChain::text("original"),
    );
    let reply = MessageChain::new(vec![
        Element::Quote(prior.as_quote()),
        Element::Text("agreed".into()),
    ]);

    // The prior send's correlator resolves while the reply is suspended.
    let resolver = prior.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        resolver.finalize(SeqResolution::Resolved {
            sequence: 777,
            internal_id: 1,
        });
    });

    h.sender
        .send_message(&friend_destination(), reply)
        .await
        .unwrap();

    let sent = h.layer.sent();
    let Element::Quote(quote) = &sent[0].chain.elements()[0] else {
        panic!("expected the quote to survive the pipeline");
    };
    assert_eq!(quote.sequence, Some(777));
    assert!(!quote.is_pending());
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_sends_share_one_sender() {
    let h = Harness::new(4500);

    let friend = friend_destination();
    let stranger = stranger_destination();
    let temp = temp_destination();
    let sends = vec![
        h.sender.send_message(&friend, MessageChain::text("one")),
        h.sender.send_message(&stranger, MessageChain::text("two")),
        h.sender.send_message(&temp, MessageChain::text("three")),
    ];

    let receipts = futures::future::join_all(sends).await;
    assert!(receipts.iter().all(|r| r.is_ok()));
    assert_eq!(h.layer.sent().len(), 3);

    // Each one-to-one kind used its own packet encoding.
    let mut commands = h.layer.sent_commands();
    commands.sort_by_key(|c| format!("{c}"));
    assert_eq!(
        commands,
        vec![
            PacketCommand::SendFriendMessage,
            PacketCommand::SendStrangerMessage,
            PacketCommand::SendTempMessage,
        ]
    );
}
