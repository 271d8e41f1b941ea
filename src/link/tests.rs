use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::config::LinkConfig;
use crate::crtp::{self, SetpointCommand, TelemetryPacket};
use crate::error::{DecodeError, PollFailure, TransportFailure};

enum Reply {
    Frame(Vec<u8>),
    /// A frame that takes this long to arrive.
    Late(Duration, Vec<u8>),
    Timeout,
    SocketError,
}

#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    replies: Mutex<VecDeque<Reply>>,
    fail_sends: Mutex<bool>,
}

impl MockTransport {
    fn queue(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn queue_packet(&self, packet: TelemetryPacket) {
        self.queue(Reply::Frame(crtp::encode_telemetry(&packet).to_vec()));
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, frame: &[u8]) -> Result<(), TransportFailure> {
        if *self.fail_sends.lock().unwrap() {
            return Err(TransportFailure(io::Error::new(
                io::ErrorKind::NetworkUnreachable,
                "network unreachable",
            )));
        }
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    async fn recv_latest(&self, wait: Duration) -> Result<Vec<u8>, PollFailure> {
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::Late(delay, frame)) => {
                tokio::time::sleep(delay).await;
                Ok(frame)
            }
            Some(Reply::SocketError) => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )
            .into()),
            Some(Reply::Timeout) | None => Err(PollFailure::Timeout(wait)),
        }
    }
}

fn session() -> (Arc<MockTransport>, Arc<LinkSession>) {
    let transport = Arc::new(MockTransport::default());
    let session = LinkSession::new(transport.clone(), &LinkConfig::default());
    (transport, Arc::new(session))
}

fn packet(battery: u8) -> TelemetryPacket {
    TelemetryPacket {
        battery,
        altitude: 1.5,
        roll: 2.0,
        pitch: -3.0,
        yaw: 45.0,
        vbat: 3.9,
    }
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_setpoints_sends_one_datagram() {
    let (transport, session) = session();
    let cmd = SetpointCommand::new(0.0, 0.0, 0.0, 30000);

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(session.send_setpoint(cmd).await.unwrap());
        tokio::time::advance(Duration::from_millis(9)).await;
    }

    assert_eq!(outcomes[0], SendOutcome::Sent);
    assert!(outcomes[1..].iter().all(|o| *o == SendOutcome::Throttled));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_spaced_setpoints_all_go_out() {
    let (transport, session) = session();

    for thrust in [10000u16, 20000, 30000, 40000] {
        let cmd = SetpointCommand::new(1.0, 2.0, 3.0, thrust);
        assert_eq!(session.send_setpoint(cmd).await.unwrap(), SendOutcome::Sent);
        tokio::time::advance(Duration::from_millis(50)).await;
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 4);
    let thrusts: Vec<u16> = sent
        .iter()
        .map(|frame| crtp::decode_setpoint(frame).unwrap().thrust)
        .collect();
    assert_eq!(thrusts, vec![10000, 20000, 30000, 40000]);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_is_reported_and_non_fatal() {
    let (transport, session) = session();
    transport.set_fail_sends(true);

    let err = session
        .send_setpoint(SetpointCommand::default())
        .await
        .unwrap_err();
    assert_eq!(err.0.kind(), io::ErrorKind::NetworkUnreachable);
    assert!(session.last_transport_error().is_some());

    transport.set_fail_sends(false);
    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(
        session.send_setpoint(SetpointCommand::default()).await.unwrap(),
        SendOutcome::Sent
    );
    assert!(session.last_transport_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_sends_ping_without_throttling() {
    let (transport, session) = session();

    session.send_setpoint(SetpointCommand::default()).await.unwrap();
    session.request_telemetry_refresh().await.unwrap();
    session.request_telemetry_refresh().await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1], crtp::REFRESH_PING.to_vec());
    assert_eq!(sent[2], crtp::REFRESH_PING.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_successful_poll_updates_cache() {
    let (transport, session) = session();
    assert_eq!(session.link_state(), LinkState::Disconnected);
    assert!(session.telemetry().timestamp.is_none());

    transport.queue_packet(packet(76));
    let frame = session.poll_telemetry().await.unwrap();

    assert!(frame.connected);
    assert_eq!(frame.link_state, LinkState::Connected);
    assert_eq!(frame.battery, 76);
    assert!(frame.timestamp.is_some());
    assert_eq!(session.telemetry(), frame);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_keep_last_values() {
    let (transport, session) = session();
    transport.queue_packet(packet(64));
    let good = session.poll_telemetry().await.unwrap();

    transport.queue(Reply::Timeout);
    transport.queue(Reply::Frame(vec![0x50, 1, 2]));
    transport.queue(Reply::SocketError);
    let mut wrong_port_frame = crtp::encode_telemetry(&packet(1)).to_vec();
    wrong_port_frame[0] = crtp::SETPOINT_HEADER;
    transport.queue(Reply::Frame(wrong_port_frame));

    assert!(matches!(
        session.poll_telemetry().await,
        Err(PollFailure::Timeout(_))
    ));
    assert!(matches!(
        session.poll_telemetry().await,
        Err(PollFailure::Decode(DecodeError::MalformedFrame(_)))
    ));
    assert!(matches!(
        session.poll_telemetry().await,
        Err(PollFailure::Transport(_))
    ));
    assert!(matches!(
        session.poll_telemetry().await,
        Err(PollFailure::Decode(DecodeError::MalformedFrame(_)))
    ));

    let stale = session.telemetry();
    assert!(!stale.connected);
    assert_eq!(stale.link_state, LinkState::Disconnected);
    assert_eq!(stale.battery, good.battery);
    assert_eq!(stale.altitude, good.altitude);
    assert_eq!(stale.roll, good.roll);
    assert_eq!(stale.pitch, good.pitch);
    assert_eq!(stale.yaw, good.yaw);
    assert_eq!(stale.timestamp, good.timestamp);

    // The next good frame brings the link straight back
    transport.queue_packet(packet(63));
    assert!(session.poll_telemetry().await.unwrap().connected);
}

#[tokio::test(start_paused = true)]
async fn test_telemetry_goes_stale_without_polls() {
    let (transport, session) = session();
    transport.queue_packet(packet(90));
    session.poll_telemetry().await.unwrap();

    tokio::time::advance(Duration::from_millis(2999)).await;
    assert!(session.telemetry().connected);

    tokio::time::advance(Duration::from_millis(2)).await;
    let frame = session.telemetry();
    assert!(!frame.connected);
    assert_eq!(frame.battery, 90);
}

#[tokio::test(start_paused = true)]
async fn test_poller_drives_polls_until_stopped() {
    let (transport, session) = session();
    transport.queue_packet(packet(80));
    transport.queue_packet(packet(79));

    let poller = Arc::new(TelemetryPoller::new(session.clone()));
    let handle = tokio::spawn({
        let poller = poller.clone();
        async move { poller.start().await }
    });

    // Ticks at 0s and 1s deliver frames, the tick at 2s times out
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(poller.is_running());
    let frame = session.telemetry();
    assert_eq!(frame.battery, 79);
    assert!(!frame.connected);

    poller.stop().await;
    handle.await.unwrap().unwrap();
    assert!(!poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_link_is_connecting_while_first_poll_is_in_flight() {
    let (transport, session) = session();
    transport.queue(Reply::Late(
        Duration::from_millis(500),
        crtp::encode_telemetry(&packet(55)).to_vec(),
    ));

    let poll = tokio::spawn({
        let session = session.clone();
        async move { session.poll_telemetry().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pending = session.telemetry();
    assert_eq!(pending.link_state, LinkState::Connecting);
    assert!(!pending.connected);
    assert!(pending.timestamp.is_none());

    let frame = poll.await.unwrap().unwrap();
    assert_eq!(frame.link_state, LinkState::Connected);
    assert_eq!(session.telemetry().battery, 55);
}

#[tokio::test]
async fn test_poller_refuses_zero_interval() {
    let config = LinkConfig {
        poll_interval_ms: 0,
        ..Default::default()
    };
    let session = Arc::new(LinkSession::new(
        Arc::new(MockTransport::default()),
        &config,
    ));
    let poller = TelemetryPoller::new(session);

    assert!(poller.start().await.is_err());
    assert!(!poller.is_running());
}
