//! Integration tests: a scripted backend driven through `DisplaySession`,
//! with every outward instruction and backend call recorded in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rfbridge_core::display::{AudioStream, Clock, OwnedBuffer, ResidueChain};
use rfbridge_core::{
    AbortStatus, Backend, BackendEvents, BackendResidue, BridgeError, ButtonMask, ChannelOutward,
    CompositeMode, CursorShape, DisplaySession, FatalError, FrameBuffer, Instruction, Layer,
    ManualClock, MaskBuffer, Outward, PixelFormat, Point, PumpOutcome, Rect, SessionConfig,
    SessionPhase, TeardownStep, WaitOutcome,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

// ── Helpers ──────────────────────────────────────────────────────

/// Shared, ordered record of everything that happened.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Outward sink that keeps every instruction and journals its opcode.
#[derive(Clone, Default)]
struct Recorder {
    journal: Journal,
    sent: Arc<Mutex<Vec<Instruction>>>,
}

impl Recorder {
    fn take(&self) -> Vec<Instruction> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Outward for Recorder {
    fn send(&self, instruction: Instruction) -> Result<(), BridgeError> {
        self.journal.push(format!("send {}", instruction.opcode()));
        self.sent.lock().unwrap().push(instruction);
        Ok(())
    }
}

/// One server message and what it triggers.
enum Msg {
    Update { pixel: u32, width: u32, height: u32, region: Rect },
    CopyRect { src: Rect, dst: Point },
    Cursor { hotspot: (i32, i32), width: u32, height: u32, mask: Vec<u8> },
    Resize { width: u32, height: u32, allocate_ok: bool },
    CutText(Vec<u8>),
    AskPassword,
    Fail,
}

type Script = Arc<Mutex<VecDeque<Msg>>>;

/// Backend that replays a script, spending `cost` clock time per message.
struct ScriptedBackend {
    clock: ManualClock,
    cost: Duration,
    script: Script,
    wait_fails: bool,
    journal: Journal,
}

impl ScriptedBackend {
    fn new(clock: &ManualClock, cost_ms: u64, journal: &Journal) -> (Self, Script) {
        let script = Script::default();
        let backend = Self {
            clock: clock.clone(),
            cost: Duration::from_millis(cost_ms),
            script: Arc::clone(&script),
            wait_fails: false,
            journal: journal.clone(),
        };
        (backend, script)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn wait_for_message(&mut self, timeout: Duration) -> WaitOutcome {
        if self.wait_fails {
            return WaitOutcome::Error;
        }
        if self.script.lock().unwrap().is_empty() {
            self.clock.advance(timeout);
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Ready
        }
    }

    async fn handle_message(&mut self, events: &mut dyn BackendEvents) -> bool {
        let Some(msg) = self.script.lock().unwrap().pop_front() else {
            return false;
        };
        self.clock.advance(self.cost);

        match msg {
            Msg::Update { pixel, width, height, region } => {
                let data: Vec<u8> = (0..width * height).flat_map(|_| pixel.to_le_bytes()).collect();
                let fb = FrameBuffer::new(&data, width, height, PixelFormat::RGB888);
                events.on_rect_update(&fb, region);
            }
            Msg::CopyRect { src, dst } => events.on_copy_rect(src, dst),
            Msg::Cursor { hotspot, width, height, mask } => {
                let source: Vec<u8> = (0..width * height)
                    .flat_map(|_| 0x00FF_0000u32.to_le_bytes())
                    .collect();
                events.on_cursor_shape(
                    hotspot,
                    CursorShape {
                        width,
                        height,
                        bytes_per_pixel: 4,
                        source: &source,
                        mask: MaskBuffer::new(mask),
                    },
                );
            }
            Msg::Resize { width, height, allocate_ok } => {
                let journal = self.journal.clone();
                let ok = events.on_resize(width, height, &mut |w, h| {
                    journal.push(format!("allocate {w}x{h}"));
                    allocate_ok
                });
                self.journal.push(format!("resize -> {ok}"));
            }
            Msg::CutText(text) => events.on_cut_text(Some(&text)),
            Msg::AskPassword => {
                let password = events.password().unwrap_or_default();
                self.journal.push(format!("password {password}"));
            }
            Msg::Fail => return false,
        }
        true
    }

    fn send_pointer(&mut self, x: i32, y: i32, buttons: ButtonMask) -> Result<(), BridgeError> {
        self.journal.push(format!("pointer {x},{y} {:#04x}", buttons.bits()));
        Ok(())
    }

    fn send_key(&mut self, keysym: u32, pressed: bool) -> Result<(), BridgeError> {
        self.journal.push(format!("key {keysym:#x} {pressed}"));
        Ok(())
    }

    fn send_cut_text(&mut self, text: &[u8]) -> Result<(), BridgeError> {
        self.journal.push(format!("cut_text {text:?}"));
        Ok(())
    }

    fn take_residue(&mut self) -> BackendResidue {
        self.journal.push("residue");
        let mut client_data = ResidueChain::new();
        for size in [8, 8, 16] {
            client_data.push_front(vec![0; size]);
        }
        BackendResidue {
            framebuffer: Some(OwnedBuffer::new("framebuffer", vec![0; 64])),
            raw_buffer: None,
            cursor_source: None,
            client_data,
        }
    }

    fn cleanup(self) {
        self.journal.push("cleanup");
    }
}

struct RecordingAudio(Journal);

impl AudioStream for RecordingAudio {
    fn enabled(&self) -> bool {
        true
    }

    fn stop(&mut self) {
        self.0.push("audio stop");
    }
}

struct Harness {
    session: DisplaySession<ScriptedBackend>,
    script: Script,
    out: Recorder,
    journal: Journal,
    clock: ManualClock,
}

fn harness(config: SessionConfig, cost_ms: u64) -> Harness {
    let journal = Journal::default();
    let clock = ManualClock::new();
    let out = Recorder {
        journal: journal.clone(),
        ..Default::default()
    };
    let (backend, script) = ScriptedBackend::new(&clock, cost_ms, &journal);
    let session = DisplaySession::with_parts(
        backend,
        Arc::new(out.clone()),
        config,
        Arc::new(clock.clone()),
        CancellationToken::new(),
    )
    .unwrap();
    Harness {
        session,
        script,
        out,
        journal,
        clock,
    }
}

fn push(script: &Script, msg: Msg) {
    script.lock().unwrap().push_back(msg);
}

fn update(region: Rect) -> Msg {
    Msg::Update {
        pixel: 0x0011_2233,
        width: 16,
        height: 16,
        region,
    }
}

// ── Update dispatch ──────────────────────────────────────────────

#[tokio::test]
async fn update_becomes_opaque_rgb_image() {
    let mut h = harness(SessionConfig::default(), 1);
    push(&h.script, update(Rect::new(2, 3, 4, 5)));

    let outcome = h.session.handle_messages().await.unwrap();
    assert_eq!(outcome, PumpOutcome::TimedOut { handled: 1 });

    let sent = h.out.take();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Instruction::Image { mode, layer, x, y, image } => {
            assert_eq!(*mode, CompositeMode::Overwrite);
            assert_eq!(*layer, Layer::DEFAULT);
            assert_eq!((*x, *y), (2, 3));
            assert_eq!((image.width, image.height), (4, 5));
            assert!(image.pixels().iter().all(|&p| p == 0xFF11_2233));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn swapped_session_emits_bgr() {
    let config = SessionConfig {
        swap_red_blue: true,
        ..Default::default()
    };
    let mut h = harness(config, 1);
    push(&h.script, update(Rect::new(0, 0, 1, 1)));

    h.session.handle_messages().await.unwrap();

    match &h.out.take()[0] {
        Instruction::Image { image, .. } => assert_eq!(image.get(0, 0), 0xFF33_2211),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn copy_rect_absorbs_exactly_the_next_update() {
    let mut h = harness(SessionConfig::default(), 1);
    push(
        &h.script,
        Msg::CopyRect {
            src: Rect::new(0, 0, 8, 8),
            dst: Point::new(4, 4),
        },
    );
    push(&h.script, update(Rect::new(4, 4, 8, 8)));
    push(&h.script, update(Rect::new(0, 0, 2, 2)));

    let outcome = h.session.handle_messages().await.unwrap();
    assert_eq!(outcome.handled(), 3);

    let sent = h.out.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[0],
        Instruction::Copy {
            src_layer: Layer::DEFAULT,
            src_x: 0,
            src_y: 0,
            width: 8,
            height: 8,
            mode: CompositeMode::Overwrite,
            dst_layer: Layer::DEFAULT,
            dst_x: 4,
            dst_y: 4,
        }
    );
    assert!(matches!(sent[1], Instruction::Image { x: 0, y: 0, .. }));
}

#[tokio::test]
async fn copy_rect_flag_does_not_cross_frames() {
    let mut h = harness(SessionConfig::default(), 1);
    push(
        &h.script,
        Msg::CopyRect {
            src: Rect::new(0, 0, 4, 4),
            dst: Point::new(8, 8),
        },
    );
    h.session.handle_messages().await.unwrap();
    assert_eq!(h.out.take().len(), 1);

    push(&h.script, update(Rect::new(8, 8, 4, 4)));
    h.session.handle_messages().await.unwrap();

    let sent = h.out.take();
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0], Instruction::Image { x: 8, y: 8, .. }));
}

#[tokio::test]
async fn out_of_bounds_update_is_dropped_without_ending_session() {
    let mut h = harness(SessionConfig::default(), 1);
    push(&h.script, update(Rect::new(12, 12, 8, 8)));
    push(&h.script, update(Rect::new(0, 0, 1, 1)));

    let outcome = h.session.handle_messages().await.unwrap();

    assert_eq!(outcome.handled(), 2);
    assert_eq!(h.out.take().len(), 1);
    assert!(h.session.phase().is_active());
}

// ── Resize ───────────────────────────────────────────────────────

#[tokio::test]
async fn resize_announces_size_before_allocating() {
    let mut h = harness(SessionConfig::default(), 1);
    push(
        &h.script,
        Msg::Resize {
            width: 1024,
            height: 768,
            allocate_ok: false,
        },
    );

    h.session.handle_messages().await.unwrap();

    let size = h.journal.position("send size").unwrap();
    let alloc = h.journal.position("allocate 1024x768").unwrap();
    assert!(size < alloc);
    // The allocator's verdict comes back unchanged.
    assert!(h.journal.position("resize -> false").is_some());
    assert_eq!(
        h.out.take(),
        vec![Instruction::Size {
            layer: Layer::DEFAULT,
            width: 1024,
            height: 768,
        }]
    );
}

// ── Cursor ───────────────────────────────────────────────────────

#[tokio::test]
async fn five_by_three_cursor_lands_on_cursor_layer() {
    let mut h = harness(SessionConfig::default(), 1);
    push(
        &h.script,
        Msg::Cursor {
            hotspot: (2, 1),
            width: 5,
            height: 3,
            mask: vec![0b1111_1000, 0b0010_0000, 0b0000_0000],
        },
    );

    h.session.handle_messages().await.unwrap();

    let sent = h.out.take();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        Instruction::Image { mode, layer, x, y, image } => {
            assert_eq!(*mode, CompositeMode::Replace);
            assert_eq!(*layer, Layer::buffer(0));
            assert_eq!((*x, *y), (0, 0));
            assert_eq!(image.get(0, 0), 0xFFFF_0000);
            assert_eq!(image.get(2, 1), 0xFFFF_0000);
            assert_eq!(image.get(1, 1), 0x00FF_0000);
            assert_eq!(image.get(4, 2) >> 24, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        sent[1],
        Instruction::Cursor {
            hotspot_x: 2,
            hotspot_y: 1,
            layer: Layer::buffer(0),
            src_x: 0,
            src_y: 0,
            width: 5,
            height: 3,
        }
    );
}

#[tokio::test]
async fn short_cursor_mask_is_dropped() {
    let mut h = harness(SessionConfig::default(), 1);
    push(
        &h.script,
        Msg::Cursor {
            hotspot: (0, 0),
            width: 5,
            height: 3,
            mask: vec![0xFF],
        },
    );

    let outcome = h.session.handle_messages().await.unwrap();

    assert_eq!(outcome.handled(), 1);
    assert!(h.out.take().is_empty());
}

// ── Frame pacing ─────────────────────────────────────────────────

#[tokio::test]
async fn burst_is_bounded_by_frame_duration() {
    let mut h = harness(SessionConfig::default(), 15);
    for _ in 0..10 {
        push(&h.script, update(Rect::new(0, 0, 1, 1)));
    }

    let outcome = h.session.handle_messages().await.unwrap();

    // 40 ms window, 15 ms per message: the third one overruns it.
    assert_eq!(outcome, PumpOutcome::FrameComplete { handled: 3 });
    assert_eq!(h.script.lock().unwrap().len(), 7);
    assert_eq!(h.clock.now(), Duration::from_millis(45));

    let outcome = h.session.handle_messages().await.unwrap();
    assert_eq!(outcome.handled(), 3);
}

#[tokio::test]
async fn cancelled_session_returns_before_waiting() {
    let mut h = harness(SessionConfig::default(), 1);
    push(&h.script, update(Rect::new(0, 0, 1, 1)));
    h.session.cancel_token().cancel();

    let outcome = h.session.handle_messages().await.unwrap();

    assert_eq!(outcome, PumpOutcome::Cancelled { handled: 0 });
    assert_eq!(h.script.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn closed_outward_channel_stops_the_pump() {
    let journal = Journal::default();
    let clock = ManualClock::new();
    let (backend, script) = ScriptedBackend::new(&clock, 1, &journal);
    let (out, rx) = ChannelOutward::new(CancellationToken::new());
    let mut session = DisplaySession::with_parts(
        backend,
        Arc::new(out),
        SessionConfig::default(),
        Arc::new(clock),
        CancellationToken::new(),
    )
    .unwrap();
    drop(rx);
    push(&script, update(Rect::new(0, 0, 1, 1)));
    push(&script, update(Rect::new(0, 0, 1, 1)));

    let outcome = session.handle_messages().await.unwrap();

    assert_eq!(outcome, PumpOutcome::Cancelled { handled: 1 });
    session.free_session().unwrap();
}

// ── Fatal errors ─────────────────────────────────────────────────

#[tokio::test]
async fn handler_failure_aborts_once_and_rejects_later_calls() {
    let mut h = harness(SessionConfig::default(), 1);
    push(&h.script, update(Rect::new(0, 0, 1, 1)));
    push(&h.script, Msg::Fail);
    push(&h.script, update(Rect::new(0, 0, 1, 1)));

    let err = assert_err!(h.session.handle_messages().await);
    assert!(matches!(err, BridgeError::Fatal(FatalError::UpstreamError)));
    assert_eq!(h.session.phase(), SessionPhase::Aborted(FatalError::UpstreamError));

    let sent = h.out.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1],
        Instruction::Abort {
            status: AbortStatus::UpstreamError,
            message: "Error handling message from VNC server.".into(),
        }
    );

    assert!(matches!(
        h.session.handle_messages().await,
        Err(BridgeError::SessionClosed)
    ));
    assert!(matches!(
        h.session.handle_mouse(1, 1, ButtonMask::LEFT),
        Err(BridgeError::SessionClosed)
    ));
    assert!(h.out.take().is_empty());
    assert!(!h.journal.entries().iter().any(|e| e.starts_with("pointer")));
    assert_eq!(h.script.lock().unwrap().len(), 1);

    h.session.free_session().unwrap();
}

#[tokio::test]
async fn wait_failure_reports_connection_closed() {
    let journal = Journal::default();
    let clock = ManualClock::new();
    let out = Recorder::default();
    let (mut backend, _script) = ScriptedBackend::new(&clock, 1, &journal);
    backend.wait_fails = true;
    let mut session = DisplaySession::with_parts(
        backend,
        Arc::new(out.clone()),
        SessionConfig::default(),
        Arc::new(clock),
        CancellationToken::new(),
    )
    .unwrap();

    let err = session.handle_messages().await.unwrap_err();

    assert!(matches!(err, BridgeError::Fatal(FatalError::ConnectionClosed)));
    assert_eq!(
        out.take(),
        vec![Instruction::Abort {
            status: AbortStatus::UpstreamError,
            message: "Connection closed.".into(),
        }]
    );
    session.free_session().unwrap();
}

// ── Teardown ─────────────────────────────────────────────────────

#[tokio::test]
async fn free_session_runs_every_step_in_order() {
    let config = SessionConfig {
        encodings: Some("copyrect hextile raw".into()),
        ..Default::default()
    };
    let mut h = harness(config, 1);
    h.session
        .attach_audio(Box::new(RecordingAudio(h.journal.clone())))
        .unwrap();
    assert_eq!(h.session.encodings(), Some("copyrect hextile raw"));

    let report = h.session.free_session().unwrap();

    assert_eq!(
        report.steps,
        vec![
            TeardownStep::StopAudio,
            TeardownStep::FreeEncodings,
            TeardownStep::FreeClipboard,
            TeardownStep::FreeSessionState,
            TeardownStep::ReleaseResidue,
            TeardownStep::BackendCleanup,
        ]
    );
    assert_eq!(report.residue.buffers, 1);
    assert_eq!(report.residue.chain_nodes, 3);
    assert_eq!(report.residue.bytes, 64 + 32);
    assert_eq!(h.journal.entries(), vec!["audio stop", "residue", "cleanup"]);
    assert!(h.session.phase().is_closed());
}

#[tokio::test]
async fn free_session_is_terminal() {
    let mut h = harness(SessionConfig::default(), 1);
    let report = assert_ok!(h.session.free_session());
    assert!(!report.steps.contains(&TeardownStep::StopAudio));
    assert!(!report.steps.contains(&TeardownStep::FreeEncodings));

    assert!(matches!(h.session.free_session(), Err(BridgeError::SessionClosed)));
    assert!(matches!(
        h.session.handle_messages().await,
        Err(BridgeError::SessionClosed)
    ));
    assert!(matches!(h.session.handle_key(0x61, true), Err(BridgeError::SessionClosed)));
    assert_eq!(
        h.journal
            .entries()
            .iter()
            .filter(|e| e.as_str() == "cleanup")
            .count(),
        1
    );
}

#[tokio::test]
async fn dropping_a_live_session_still_tears_down() {
    let h = harness(SessionConfig::default(), 1);
    let journal = h.journal.clone();
    drop(h);

    assert_eq!(journal.entries(), vec!["residue", "cleanup"]);
}

// ── Clipboard ────────────────────────────────────────────────────

#[tokio::test]
async fn server_clipboard_reaches_client_as_utf8() {
    let mut h = harness(SessionConfig::default(), 1);
    push(&h.script, Msg::CutText(b"na\xefve".to_vec()));
    push(&h.script, Msg::CutText(Vec::new()));

    h.session.handle_messages().await.unwrap();

    assert_eq!(
        h.out.take(),
        vec![Instruction::Clipboard {
            text: "naïve".into()
        }]
    );
}

#[tokio::test]
async fn client_clipboard_stream_reaches_server_as_latin1() {
    let mut h = harness(SessionConfig::default(), 1);

    assert!(h.session.handle_clipboard_receive(7, "text/plain").unwrap());
    assert_eq!(h.session.handle_clipboard_blob(7, "café".as_bytes()).unwrap(), 5);
    assert_eq!(h.session.handle_clipboard_blob(7, " €".as_bytes()).unwrap(), 4);
    assert!(h.session.handle_clipboard_end(7).unwrap());

    assert_eq!(
        h.journal.entries(),
        vec![format!("cut_text {:?}", b"caf\xe9 ?")]
    );
}

#[tokio::test]
async fn non_text_clipboard_stream_is_ignored() {
    let mut h = harness(SessionConfig::default(), 1);

    assert!(!h.session.handle_clipboard_receive(2, "image/png").unwrap());
    assert_eq!(h.session.handle_clipboard_blob(2, b"\x89PNG").unwrap(), 0);
    assert!(!h.session.handle_clipboard_end(2).unwrap());
    assert!(h.journal.entries().is_empty());
}

#[tokio::test]
async fn clipboard_stream_is_capped() {
    let config = SessionConfig {
        clipboard_limit: 3,
        ..Default::default()
    };
    let mut h = harness(config, 1);

    h.session.handle_clipboard_receive(1, "text/plain").unwrap();
    assert_eq!(h.session.handle_clipboard_blob(1, b"abcdef").unwrap(), 3);
    h.session.handle_clipboard_end(1).unwrap();

    assert_eq!(h.journal.entries(), vec![format!("cut_text {:?}", b"abc")]);
}

// ── Input and authentication ─────────────────────────────────────

#[tokio::test]
async fn input_is_forwarded_to_backend() {
    let mut h = harness(SessionConfig::default(), 1);

    h.session
        .handle_mouse(10, 20, ButtonMask::from_client(0x05))
        .unwrap();
    assert_ok!(h.session.handle_key(0xff0d, true));
    assert_ok!(h.session.handle_key(0xff0d, false));

    assert_eq!(
        h.journal.entries(),
        vec!["pointer 10,20 0x05", "key 0xff0d true", "key 0xff0d false"]
    );
}

#[tokio::test]
async fn horizontal_scroll_buttons_reach_backend() {
    let mut h = harness(SessionConfig::default(), 1);

    assert_ok!(h.session.handle_mouse(3, 4, ButtonMask::from_client(0x61)));
    assert_ok!(h.session.handle_mouse(3, 4, ButtonMask::from_client(0x80)));

    assert_eq!(h.journal.entries(), vec!["pointer 3,4 0x61", "pointer 3,4 0x80"]);
}

#[tokio::test]
async fn password_is_supplied_on_request() {
    let config = SessionConfig {
        password: Some("s3cret".into()),
        ..Default::default()
    };
    let mut h = harness(config, 1);
    push(&h.script, Msg::AskPassword);

    h.session.handle_messages().await.unwrap();

    assert!(h.journal.position("password s3cret").is_some());
}
