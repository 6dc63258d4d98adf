//! In-process framebuffer server for running the bridge without a VNC
//! host.
//!
//! Produces the same callback mix a real server does: an initial
//! resize, a moving colour band, a scrolling copy-rect followed by the
//! redundant update servers tend to send after one, periodic cursor
//! shapes and clipboard text.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace};

use rfbridge_core::display::{
    Backend, BackendEvents, BackendLogLevel, BackendResidue, CursorShape, FrameBuffer, MaskBuffer,
    OwnedBuffer, PixelFormat, Point, Rect, ResidueChain, WaitOutcome,
};
use rfbridge_core::{BridgeError, ButtonMask};

use crate::config::SyntheticConfig;

/// Width of the painted band.
const BAND: u32 = 32;
/// Rows moved by each scroll.
const SCROLL: u32 = 8;
/// Cursor edge length.
const CURSOR: u32 = 12;

pub struct SyntheticBackend {
    width: u32,
    height: u32,
    format: PixelFormat,
    bpp: usize,
    interval: Duration,
    cut_text_every: u64,
    disconnect_after: u64,
    next_message: Instant,
    sent: u64,
    framebuffer: Vec<u8>,
    cursor_source: Vec<u8>,
    client_data: ResidueChain,
    pointer: (i32, i32, ButtonMask),
    key_events: u64,
    received_text: Vec<u8>,
}

impl SyntheticBackend {
    pub fn new(config: &SyntheticConfig, format: PixelFormat) -> Result<Self, BridgeError> {
        format.validate()?;
        let bpp = format.pixel_width()?.bytes();
        Ok(Self {
            width: config.width.max(1),
            height: config.height.max(1),
            format,
            bpp,
            interval: Duration::from_secs(1) / config.message_rate.max(1),
            cut_text_every: config.cut_text_every,
            disconnect_after: config.disconnect_after,
            next_message: Instant::now(),
            sent: 0,
            framebuffer: Vec::new(),
            cursor_source: Vec::new(),
            client_data: ResidueChain::new(),
            pointer: (0, 0, ButtonMask::empty()),
            key_events: 0,
            received_text: Vec::new(),
        })
    }

    /// Messages produced so far.
    pub fn messages_sent(&self) -> u64 {
        self.sent
    }

    /// Last pointer state received from the client.
    pub fn pointer(&self) -> (i32, i32, ButtonMask) {
        self.pointer
    }

    pub fn key_events(&self) -> u64 {
        self.key_events
    }

    /// Last clipboard text received from the client, ISO-8859-1.
    pub fn received_text(&self) -> &[u8] {
        &self.received_text
    }

    // ── Messages ─────────────────────────────────────────────────

    fn connect(&mut self, events: &mut dyn BackendEvents) -> bool {
        events.log(BackendLogLevel::Info, "connected to synthetic server");
        if events.password().is_some() {
            debug!("password supplied for authentication");
        }
        self.client_data.push_front(format!("client-{}", self.width).into_bytes());

        let bpp = self.bpp;
        let framebuffer = &mut self.framebuffer;
        let allocated = events.on_resize(self.width, self.height, &mut |w, h| {
            let len = w as usize * h as usize * bpp;
            framebuffer.clear();
            if framebuffer.try_reserve_exact(len).is_err() {
                return false;
            }
            framebuffer.resize(len, 0);
            true
        });
        if !allocated {
            events.log(BackendLogLevel::Error, "framebuffer allocation failed");
            return false;
        }

        for y in 0..self.height {
            for x in 0..self.width {
                let shade = ((x + y) % 256) as u8;
                self.put_pixel(x, y, (shade, shade / 2, 255 - shade));
            }
        }
        self.update(events, Rect::new(0, 0, self.width, self.height));
        true
    }

    fn paint_band(&mut self, events: &mut dyn BackendEvents, tick: u64) {
        let x0 = (tick as u32).wrapping_mul(BAND) % self.width;
        let width = BAND.min(self.width - x0);
        let color = hue(tick);
        for y in 0..self.height {
            for x in x0..x0 + width {
                self.put_pixel(x, y, color);
            }
        }
        self.update(events, Rect::new(x0, 0, width, self.height));
    }

    fn scroll(&mut self, events: &mut dyn BackendEvents, tick: u64) {
        if self.height <= SCROLL {
            return self.paint_band(events, tick);
        }
        let stride = self.width as usize * self.bpp;
        for y in (0..(self.height - SCROLL) as usize).rev() {
            let src = y * stride;
            let dst = (y + SCROLL as usize) * stride;
            self.framebuffer.copy_within(src..src + stride, dst);
        }
        let moved = Rect::new(0, 0, self.width, self.height - SCROLL);
        events.on_copy_rect(moved, Point::new(0, SCROLL));
        self.update(events, Rect::new(0, SCROLL, self.width, self.height - SCROLL));
    }

    fn cursor(&mut self, events: &mut dyn BackendEvents, tick: u64) {
        let row_bytes = MaskBuffer::row_bytes(CURSOR);
        let mut mask = vec![0u8; MaskBuffer::expected_len(CURSOR, CURSOR)];
        self.cursor_source.clear();
        let color = hue(tick);
        for y in 0..CURSOR {
            for x in 0..CURSOR {
                if x <= y {
                    mask[y as usize * row_bytes + x as usize / 8] |= 0x80 >> (x % 8);
                }
                let edge = x == 0 || x == y || y == CURSOR - 1;
                let bytes = self.pixel_bytes(self.encode(if edge { (0, 0, 0) } else { color }));
                let bpp = self.bpp;
                self.cursor_source.extend_from_slice(&bytes[..bpp]);
            }
        }
        events.on_cursor_shape(
            (0, 0),
            CursorShape {
                width: CURSOR,
                height: CURSOR,
                bytes_per_pixel: self.bpp as u32,
                source: &self.cursor_source,
                mask: MaskBuffer::new(mask),
            },
        );
    }

    fn cut_text(&mut self, events: &mut dyn BackendEvents, tick: u64) {
        let mut text = format!("synthetic clipboard #{tick} ").into_bytes();
        text.push(0xA9);
        events.on_cut_text(Some(&text));
    }

    // ── Pixels ───────────────────────────────────────────────────

    fn update(&self, events: &mut dyn BackendEvents, region: Rect) {
        let fb = FrameBuffer::new(&self.framebuffer, self.width, self.height, self.format);
        events.on_rect_update(&fb, region);
    }

    fn encode(&self, (r, g, b): (u8, u8, u8)) -> u32 {
        let f = &self.format;
        let scale = |c: u8, shift: u8, max: u16| ((c as u32 * (max as u32 + 1)) / 256) << shift;
        scale(r, f.red_shift, f.red_max)
            | scale(g, f.green_shift, f.green_max)
            | scale(b, f.blue_shift, f.blue_max)
    }

    fn pixel_bytes(&self, value: u32) -> [u8; 4] {
        match (self.bpp, self.format.big_endian) {
            (1, _) => [value as u8, 0, 0, 0],
            (2, false) => {
                let [a, b] = (value as u16).to_le_bytes();
                [a, b, 0, 0]
            }
            (2, true) => {
                let [a, b] = (value as u16).to_be_bytes();
                [a, b, 0, 0]
            }
            (_, false) => value.to_le_bytes(),
            (_, true) => value.to_be_bytes(),
        }
    }

    fn put_pixel(&mut self, x: u32, y: u32, color: (u8, u8, u8)) {
        let offset = (y as usize * self.width as usize + x as usize) * self.bpp;
        let bytes = self.pixel_bytes(self.encode(color));
        if let Some(dst) = self.framebuffer.get_mut(offset..offset + self.bpp) {
            dst.copy_from_slice(&bytes[..self.bpp]);
        }
    }
}

fn hue(tick: u64) -> (u8, u8, u8) {
    let phase = (tick * 7 % 256) as u8;
    match tick % 3 {
        0 => (255, phase, 0),
        1 => (0, 255, phase),
        _ => (phase, 0, 255),
    }
}

#[async_trait]
impl Backend for SyntheticBackend {
    async fn wait_for_message(&mut self, timeout: Duration) -> WaitOutcome {
        if self.disconnect_after > 0 && self.sent >= self.disconnect_after {
            return WaitOutcome::Error;
        }
        let deadline = Instant::now() + timeout;
        if self.next_message <= deadline {
            sleep_until(self.next_message).await;
            WaitOutcome::Ready
        } else {
            sleep_until(deadline).await;
            WaitOutcome::TimedOut
        }
    }

    async fn handle_message(&mut self, events: &mut dyn BackendEvents) -> bool {
        let tick = self.sent;
        self.sent += 1;
        self.next_message = (self.next_message + self.interval).max(Instant::now());

        if tick == 0 {
            return self.connect(events);
        }
        if self.cut_text_every > 0 && tick % self.cut_text_every == 0 {
            self.cut_text(events, tick);
            return true;
        }
        match tick % 16 {
            1 => self.cursor(events, tick),
            8 => self.scroll(events, tick),
            _ => self.paint_band(events, tick),
        }
        true
    }

    fn send_pointer(&mut self, x: i32, y: i32, buttons: ButtonMask) -> Result<(), BridgeError> {
        trace!(x, y, ?buttons, "pointer");
        self.pointer = (x, y, buttons);
        Ok(())
    }

    fn send_key(&mut self, keysym: u32, pressed: bool) -> Result<(), BridgeError> {
        trace!(keysym, pressed, "key");
        self.key_events += 1;
        Ok(())
    }

    fn send_cut_text(&mut self, text: &[u8]) -> Result<(), BridgeError> {
        debug!(len = text.len(), "client clipboard received");
        self.received_text = text.to_vec();
        Ok(())
    }

    fn take_residue(&mut self) -> BackendResidue {
        let keep = |name, data: &mut Vec<u8>| {
            (!data.is_empty()).then(|| OwnedBuffer::new(name, std::mem::take(data)))
        };
        BackendResidue {
            framebuffer: keep("framebuffer", &mut self.framebuffer),
            raw_buffer: None,
            cursor_source: keep("cursor source", &mut self.cursor_source),
            client_data: std::mem::take(&mut self.client_data),
        }
    }

    fn cleanup(self) {
        info!(messages = self.sent, "synthetic server closed");
    }
}

// ── Tests ────────────────────────────────────────────────────────
