//! Line-oriented terminal rendering of the chat widget.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chat_sync::types::display_time;
use chat_sync::{RenderedMessage, SenderType, UiSurface, WidgetIntent};
use tokio::sync::mpsc;
use tracing::debug;

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /open    show the chat
  /close   hide the chat (polling pauses)
  /toggle  show or hide the chat
  /end     end the current chat
  /quit    leave
  /help    show this help";

/// Renders chat events as plain lines on any writer.
pub struct TerminalSurface<W: Write> {
    out: W,
    waiting_banner: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            waiting_banner: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // A closed stdout leaves nothing to report to.
        let _ = writeln!(self.out, "{text}");
    }
}

impl<W: Write> UiSurface for TerminalSurface<W> {
    fn render_message(&mut self, message: &RenderedMessage<'_>, scroll: bool) {
        let who = match message.sender {
            SenderType::Customer => "You",
            SenderType::Staff if message.sender_name.is_empty() => "Support",
            SenderType::Staff => message.sender_name,
        };
        let line = format!(
            "[{}] {}: {}",
            display_time(message.timestamp),
            who,
            message.content
        );
        self.line(&line);
        if scroll {
            self.scroll_to_latest();
        }
    }

    fn clear_messages(&mut self) {
        self.waiting_banner = false;
        self.line("──────────────── conversation ────────────────");
    }

    fn set_status_text(&mut self, text: &str) {
        self.line(&format!("* {text}"));
    }

    fn show_waiting_banner(&mut self) {
        if self.waiting_banner {
            return;
        }
        self.waiting_banner = true;
        self.line("… Waiting for a support agent to join the conversation");
    }

    fn clear_waiting_banner(&mut self) {
        self.waiting_banner = false;
    }

    fn show_closed_banner(&mut self) {
        self.line("This chat has been closed. Send a message to start a new conversation.");
    }

    fn scroll_to_latest(&mut self) {
        let _ = self.out.flush();
    }
}

/// What a line of user input means.
#[derive(Debug, PartialEq, Eq)]
pub enum InputLine {
    Intent(WidgetIntent),
    Help,
    Unknown(String),
    Blank,
}

pub fn parse_input(line: &str) -> InputLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputLine::Blank;
    }
    if !trimmed.starts_with('/') {
        return InputLine::Intent(WidgetIntent::Send(trimmed.to_string()));
    }
    match trimmed {
        "/open" => InputLine::Intent(WidgetIntent::Open),
        "/close" => InputLine::Intent(WidgetIntent::Close),
        "/toggle" => InputLine::Intent(WidgetIntent::Toggle),
        "/end" => InputLine::Intent(WidgetIntent::EndChat),
        "/quit" | "/exit" => InputLine::Intent(WidgetIntent::Quit),
        "/help" => InputLine::Help,
        other => InputLine::Unknown(other.to_string()),
    }
}

/// Splits raw input bytes into lines, keeping a trailing partial line.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(
                String::from_utf8_lossy(&raw)
                    .trim_end_matches(['\r', '\n'])
                    .to_string(),
            );
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Hand one input line to the client. Returns `false` once reading should end.
fn dispatch(line: &str, tx: &mpsc::Sender<WidgetIntent>) -> bool {
    match parse_input(line) {
        InputLine::Intent(intent) => {
            let quit = intent == WidgetIntent::Quit;
            tx.blocking_send(intent).is_ok() && !quit
        }
        InputLine::Help => {
            eprintln!("{HELP}");
            true
        }
        InputLine::Unknown(cmd) => {
            eprintln!("Unknown command: {cmd} (try /help)");
            true
        }
        InputLine::Blank => true,
    }
}

/// How long the reader thread waits for input before rechecking shutdown.
#[cfg(unix)]
const READ_POLL_MS: i32 = 100;

/// Forwards input lines to the client as intents on a dedicated thread,
/// until EOF, `/quit`, or [`stop`](Self::stop).
///
/// The thread polls its source with a timeout, so a pending read never
/// keeps the process alive after the client has finished.
pub struct InputReader {
    shutdown: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl InputReader {
    pub fn stdin(tx: mpsc::Sender<WidgetIntent>) -> Self {
        Self::spawn(std::io::stdin(), tx)
    }

    #[cfg(unix)]
    pub fn spawn<R>(source: R, tx: mpsc::Sender<WidgetIntent>) -> Self
    where
        R: Read + std::os::fd::AsRawFd + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let thread = std::thread::spawn(move || read_loop(source, tx, flag));
        Self {
            shutdown,
            thread: Some(thread),
        }
    }

    /// Without `poll`, a pending read cannot be interrupted; the detached
    /// thread does not hold up process exit.
    #[cfg(not(unix))]
    pub fn spawn<R>(source: R, tx: mpsc::Sender<WidgetIntent>) -> Self
    where
        R: Read + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        std::thread::spawn(move || {
            let mut source = source;
            let mut lines = LineBuffer::default();
            let mut buf = [0u8; 8192];
            while !flag.load(Ordering::Relaxed) {
                let n = match source.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                for line in lines.push(&buf[..n]) {
                    if !dispatch(&line, &tx) {
                        return;
                    }
                }
            }
            finish_input(&mut lines, &tx, &flag);
        });
        Self {
            shutdown,
            thread: None,
        }
    }

    /// Signal the reader thread to exit and wait for it.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(unix)]
fn read_loop<R>(mut source: R, tx: mpsc::Sender<WidgetIntent>, shutdown: Arc<AtomicBool>)
where
    R: Read + std::os::fd::AsRawFd,
{
    let fd = source.as_raw_fd();
    // At least std's stdin buffer size, so reads bypass it and poll stays accurate.
    let mut buf = [0u8; 8192];
    let mut lines = LineBuffer::default();
    while !shutdown.load(Ordering::Relaxed) {
        let mut pfd = nix::libc::pollfd {
            fd,
            events: nix::libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { nix::libc::poll(&mut pfd, 1, READ_POLL_MS) };
        if ret <= 0 {
            continue;
        }
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "input closed");
                break;
            }
        };
        for line in lines.push(&buf[..n]) {
            if !dispatch(&line, &tx) {
                return;
            }
        }
    }
    finish_input(&mut lines, &tx, &shutdown);
}

/// EOF: deliver a trailing partial line, then quit.
fn finish_input(lines: &mut LineBuffer, tx: &mpsc::Sender<WidgetIntent>, shutdown: &AtomicBool) {
    if shutdown.load(Ordering::Relaxed) {
        return;
    }
    if let Some(line) = lines.finish() {
        if !dispatch(&line, tx) {
            return;
        }
    }
    let _ = tx.blocking_send(WidgetIntent::Quit);
}
