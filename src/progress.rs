use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

pub const BAR_WIDTH: usize = 50;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Completed-job counter for one run. Clones share the same count.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    done: Arc<AtomicUsize>,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            done: Arc::new(AtomicUsize::new(0)),
            total,
        }
    }

    pub fn increment(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// `JOBS [=====     ] 5/10  50%`
pub fn render_line(done: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return "JOBS 0/0 complete".to_string();
    }
    let done = done.min(total);
    let filled = done * width / total;
    let percent = done * 100 / total;
    format!(
        "JOBS [{}{}] {done}/{total} {percent:>3}%",
        "=".repeat(filled),
        " ".repeat(width - filled)
    )
}

pub struct ProgressReporter;

impl ProgressReporter {
    /// Starts a thread that redraws the progress line on `writer` every
    /// `interval` until the returned handle is finished.
    pub fn spawn<W>(counter: ProgressCounter, writer: W, interval: Duration) -> ProgressHandle<W>
    where
        W: Write + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::spawn(move || -> io::Result<W> {
            let mut writer = writer;
            loop {
                draw(&mut writer, &render_line(counter.done(), counter.total(), BAR_WIDTH))?;
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let total = counter.total();
            draw(&mut writer, &render_line(total, total, BAR_WIDTH))?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(writer)
        });
        ProgressHandle { stop, thread }
    }
}

fn draw<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    queue!(writer, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line))?;
    writer.flush()
}

pub struct ProgressHandle<W> {
    stop: Sender<()>,
    thread: JoinHandle<io::Result<W>>,
}

impl<W> ProgressHandle<W> {
    /// Stops the ticker, writes the terminal line and hands the writer back.
    pub fn finish(self) -> io::Result<W> {
        let _ = self.stop.send(());
        self.thread
            .join()
            .map_err(|_| io::Error::other("progress reporter panicked"))?
    }
}
