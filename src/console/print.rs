//! Console print macros.
//!
//! Output goes to a sink the board registers at start-up. Each call is
//! formatted into a local buffer first and handed to the sink under one
//! lock, so lines from interrupt handlers never interleave with task output.

use core::fmt::{self, Write};

use lazyinit::LazyInit;

use crate::hal::Mutex;

/// Board-provided output routine.
pub type ConsoleSink = fn(&str);

static SINK: LazyInit<ConsoleSink> = LazyInit::new();

static PRINT_LOCK: Mutex<()> = Mutex::new(());

/// Buffer size for formatting output before sending to the sink.
/// This should be large enough for most log lines.
const PRINT_BUFFER_SIZE: usize = 512;

/// Registers the console sink.
///
/// # Panics
/// If a sink is already registered.
pub fn init(sink: ConsoleSink) {
    SINK.init_once(sink);
}

pub fn is_initialized() -> bool {
    SINK.is_inited()
}

/// A printer that formats into a fixed-size buffer, then outputs atomically.
struct BufferedPrinter {
    sink: ConsoleSink,
    buffer: [u8; PRINT_BUFFER_SIZE],
    pos: usize,
}

impl BufferedPrinter {
    const fn new(sink: ConsoleSink) -> Self {
        Self {
            sink,
            buffer: [0; PRINT_BUFFER_SIZE],
            pos: 0,
        }
    }

    fn flush(&mut self) {
        if self.pos > 0 {
            // Only whole `str`s (or whole chars of one) are ever copied in.
            if let Ok(s) = core::str::from_utf8(&self.buffer[..self.pos]) {
                (self.sink)(s);
            }
            self.pos = 0;
        }
    }
}

impl Write for BufferedPrinter {
    fn write_str(&mut self, mut s: &str) -> fmt::Result {
        while !s.is_empty() {
            if self.pos == PRINT_BUFFER_SIZE {
                self.flush();
            }
            let room = PRINT_BUFFER_SIZE - self.pos;
            let mut take = s.len().min(room);
            while !s.is_char_boundary(take) {
                take -= 1;
            }
            if take == 0 {
                // The next char does not fit behind what is buffered.
                self.flush();
                continue;
            }
            self.buffer[self.pos..self.pos + take].copy_from_slice(&s.as_bytes()[..take]);
            self.pos += take;
            s = &s[take..];
        }
        Ok(())
    }
}

impl Drop for BufferedPrinter {
    fn drop(&mut self) {
        self.flush();
    }
}

pub fn _print(args: fmt::Arguments) {
    let Some(&sink) = SINK.get() else {
        return;
    };
    let _guard = PRINT_LOCK.lock();

    let mut printer = BufferedPrinter::new(sink);
    // Ignore write errors - printing should not panic
    let _ = printer.write_fmt(args);
    // Flush happens automatically in Drop
}

/// Console print operation.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ({
        $crate::console::print::_print(format_args!($($arg)*))
    });
}

/// Console print operation with newline.
#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
}
