//! ARM PL011 UART driver.

use arm_pl011::Pl011Uart;
use lazyinit::LazyInit;
use memory_addr::VirtAddr;

use crate::hal::Mutex;

static UART: LazyInit<Mutex<Pl011Uart>> = LazyInit::new();

fn do_putchar(uart: &mut Pl011Uart, c: u8) {
    match c {
        b'\n' => {
            uart.putchar(b'\r');
            uart.putchar(b'\n');
        }
        c => uart.putchar(c),
    }
}

/// Writes a string to the UART, holding the lock for the whole string.
///
/// Output before [`init`] is dropped.
pub fn puts(s: &str) {
    if let Some(uart) = UART.get() {
        let mut uart = uart.lock();
        for &c in s.as_bytes() {
            do_putchar(&mut uart, c);
        }
    }
}

/// Brings up the UART at `uart_base`.
pub fn init(uart_base: VirtAddr) {
    UART.init_once(Mutex::new(Pl011Uart::new(uart_base.as_mut_ptr())));
    UART.lock().init();
}
