use core::hint;

/// A serial output
pub trait Serial {
    /// Writes a format string
    fn write_fmt(&self, bytes: core::fmt::Arguments);

    /// Attempt to read a byte as input, without blocking
    fn read_byte(&self) -> Option<u8>;

    /// Writes a single byte, blocking until it is accepted
    fn putc(&self, byte: u8) {
        self.write_fmt(format_args!("{}", byte as char));
    }

    /// Writes a string, blocking until every byte is accepted
    fn puts(&self, s: &str) {
        self.write_fmt(format_args!("{s}"));
    }

    /// Reads a byte, blocking (spinning) until one is available
    fn getc(&self) -> u8 {
        loop {
            if let Some(byte) = self.read_byte() {
                return byte;
            }
            hint::spin_loop();
        }
    }

    /// Reads a byte if one is immediately available, without blocking
    fn getc_nonblock(&self) -> Option<u8> {
        self.read_byte()
    }
}

/// Backspace
const BS: u8 = 0x08;
/// Delete
const DEL: u8 = 0x7F;
/// Ctrl-C
const ETX: u8 = 0x03;
/// Ctrl-U
const NAK: u8 = 0x15;
/// Tab
const TAB: u8 = 0x09;
/// Start of an ANSI escape sequence
const ESC: u8 = 0x1B;

/// Erases everything currently echoed for `buf` and replaces its contents with `text`
fn replace_line<const N: usize>(serial: &dyn Serial, buf: &mut heapless::String<N>, text: &str) {
    while buf.pop().is_some() {
        serial.puts("\u{8} \u{8}");
    }
    let text = &text[..text.len().min(N)];
    if buf.push_str(text).is_ok() {
        serial.puts(text);
    }
}

/// Reads one line of input, echoing as the user types
///
/// Backspace/delete erase the last character; Ctrl-U erases the whole line; Ctrl-C abandons the
/// line and returns it empty. Tab asks `complete` for a single unambiguous completion of the text
/// so far and, if one exists, echoes the remainder. The ANSI CSI sequences `ESC [ A`/`ESC [ B`
/// (Up/Down) walk `history`, oldest-to-newest, replacing the line in place; Down past the newest
/// entry returns to an empty line. The line is returned without its trailing newline.
pub fn read_line<const N: usize>(
    serial: &dyn Serial,
    buf: &mut heapless::String<N>,
    history: &[heapless::String<N>],
    mut complete: impl FnMut(&str) -> Option<&'static str>,
) {
    buf.clear();
    let mut hist_idx = history.len();
    loop {
        match serial.getc() {
            b'\r' | b'\n' => {
                serial.puts("\r\n");
                return;
            }
            ETX => {
                buf.clear();
                serial.puts("\r\n");
                return;
            }
            NAK => {
                while !buf.is_empty() {
                    buf.pop();
                    serial.puts("\u{8} \u{8}");
                }
            }
            BS | DEL => {
                if buf.pop().is_some() {
                    serial.puts("\u{8} \u{8}");
                }
            }
            TAB => {
                if let Some(completion) = complete(buf.as_str()) {
                    let remainder = &completion[buf.len()..];
                    if buf.push_str(remainder).is_ok() {
                        serial.puts(remainder);
                    }
                }
            }
            ESC => {
                if serial.getc() != b'[' {
                    continue;
                }
                match serial.getc() {
                    b'A' if hist_idx > 0 => {
                        hist_idx -= 1;
                        replace_line(serial, buf, history[hist_idx].as_str());
                    }
                    b'B' if hist_idx < history.len() => {
                        hist_idx += 1;
                        let text = history.get(hist_idx).map_or("", |line| line.as_str());
                        replace_line(serial, buf, text);
                    }
                    _ => {}
                }
            }
            byte @ 0x20..=0x7E if buf.push(byte as char).is_ok() => {
                serial.putc(byte);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    /// A fake serial port: `input` is consumed byte by byte by `getc`, `output` records every
    /// byte written via `putc`/`puts`
    struct FakeSerial {
        input: RefCell<alloc::vec::Vec<u8>>,
        output: RefCell<alloc::string::String>,
    }

    impl FakeSerial {
        fn new(input: &str) -> Self {
            let mut bytes: alloc::vec::Vec<u8> = input.bytes().collect();
            bytes.reverse();
            Self { input: RefCell::new(bytes), output: RefCell::new(alloc::string::String::new()) }
        }
    }

    impl Serial for FakeSerial {
        fn write_fmt(&self, args: core::fmt::Arguments) {
            use core::fmt::Write;
            let _ = self.output.borrow_mut().write_fmt(args);
        }

        fn read_byte(&self) -> Option<u8> {
            self.input.borrow_mut().pop()
        }
    }

    fn history() -> [heapless::String<32>; 2] {
        [heapless::String::try_from("first").unwrap(), heapless::String::try_from("second").unwrap()]
    }

    #[test]
    fn up_recalls_most_recent_history_entry() {
        let serial = FakeSerial::new("\x1B[A\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &history(), |_| None);
        assert_eq!(buf.as_str(), "second");
    }

    #[test]
    fn up_twice_walks_further_back() {
        let serial = FakeSerial::new("\x1B[A\x1B[A\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &history(), |_| None);
        assert_eq!(buf.as_str(), "first");
    }

    #[test]
    fn up_past_oldest_entry_stays_put() {
        let serial = FakeSerial::new("\x1B[A\x1B[A\x1B[A\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &history(), |_| None);
        assert_eq!(buf.as_str(), "first");
    }

    #[test]
    fn down_after_up_returns_to_empty_line() {
        let serial = FakeSerial::new("\x1B[A\x1B[B\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &history(), |_| None);
        assert_eq!(buf.as_str(), "");
    }

    #[test]
    fn recalled_line_can_still_be_edited() {
        let serial = FakeSerial::new("\x1B[A!\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &history(), |_| None);
        assert_eq!(buf.as_str(), "second!");
    }

    #[test]
    fn no_history_leaves_arrow_keys_inert() {
        let serial = FakeSerial::new("\x1B[Ax\r");
        let mut buf: heapless::String<32> = heapless::String::new();
        read_line(&serial, &mut buf, &[], |_| None);
        assert_eq!(buf.as_str(), "x");
    }
}
