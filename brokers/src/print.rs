use std::{
    fmt::{self, Write as _},
    io::{self, Write},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    amqp::Message,
    common::Handler,
    error::{Error, Result},
};

/// Formats a payload as a byte-string literal, e.g. `b'hello'`.
pub struct BytesRepr<'a>(pub &'a [u8]);

impl fmt::Display for BytesRepr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quote = if self.0.contains(&b'\'') && !self.0.contains(&b'"') {
            b'"'
        } else {
            b'\''
        };

        f.write_char('b')?;
        f.write_char(quote as char)?;
        for &byte in self.0 {
            match byte {
                b'\\' => f.write_str("\\\\")?,
                b'\t' => f.write_str("\\t")?,
                b'\n' => f.write_str("\\n")?,
                b'\r' => f.write_str("\\r")?,
                b if b == quote => {
                    f.write_char('\\')?;
                    f.write_char(b as char)?;
                }
                0x20..=0x7e => f.write_char(byte as char)?,
                _ => write!(f, "\\x{:02x}", byte)?,
            }
        }
        f.write_char(quote as char)
    }
}

/// Writes ` [x] <payload>` for every message to the wrapped writer.
pub struct PrintHandler<W> {
    out: Mutex<W>,
}

impl PrintHandler<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> PrintHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Handler for PrintHandler<W> {
    async fn handle(&self, message: &Message) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| Error::Handler("output writer poisoned".into()))?;

        writeln!(out, " [x] {}", BytesRepr(&message.data))?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn repr(data: &[u8]) -> String {
        BytesRepr(data).to_string()
    }

    #[test]
    fn plain_ascii() {
        assert_eq!(repr(b"hello"), "b'hello'");
        assert_eq!(repr(b""), "b''");
        assert_eq!(repr(b"{\"id\": 1}"), "b'{\"id\": 1}'");
    }

    #[test]
    fn escapes_control_and_high_bytes() {
        assert_eq!(repr(b"a\tb\nc\rd"), "b'a\\tb\\nc\\rd'");
        assert_eq!(repr(b"back\\slash"), "b'back\\\\slash'");
        assert_eq!(repr(&[0x00, 0x7f, 0xff]), "b'\\x00\\x7f\\xff'");
        assert_eq!(repr("ñ".as_bytes()), "b'\\xc3\\xb1'");
    }

    #[test]
    fn picks_quote_like_a_bytes_literal() {
        assert_eq!(repr(b"it's"), "b\"it's\"");
        assert_eq!(repr(b"it's \"quoted\""), "b'it\\'s \"quoted\"'");
    }

    #[tokio::test]
    async fn prints_one_line_per_message() {
        let handler = PrintHandler::new(Vec::new());

        handler
            .handle(&Message::detached(&b"hello"[..]))
            .await
            .expect("first");
        handler
            .handle(&Message::detached(&b"bye\n"[..]))
            .await
            .expect("second");

        let out = String::from_utf8(handler.into_inner()).expect("utf8");
        assert_eq!(out, " [x] b'hello'\n [x] b'bye\\n'\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_failure_is_a_handler_error() {
        let handler = PrintHandler::new(BrokenPipe);

        let err = handler
            .handle(&Message::detached(&b"lost"[..]))
            .await
            .expect_err("write should fail");

        assert!(matches!(err, Error::Io(_)));
    }
}
