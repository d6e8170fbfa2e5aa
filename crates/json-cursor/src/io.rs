use std::io::Read;

/// Adapts an [`io::Read`](std::io::Read) into the `Iterator<Item = u8>` the
/// lexer wants, with an internal buffer so the reader is not hit per byte.
///
/// A read error ends the byte stream; the lexer then reports it as an
/// unexpected end of input at the current location.
pub struct ReadBytes<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
}

impl<R> ReadBytes<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; 4096],
            pos: 0,
            len: 0,
        }
    }
}

impl<R: Read> Iterator for ReadBytes<R> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.pos == self.len {
            self.len = self.reader.read(&mut self.buf).ok()?;
            self.pos = 0;
            if self.len == 0 {
                return None;
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Some(b)
    }
}
