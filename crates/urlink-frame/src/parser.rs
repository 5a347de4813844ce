use crate::error::ParseError;

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Cursor-based big-endian decoder over a borrowed payload.
///
/// Every advance is bounds-checked. A failed read returns
/// [`ParseError::Truncated`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct BinParser<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! parse_be {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Read a big-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self) -> ParseResult<$ty> {
                Ok(<$ty>::from_be_bytes(self.take_array()?))
            }
        )*
    };
}

impl<'a> BinParser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the payload.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn check(&self, needed: usize) -> ParseResult<()> {
        if needed > self.remaining() {
            return Err(ParseError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        self.check(n)?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> ParseResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    parse_be! {
        parse_u8 => u8,
        parse_i8 => i8,
        parse_u16 => u16,
        parse_i16 => i16,
        parse_u32 => u32,
        parse_i32 => i32,
        parse_u64 => u64,
        parse_i64 => i64,
        parse_f32 => f32,
        parse_f64 => f64,
    }

    /// Read a single byte as a boolean (non-zero is `true`).
    pub fn parse_bool(&mut self) -> ParseResult<bool> {
        Ok(self.parse_u8()? != 0)
    }

    /// Read `n` raw bytes.
    pub fn parse_bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        self.take(n)
    }

    /// Read `N` big-endian `u32` values. All-or-nothing.
    pub fn parse_u32_array<const N: usize>(&mut self) -> ParseResult<[u32; N]> {
        self.check(N * 4)?;
        let mut out = [0u32; N];
        for value in out.iter_mut() {
            *value = self.parse_u32()?;
        }
        Ok(out)
    }

    /// Read `N` big-endian `f64` values. All-or-nothing.
    pub fn parse_f64_array<const N: usize>(&mut self) -> ParseResult<[f64; N]> {
        self.check(N * 8)?;
        let mut out = [0f64; N];
        for value in out.iter_mut() {
            *value = self.parse_f64()?;
        }
        Ok(out)
    }

    /// Read `len` bytes as text. Invalid UTF-8 is replaced, not rejected.
    pub fn parse_string(&mut self, len: usize) -> ParseResult<String> {
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    /// Consume everything up to the end of the payload as text.
    ///
    /// Only valid as the last field of a package.
    pub fn parse_remainder_as_string(&mut self) -> String {
        String::from_utf8_lossy(self.parse_remainder()).into_owned()
    }

    /// Consume everything up to the end of the payload.
    pub fn parse_remainder(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Look at the next big-endian `u32` without consuming it.
    pub fn peek_u32(&self) -> ParseResult<u32> {
        self.check(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        Ok(u32::from_be_bytes(raw))
    }

    /// Split off the next `len` bytes as an independent parser, advancing
    /// this one past them.
    pub fn sub_parser(&mut self, len: usize) -> ParseResult<BinParser<'a>> {
        Ok(BinParser::new(self.take(len)?))
    }

    /// Assert the payload has been consumed exactly.
    pub fn finish(&self) -> ParseResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(ParseError::Trailing { remaining }),
        }
    }
}
