//! Bounds-checked little-endian reader over a request buffer.

use super::UrbError;

/// Forward-only cursor over a byte slice.
///
/// Every read checks the remaining length first and fails with
/// [`UrbError::Truncated`] instead of reading past the end.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor positioned at `offset`; fails if the offset is past the end.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self, UrbError> {
        let mut cursor = Self::new(data);
        cursor.skip(offset)?;
        Ok(cursor)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn skip(&mut self, count: usize) -> Result<(), UrbError> {
        self.bytes(count).map(|_| ())
    }

    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8], UrbError> {
        if count > self.remaining() {
            return Err(UrbError::Truncated {
                offset: self.pos,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], UrbError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, UrbError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, UrbError> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, UrbError> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, UrbError> {
        self.array().map(u64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_reads() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xAA];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.u16().unwrap(), 0x1234);
        assert_eq!(cursor.u32().unwrap(), 0x1234_5678);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.u8().unwrap(), 0xAA);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0u8; 3];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(2).unwrap();
        assert_eq!(
            cursor.u16(),
            Err(UrbError::Truncated {
                offset: 2,
                needed: 2,
                available: 1,
            })
        );
        // A failed read does not move the cursor.
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_at_offset() {
        let data = [1, 2, 3, 4];
        assert_eq!(ByteCursor::at(&data, 3).unwrap().rest(), &[4]);
        assert!(ByteCursor::at(&data, 4).unwrap().is_empty());
        assert!(ByteCursor::at(&data, 5).is_err());
    }
}
