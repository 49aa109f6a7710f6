use std::io::{Cursor, Error, ErrorKind, Read, Result};

/// Big-endian reader over borrowed sample or aux info bytes.
#[derive(Clone)]
pub struct Reader<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn has_more_data(&self) -> bool {
        self.inner.position() < (self.inner.get_ref().len() as u64)
    }

    pub fn get_length(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn get_position(&self) -> u64 {
        self.inner.position()
    }

    pub fn remaining(&self) -> u64 {
        self.get_length().saturating_sub(self.get_position())
    }

    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        let position = self.get_position() + bytes;

        if position > self.get_length() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                "Reader skips out of memory bounds.",
            ));
        }

        self.inner.set_position(position);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read an unsigned integer stored on `size` bytes (1 to 8).
    pub fn read_uint(&mut self, size: usize) -> Result<u64> {
        if size == 0 || size > 8 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("cannot read a {}-byte integer", size),
            ));
        }

        let mut buf = [0; 8];
        self.inner.read_exact(&mut buf[8 - size..])?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Read an AV1 `leb128()` value.
    pub fn read_leb128(&mut self) -> Result<u64> {
        let mut value = 0;

        for i in 0..8 {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7f) as u64) << (i * 7);

            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(Error::new(
            ErrorKind::InvalidData,
            "leb128 value longer than 8 bytes",
        ))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bytes_u8(&mut self, bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; bytes];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xff];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.remaining(), 1);
        assert!(reader.read_u16().is_err());
    }

    #[test]
    fn test_read_uint() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_uint(3).unwrap(), 0x010203);
        assert!(!reader.has_more_data());
        assert!(reader.read_uint(9).is_err());
    }

    #[test]
    fn test_read_leb128() {
        let data = [0xe5, 0x8e, 0x26, 0x05];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_leb128().unwrap(), 624485);
        assert_eq!(reader.read_leb128().unwrap(), 5);
    }

    #[test]
    fn test_skip_bounds() {
        let data = [0; 4];
        let mut reader = Reader::new(&data);
        assert!(reader.skip(4).is_ok());
        assert!(reader.skip(1).is_err());
    }
}
