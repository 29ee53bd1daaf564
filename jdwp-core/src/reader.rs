// Decoding of JDWP wire data
//
// All multi-byte reads are big-endian; id reads use the widths
// negotiated for the connection.

use crate::protocol::{JdwpError, JdwpResult};
use crate::types::*;

/// Decoder over a reply or event payload.
///
/// Constructed with the `IdSizes` in effect when the packet was framed,
/// so typed-id reads consume exactly the negotiated number of bytes.
pub struct Reader<'a> {
    buf: &'a [u8],
    sizes: IdSizes,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], sizes: IdSizes) -> Self {
        Self { buf, sizes }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> JdwpResult<&'a [u8]> {
        if self.buf.len() < n {
            return Err(JdwpError::Decode(format!(
                "truncated payload: wanted {n} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> JdwpResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> JdwpResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> JdwpResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i16(&mut self) -> JdwpResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> JdwpResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> JdwpResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> JdwpResult<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_i64(&mut self) -> JdwpResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> JdwpResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> JdwpResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a JDWP string (4-byte length prefix + UTF-8 bytes).
    pub fn read_string(&mut self) -> JdwpResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| JdwpError::Decode(format!("invalid UTF-8 in string: {e}")))
    }

    /// Read an unsigned id of `width` bytes, big-endian.
    fn read_id(&mut self, width: u8) -> JdwpResult<u64> {
        let bytes = self.take(width as usize)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    // Object-family ids share the object-id width; the in-memory kind
    // comes from the declared field, never from the bytes.

    pub fn read_object_id(&mut self) -> JdwpResult<ObjectId> {
        Ok(ObjectId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_thread_id(&mut self) -> JdwpResult<ThreadId> {
        Ok(ThreadId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_thread_group_id(&mut self) -> JdwpResult<ThreadGroupId> {
        Ok(ThreadGroupId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_string_id(&mut self) -> JdwpResult<StringId> {
        Ok(StringId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_class_loader_id(&mut self) -> JdwpResult<ClassLoaderId> {
        Ok(ClassLoaderId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_class_object_id(&mut self) -> JdwpResult<ClassObjectId> {
        Ok(ClassObjectId(self.read_id(self.sizes.object_id_size)?))
    }

    pub fn read_array_id(&mut self) -> JdwpResult<ArrayId> {
        Ok(ArrayId(self.read_id(self.sizes.object_id_size)?))
    }

    // Type-family ids share the reference-type-id width.

    pub fn read_reference_type_id(&mut self) -> JdwpResult<ReferenceTypeId> {
        Ok(ReferenceTypeId(
            self.read_id(self.sizes.reference_type_id_size)?,
        ))
    }

    pub fn read_class_id(&mut self) -> JdwpResult<ClassId> {
        Ok(ClassId(self.read_id(self.sizes.reference_type_id_size)?))
    }

    pub fn read_method_id(&mut self) -> JdwpResult<MethodId> {
        Ok(MethodId(self.read_id(self.sizes.method_id_size)?))
    }

    pub fn read_field_id(&mut self) -> JdwpResult<FieldId> {
        Ok(FieldId(self.read_id(self.sizes.field_id_size)?))
    }

    pub fn read_frame_id(&mut self) -> JdwpResult<FrameId> {
        Ok(FrameId(self.read_id(self.sizes.frame_id_size)?))
    }

    /// Read a code location: type tag, class id, method id, index.
    pub fn read_location(&mut self) -> JdwpResult<Location> {
        let type_tag = self.read_u8()?;
        let class_id = self.read_class_id()?;
        let method_id = self.read_method_id()?;
        let index = self.read_u64()?;

        Ok(Location {
            type_tag,
            class_id,
            method_id,
            index,
        })
    }

    /// Read a tagged value: tag byte, then the payload that tag implies.
    pub fn read_value(&mut self) -> JdwpResult<Value> {
        let raw = self.read_u8()?;
        let tag = Tag::from_u8(raw)
            .ok_or_else(|| JdwpError::Decode(format!("unknown value tag: {raw:#x}")))?;

        let value = match tag {
            Tag::Void => Value::Void,
            Tag::Byte => Value::Byte(self.read_u8()? as i8),
            Tag::Char => Value::Char(self.read_u16()?),
            Tag::Short => Value::Short(self.read_i16()?),
            Tag::Int => Value::Int(self.read_i32()?),
            Tag::Long => Value::Long(self.read_i64()?),
            Tag::Float => Value::Float(self.read_f32()?),
            Tag::Double => Value::Double(self.read_f64()?),
            Tag::Boolean => Value::Boolean(self.read_bool()?),
            Tag::Object => Value::Object(self.read_object_id()?),
            Tag::String => Value::String(self.read_string_id()?),
            Tag::Thread => Value::Thread(self.read_thread_id()?),
            Tag::ThreadGroup => Value::ThreadGroup(self.read_thread_group_id()?),
            Tag::ClassLoader => Value::ClassLoader(self.read_class_loader_id()?),
            Tag::ClassObject => Value::ClassObject(self.read_class_object_id()?),
            Tag::Array => Value::Array(self.read_array_id()?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;

    fn narrow_sizes() -> IdSizes {
        IdSizes {
            field_id_size: 4,
            method_id_size: 4,
            object_id_size: 8,
            reference_type_id_size: 8,
            frame_id_size: 8,
        }
    }

    #[test]
    fn test_primitive_reads() {
        let data = [
            0x01, // u8
            0x12, 0x34, // u16
            0x80, 0x00, 0x00, 0x01, // u32
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, // u64
        ];
        let mut r = Reader::new(&data, IdSizes::default());

        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x8000_0001);
        assert_eq!(r.read_i64().unwrap(), -2);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_string_read() {
        let data = [0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o'];
        let mut r = Reader::new(&data, IdSizes::default());
        assert_eq!(r.read_string().unwrap(), "hello");
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let data = [0, 0, 0, 9, b'x'];
        let mut r = Reader::new(&data, IdSizes::default());
        match r.read_string() {
            Err(JdwpError::Decode(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_location_layout_with_narrow_method_ids() {
        // With 4-byte method ids and 8-byte class ids a location is
        // 1 + 8 + 4 + 8 = 21 bytes.
        let sizes = narrow_sizes();
        let mut w = Writer::new(sizes);
        w.write_location(&Location {
            type_tag: 1,
            class_id: ClassId(0x0102_0304_0506_0708),
            method_id: MethodId(0x0A0B_0C0D),
            index: 9,
        });
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 21);

        let mut r = Reader::new(&bytes, sizes);
        let location = r.read_location().unwrap();
        assert_eq!(location.class_id, ClassId(0x0102_0304_0506_0708));
        assert_eq!(location.method_id, MethodId(0x0A0B_0C0D));
        assert_eq!(location.index, 9);
    }

    #[test]
    fn test_value_round_trip_every_tag() {
        let samples = [
            Value::Void,
            Value::Byte(-7),
            Value::Char(0x2603),
            Value::Short(-1234),
            Value::Int(1 << 30),
            Value::Long(i64::MIN),
            Value::Float(3.5),
            Value::Double(-0.125),
            Value::Boolean(true),
            Value::Object(ObjectId(0xDEAD_BEEF)),
            Value::String(StringId(17)),
            Value::Thread(ThreadId(21)),
            Value::ThreadGroup(ThreadGroupId(33)),
            Value::ClassLoader(ClassLoaderId(45)),
            Value::ClassObject(ClassObjectId(0x99)),
            Value::Array(ArrayId(1)),
        ];

        for value in samples {
            let mut w = Writer::new(IdSizes::default());
            w.write_value(&value);
            let bytes = w.into_bytes();

            // Void is the tag alone.
            if value == Value::Void {
                assert_eq!(bytes.len(), 1);
            }

            let mut r = Reader::new(&bytes, IdSizes::default());
            assert_eq!(r.read_value().unwrap(), value);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_unknown_tag_is_decode_error() {
        let data = [0xFF, 0, 0, 0, 0];
        let mut r = Reader::new(&data, IdSizes::default());
        match r.read_value() {
            Err(JdwpError::Decode(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_narrow_object_ids() {
        let sizes = IdSizes {
            object_id_size: 2,
            ..IdSizes::default()
        };
        let mut w = Writer::new(sizes);
        w.write_value(&Value::Thread(ThreadId(0x0102)));
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![b't', 0x01, 0x02]);

        let mut r = Reader::new(&bytes, sizes);
        assert_eq!(r.read_value().unwrap(), Value::Thread(ThreadId(0x0102)));
    }
}
